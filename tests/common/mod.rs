//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use nodegraph_rs::graph::GraphModel;
use nodegraph_rs::runtime::{compile, EngineState, Host, RuntimeConfig, RuntimeEngine};
use nodegraph_rs::PackedAddress;
use std::cell::RefCell;
use std::rc::Rc;

/// Host that records everything the engine and its nodes report.
///
/// Clones share the same log, so a test keeps one clone and hands the other
/// to the engine.
#[derive(Clone, Default)]
pub struct RecordingHost {
    messages: Rc<RefCell<Vec<(PackedAddress, String)>>>,
    states: Rc<RefCell<Vec<EngineState>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logged messages, in order.
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Logged messages with the address of the node that sent them.
    pub fn entries(&self) -> Vec<(PackedAddress, String)> {
        self.messages.borrow().clone()
    }

    pub fn states(&self) -> Vec<EngineState> {
        self.states.borrow().clone()
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}

impl Host for RecordingHost {
    fn log(&self, source: PackedAddress, message: &str) {
        self.messages.borrow_mut().push((source, message.to_string()));
    }

    fn state_changed(&self, state: EngineState) {
        self.states.borrow_mut().push(state);
    }
}

/// Compile `graph` and return an initialized engine plus its host log.
pub fn initialized_engine(graph: &GraphModel) -> (RuntimeEngine, RecordingHost) {
    let host = RecordingHost::new();
    let mut engine = RuntimeEngine::new(
        compile(graph),
        Box::new(host.clone()),
        RuntimeConfig::default(),
    );
    engine.initialize().expect("initialize");
    (engine, host)
}
