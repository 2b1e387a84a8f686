//! The embedding application, as seen by the engine and its nodes.

use crate::runtime::engine::EngineState;
use crate::storage::PackedAddress;

/// Services the embedding application provides to a running graph.
#[cfg_attr(test, mockall::automock)]
pub trait Host {
    /// A node emitted a message.
    fn log(&self, source: PackedAddress, message: &str);

    /// The engine completed a lifecycle transition.
    fn state_changed(&self, _state: EngineState) {}
}

/// Host that forwards node output to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHost;

impl Host for TracingHost {
    fn log(&self, source: PackedAddress, message: &str) {
        tracing::info!(target: "nodegraph::host", %source, "{}", message);
    }

    fn state_changed(&self, state: EngineState) {
        tracing::debug!(target: "nodegraph::host", "Engine state: {:?}", state);
    }
}
