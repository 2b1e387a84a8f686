//! Runtime engine: lifecycle and `call`/`read` dispatch.
//!
//! Execution is a plain call stack. `call` walks the links of an Exit port and
//! invokes each target's control hook, which may itself call or read further
//! ports before returning. Nesting is bounded by `RuntimeConfig::max_call_depth`;
//! past the limit a call does nothing and a read returns its default, so a
//! control cycle in the graph terminates instead of overflowing the stack.

use crate::error::{EngineError, Result};
use crate::graph::{NodeId, PortIndex, PortKind};
use crate::runtime::behavior::{LifecycleEvent, OutputSlot};
use crate::runtime::compiler::RuntimeProgram;
use crate::runtime::host::Host;
use crate::storage::{LinkTable, PackedAddress, PoolRegistry};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Default bound on nested `call`/`read` dispatch.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Execution tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Lifecycle state of a `RuntimeEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Enabled,
    Disabled,
    /// Terminal.
    DeInitialized,
}

impl EngineState {
    /// Whether `call`/`read` are accepted.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            EngineState::Initialized | EngineState::Enabled | EngineState::Disabled
        )
    }
}

/// Borrowed view of a program used during one dispatch.
struct Executor<'a> {
    links: &'a LinkTable,
    pools: &'a PoolRegistry,
    host: &'a dyn Host,
    depth: &'a Cell<usize>,
    max_depth: usize,
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl<'a> Executor<'a> {
    fn enter(&self, address: PackedAddress, port: PortIndex) -> Option<DepthGuard<'a>> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            tracing::warn!(
                "Call depth limit ({}) reached at {} port {}; dispatch skipped",
                self.max_depth,
                address,
                port
            );
            return None;
        }
        self.depth.set(depth + 1);
        Some(DepthGuard(self.depth))
    }

    fn call(&self, address: PackedAddress, port: PortIndex) {
        let Some(_guard) = self.enter(address, port) else {
            return;
        };

        for target in self.links.links(address, port) {
            if target.kind != PortKind::Enter {
                continue;
            }
            let Some((store, slot)) = self.pools.resolve(target.address) else {
                tracing::warn!("Call from {} port {}: target {} not found", address, port, target.address);
                continue;
            };
            let ctx = Context {
                exec: self,
                address: target.address,
            };
            store.control(slot, target.port, &ctx);
        }
    }

    fn read<T: 'static>(&self, address: PackedAddress, port: PortIndex, default: T) -> T {
        let Some(_guard) = self.enter(address, port) else {
            return default;
        };

        let range = self.links.get_links(address, port);
        if range.is_empty() {
            return default;
        }
        let Some(producer) = self.links.get_link(range.first) else {
            return default;
        };
        if producer.kind != PortKind::Output {
            return default;
        }
        let Some((store, slot)) = self.pools.resolve(producer.address) else {
            tracing::warn!("Read at {} port {}: producer {} not found", address, port, producer.address);
            return default;
        };

        let ctx = Context {
            exec: self,
            address: producer.address,
        };

        let mut value: Option<T> = None;
        if store.write_output(slot, producer.port, &ctx, &mut OutputSlot::new(&mut value)) {
            if let Some(value) = value {
                return value;
            }
        }

        match store.output_any(slot, producer.port, &ctx) {
            Some(any) => match any.downcast::<T>() {
                Ok(value) => *value,
                Err(_) => {
                    tracing::debug!(
                        "Read at {} port {}: producer {} port {} has a different type",
                        address,
                        port,
                        producer.address,
                        producer.port
                    );
                    default
                }
            },
            None => default,
        }
    }

    fn broadcast(&self, order: &[PackedAddress], event: LifecycleEvent) {
        for &address in order {
            self.notify(address, event);
        }
    }

    fn notify(&self, address: PackedAddress, event: LifecycleEvent) {
        match self.pools.resolve(address) {
            Some((store, slot)) => {
                let ctx = Context {
                    exec: self,
                    address,
                };
                store.lifecycle(slot, event, &ctx);
            }
            None => tracing::warn!("{:?}: node {} not found", event, address),
        }
    }
}

/// What a node sees while one of its hooks runs.
pub struct Context<'a> {
    exec: &'a Executor<'a>,
    address: PackedAddress,
}

impl<'a> Context<'a> {
    /// Address of the node whose hook is running.
    pub fn address(&self) -> PackedAddress {
        self.address
    }

    /// Fire one of this node's Exit ports.
    pub fn call(&self, port: impl Into<PortIndex>) {
        self.exec.call(self.address, port.into());
    }

    /// Read one of this node's Input ports.
    pub fn read<T: 'static>(&self, port: impl Into<PortIndex>, default: T) -> T {
        self.exec.read(self.address, port.into(), default)
    }

    pub fn host(&self) -> &dyn Host {
        self.exec.host
    }

    /// Send a message to the host, tagged with this node's address.
    pub fn log(&self, message: &str) {
        self.exec.host.log(self.address, message);
    }
}

/// Executes a compiled `RuntimeProgram`.
pub struct RuntimeEngine {
    program: RuntimeProgram,
    host: Box<dyn Host>,
    config: RuntimeConfig,
    state: EngineState,
    started: bool,
    depth: Cell<usize>,
}

impl RuntimeEngine {
    pub fn new(program: RuntimeProgram, host: Box<dyn Host>, config: RuntimeConfig) -> Self {
        Self {
            program,
            host,
            config,
            state: EngineState::Uninitialized,
            started: false,
            depth: Cell::new(0),
        }
    }

    fn executor(&self) -> Executor<'_> {
        Executor {
            links: &self.program.links,
            pools: &self.program.pools,
            host: self.host.as_ref(),
            depth: &self.depth,
            max_depth: self.config.max_call_depth,
        }
    }

    fn require(&self, allowed: &[EngineState], action: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    fn transition(&mut self, state: EngineState) {
        tracing::info!("Engine {:?} -> {:?}", self.state, state);
        self.state = state;
        self.host.state_changed(state);
    }

    /// Dispatch Initialize to every node in compiled order.
    pub fn initialize(&mut self) -> Result<()> {
        self.require(&[EngineState::Uninitialized], "initialize")?;
        self.executor()
            .broadcast(self.program.order(), LifecycleEvent::Initialize);
        self.transition(EngineState::Initialized);
        Ok(())
    }

    pub fn enable(&mut self) -> Result<()> {
        self.require(&[EngineState::Initialized, EngineState::Disabled], "enable")?;
        self.executor()
            .broadcast(self.program.order(), LifecycleEvent::Enable);
        self.transition(EngineState::Enabled);
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        self.require(&[EngineState::Enabled], "disable")?;
        self.executor()
            .broadcast(self.program.order(), LifecycleEvent::Disable);
        self.transition(EngineState::Disabled);
        Ok(())
    }

    /// Dispatch Start to every node in compiled order. Allowed once.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                action: "start again",
            });
        }
        self.require(
            &[
                EngineState::Initialized,
                EngineState::Enabled,
                EngineState::Disabled,
            ],
            "start",
        )?;
        self.started = true;
        tracing::info!("Engine start");
        self.executor()
            .broadcast(self.program.order(), LifecycleEvent::Start);
        Ok(())
    }

    /// Dispatch DeInitialize in reverse compiled order. An enabled engine is
    /// disabled first.
    pub fn deinitialize(&mut self) -> Result<()> {
        self.require(
            &[
                EngineState::Initialized,
                EngineState::Enabled,
                EngineState::Disabled,
            ],
            "deinitialize",
        )?;
        if self.state == EngineState::Enabled {
            self.disable()?;
        }

        let exec = self.executor();
        for &address in self.program.order().iter().rev() {
            exec.notify(address, LifecycleEvent::DeInitialize);
        }
        self.transition(EngineState::DeInitialized);
        Ok(())
    }

    /// Fire `port` of the node at `address`. No-op unless running.
    pub fn call(&self, address: PackedAddress, port: impl Into<PortIndex>) {
        let port = port.into();
        if !self.state.is_running() {
            tracing::warn!("Call to {} port {} while {:?}; ignored", address, port, self.state);
            return;
        }
        self.executor().call(address, port);
    }

    /// Read the Input `port` of the node at `address`, or `default` when it has
    /// no producer, the producer's type differs, or the engine is not running.
    pub fn read<T: 'static>(&self, address: PackedAddress, port: impl Into<PortIndex>, default: T) -> T {
        let port = port.into();
        if !self.state.is_running() {
            tracing::warn!("Read from {} port {} while {:?}; default used", address, port, self.state);
            return default;
        }
        self.executor().read(address, port, default)
    }

    /// Remove one node instance. A running engine sends it DeInitialize first;
    /// links that still point at it become no-ops.
    pub fn release_node(&mut self, address: PackedAddress) -> bool {
        if !self.program.pools.contains(address) {
            return false;
        }
        if self.state.is_running() {
            self.executor()
                .notify(address, LifecycleEvent::DeInitialize);
        }
        self.program.pools.release(address)
    }

    pub fn address_of(&self, node: NodeId) -> Option<PackedAddress> {
        self.program.address_of(node)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn program(&self) -> &RuntimeProgram {
        &self.program
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.program.pools
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
