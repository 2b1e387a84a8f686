//! Compilation and execution of graphs.

pub mod behavior;
pub mod compiler;
pub mod engine;
pub mod host;
pub mod nodes;

pub use behavior::{
    Behavior, BehaviorRegistry, BehaviorTypeId, LifecycleEvent, NodePool, NodeStore, OutputSlot,
};
pub use compiler::{compile, CompileStats, GraphCompiler, RuntimeProgram};
pub use engine::{Context, EngineState, RuntimeConfig, RuntimeEngine, DEFAULT_MAX_CALL_DEPTH};
pub use host::{Host, TracingHost};
