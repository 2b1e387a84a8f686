//! # nodegraph-rs: Node-Graph Compiler and Execution Engine
//!
//! Authors build a graph of typed nodes connected by ports. The engine
//! compiles that graph into a flat runtime form and executes it by
//! propagating control (Exit → Enter) and data (Output → Input) through the
//! compiled links.
//!
//! ## Architecture
//!
//! - **Graph** (`graph`): the editable authoring model. Ports, nodes,
//!   connections and their validation rules.
//! - **Storage** (`storage`): stable-id data pools (one per behavior type),
//!   packed `pool:slot` addresses and the compiled link table.
//! - **Runtime** (`runtime`): behavior contracts, the compiler, the engine
//!   that drives lifecycle and `call`/`read`, and the built-in nodes.
//!
//! ## Example
//!
//! ```
//! use nodegraph_rs::graph::{GraphModel, Position};
//! use nodegraph_rs::runtime::nodes::{self, PrintText, StartEvent};
//! use nodegraph_rs::runtime::{compile, Behavior, RuntimeConfig, RuntimeEngine, TracingHost};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut graph = GraphModel::new(Arc::new(nodes::builtin_registry()));
//! let start = graph.add_node(StartEvent::TYPE_ID, Position::default());
//! let print = graph.add_node_with_data(
//!     PrintText::TYPE_ID,
//!     Position::new(200.0, 0.0),
//!     json!({ "prefix": "hello " }),
//! );
//! assert!(graph.try_connect(start, 0, print, 0));
//!
//! let program = compile(&graph);
//! let mut engine = RuntimeEngine::new(program, Box::new(TracingHost), RuntimeConfig::default());
//! engine.initialize()?;
//! engine.start()?;
//! engine.deinitialize()?;
//! # Ok::<(), nodegraph_rs::EngineError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod runtime;
pub mod storage;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use graph::{GraphModel, NodeId, Port, PortIndex, PortKind};
pub use runtime::{compile, Behavior, BehaviorRegistry, EngineState, Host, RuntimeEngine, RuntimeProgram};
pub use storage::{LinkTable, PackedAddress, PoolRegistry};
