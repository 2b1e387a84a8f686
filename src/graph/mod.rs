//! Authoring-time node graph.
//!
//! Nodes carry derived, ordered ports; connections always run from the
//! source-like end (Exit/Output) to the sink-like end (Enter/Input).
//!
//! ```text
//! [StartEvent] exit ──► enter [Print] ◄── input ── output [Constant]
//! ```

pub mod id;
pub mod model;
pub mod port;

pub use id::{ConnectionId, NodeId, PortIndex, PortRef};
pub use model::{ConnectError, Connection, GraphModel, NodeDescriptor, Position};
pub use port::{Port, PortKind, TypeTag};
