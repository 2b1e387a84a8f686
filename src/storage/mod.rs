//! Runtime storage: node instance pools, packed addresses and the compiled
//! link table.

pub mod address;
pub mod links;
pub mod pool;
pub mod registry;

pub use address::{PackedAddress, PoolId, SlotId};
pub use links::{LinkEntry, LinkRange, LinkRecord, LinkTable, LinkTableBuilder, LinkTableError};
pub use pool::{DataPool, Slot, DEFAULT_COMPACTION_RATIO};
pub use registry::{PoolConfig, PoolRegistry};
