//! Pool registry: one data pool per behavior type.
//!
//! Pools are created lazily the first time a behavior asks for storage. The
//! registry hands out `PackedAddress`es combining the pool id with the slot id
//! issued by that pool.

use crate::runtime::behavior::{Behavior, BehaviorRegistry, BehaviorTypeId, NodePool, NodeStore};
use crate::storage::address::{PackedAddress, PoolId, SlotId};
use crate::storage::pool::DEFAULT_COMPACTION_RATIO;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Pool tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Compact a pool once its free slots exceed this share of live slots.
    pub compaction_ratio: f32,
    /// Drop a pool entirely when its last slot is released.
    pub retire_empty_pools: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            compaction_ratio: DEFAULT_COMPACTION_RATIO,
            retire_empty_pools: false,
        }
    }
}

/// Owns every runtime node instance, grouped by behavior.
pub struct PoolRegistry {
    behaviors: Arc<BehaviorRegistry>,
    pools: HashMap<PoolId, Box<dyn NodeStore>>,
    by_behavior: HashMap<BehaviorTypeId, PoolId>,
    next_pool_id: u32,
    config: PoolConfig,
}

impl PoolRegistry {
    pub fn new(behaviors: Arc<BehaviorRegistry>, config: PoolConfig) -> Self {
        Self {
            behaviors,
            pools: HashMap::new(),
            by_behavior: HashMap::new(),
            next_pool_id: 1,
            config,
        }
    }

    /// Create or return the pool for `behavior`. `None` for unknown behaviors.
    pub fn register(&mut self, behavior: BehaviorTypeId) -> Option<PoolId> {
        if let Some(&id) = self.by_behavior.get(&behavior) {
            return Some(id);
        }
        let store = self
            .behaviors
            .create_store(behavior, self.config.compaction_ratio)?;

        let id = PoolId(self.next_pool_id);
        self.next_pool_id += 1;
        self.pools.insert(id, store);
        self.by_behavior.insert(behavior, id);
        tracing::debug!("Created pool {:?} for {}", id, behavior);
        Some(id)
    }

    /// Existing pool for `behavior`, without creating one.
    pub fn pool_for(&self, behavior: BehaviorTypeId) -> Option<PoolId> {
        self.by_behavior.get(&behavior).copied()
    }

    /// Allocate a default instance in `pool`.
    pub fn allocate(&mut self, pool: PoolId) -> Option<PackedAddress> {
        let store = self.store_mut(pool)?;
        let slot = store.allocate();
        Some(PackedAddress::pack(pool, slot))
    }

    /// Allocate an instance decoded from a graph-time data blob.
    pub fn materialize(&mut self, pool: PoolId, data: &serde_json::Value) -> Option<PackedAddress> {
        let store = self.store_mut(pool)?;
        let slot = store.materialize(data);
        Some(PackedAddress::pack(pool, slot))
    }

    /// Copy an instance into a new slot of the same pool.
    pub fn allocate_copy(&mut self, source: PackedAddress) -> Option<PackedAddress> {
        self.allocate_copy_into(source.pool(), source)
    }

    /// Copy an instance into `pool`. The two pools must hold the same behavior;
    /// a foreign-type copy returns `None` and leaves both pools unchanged.
    pub fn allocate_copy_into(&mut self, pool: PoolId, source: PackedAddress) -> Option<PackedAddress> {
        let data = match self.pools.get(&source.pool()) {
            Some(store) => store.clone_data(source.slot()),
            None => None,
        };
        let Some(data) = data else {
            tracing::warn!("Copy source {} not found", source);
            return None;
        };

        let store = self.store_mut(pool)?;
        let target_behavior = store.behavior();
        match store.allocate_boxed(data) {
            Some(slot) => Some(PackedAddress::pack(pool, slot)),
            None => {
                tracing::warn!(
                    "Cannot copy {} into pool {:?}: pool holds {}",
                    source,
                    pool,
                    target_behavior
                );
                None
            }
        }
    }

    /// Release an instance. Returns `false` if it was not live.
    pub fn release(&mut self, address: PackedAddress) -> bool {
        let pool = address.pool();
        let Some(store) = self.pools.get_mut(&pool) else {
            return false;
        };
        if !store.release(address.slot()) {
            return false;
        }

        if self.config.retire_empty_pools && store.is_empty() {
            let behavior = store.behavior();
            self.pools.remove(&pool);
            self.by_behavior.remove(&behavior);
            tracing::debug!("Retired empty pool {:?} ({})", pool, behavior);
        }
        true
    }

    /// Owning pool and slot for `address`.
    pub fn resolve(&self, address: PackedAddress) -> Option<(&dyn NodeStore, SlotId)> {
        let store = self.pools.get(&address.pool())?;
        let slot = address.slot();
        store.contains(slot).then_some((store.as_ref(), slot))
    }

    pub fn contains(&self, address: PackedAddress) -> bool {
        self.resolve(address).is_some()
    }

    pub fn store(&self, pool: PoolId) -> Option<&dyn NodeStore> {
        self.pools.get(&pool).map(|s| s.as_ref())
    }

    fn store_mut(&mut self, pool: PoolId) -> Option<&mut Box<dyn NodeStore>> {
        let store = self.pools.get_mut(&pool);
        if store.is_none() {
            tracing::warn!("Pool {:?} not found", pool);
        }
        store
    }

    /// Borrow the concrete instance behind `address`.
    pub fn with_data<B: Behavior, R>(&self, address: PackedAddress, f: impl FnOnce(&B) -> R) -> Option<R> {
        let (store, slot) = self.resolve(address)?;
        let pool = store.as_any().downcast_ref::<NodePool<B>>()?;
        pool.get(slot).map(f)
    }

    /// Instance data behind `address` as JSON.
    pub fn snapshot(&self, address: PackedAddress) -> Option<serde_json::Value> {
        let (store, slot) = self.resolve(address)?;
        store.snapshot(slot)
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Live instances across all pools.
    pub fn instance_count(&self) -> usize {
        self.pools.values().map(|s| s.len()).sum()
    }

    pub fn behaviors(&self) -> &Arc<BehaviorRegistry> {
        &self.behaviors
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}
