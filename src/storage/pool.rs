//! Slot arena with stable ids.
//!
//! Instance data lives in a dense `Vec<Slot<T>>`. Everything outside the pool
//! refers to a slot by its `SlotId`, which is resolved through an id → index
//! map. Releasing a slot leaves a tombstone and queues its index for reuse;
//! once tombstones outnumber the configured share of live slots the pool is
//! compacted in a single pass. Compaction moves slots but never changes ids.

use crate::storage::address::SlotId;
use std::collections::{HashMap, VecDeque};

/// Default tombstone share that triggers compaction.
pub const DEFAULT_COMPACTION_RATIO: f32 = 0.5;

/// A single entry of the backing array. `id == SlotId::EMPTY` marks a tombstone.
#[derive(Debug, Clone)]
pub struct Slot<T> {
    pub id: SlotId,
    pub data: T,
}

/// Arena of `T` addressed by stable `SlotId`s.
#[derive(Debug)]
pub struct DataPool<T> {
    slots: Vec<Slot<T>>,
    index: HashMap<SlotId, usize>,
    free: VecDeque<usize>,
    next_id: u32,
    compaction_ratio: f32,
    /// Returned by `get` on a miss so hot paths need no branch.
    sentinel: T,
}

impl<T: Default> DataPool<T> {
    pub fn new() -> Self {
        Self::with_compaction_ratio(DEFAULT_COMPACTION_RATIO)
    }

    pub fn with_compaction_ratio(compaction_ratio: f32) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            free: VecDeque::new(),
            next_id: 1,
            compaction_ratio,
            sentinel: T::default(),
        }
    }

    /// Allocate a slot holding `T::default()`.
    pub fn allocate(&mut self) -> SlotId {
        self.allocate_with(T::default())
    }

    /// Allocate a slot holding `data`.
    pub fn allocate_with(&mut self, data: T) -> SlotId {
        let id = self.issue_id();
        let slot = Slot { id, data };
        let idx = match self.free.pop_front() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.index.insert(id, idx);
        id
    }

    /// Allocate a copy of another pool's slot. `None` if the source id is absent.
    pub fn allocate_copy(&mut self, source: &DataPool<T>, source_id: SlotId) -> Option<SlotId>
    where
        T: Clone,
    {
        let data = source.try_get(source_id)?.clone();
        Some(self.allocate_with(data))
    }

    /// Allocate a copy of one of this pool's own slots.
    pub fn duplicate(&mut self, id: SlotId) -> Option<SlotId>
    where
        T: Clone,
    {
        let data = self.try_get(id)?.clone();
        Some(self.allocate_with(data))
    }

    /// Next unused id. After the counter wraps, ids still live are skipped.
    fn issue_id(&mut self) -> SlotId {
        loop {
            let id = SlotId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if self.next_id == 0 {
                self.next_id = 1;
            }
            if !self.index.contains_key(&id) {
                return id;
            }
        }
    }

    /// Data for `id`, or the shared default sentinel when absent.
    ///
    /// Callers must treat the sentinel as "no data"; it is never a live slot.
    #[inline]
    pub fn get(&self, id: SlotId) -> &T {
        self.try_get(id).unwrap_or(&self.sentinel)
    }

    #[inline]
    pub fn try_get(&self, id: SlotId) -> Option<&T> {
        self.index.get(&id).map(|&idx| &self.slots[idx].data)
    }

    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        let idx = *self.index.get(&id)?;
        Some(&mut self.slots[idx].data)
    }

    #[inline]
    pub fn contains(&self, id: SlotId) -> bool {
        self.index.contains_key(&id)
    }

    /// Release a slot. Returns `false` if the id was not live.
    pub fn release(&mut self, id: SlotId) -> bool {
        let Some(idx) = self.index.remove(&id) else {
            return false;
        };
        let slot = &mut self.slots[idx];
        slot.id = SlotId::EMPTY;
        slot.data = T::default();
        self.free.push_back(idx);

        if self.free.len() as f32 > self.index.len() as f32 * self.compaction_ratio {
            self.compact();
        }
        true
    }

    /// Shift live slots over tombstones and truncate the backing array.
    pub fn compact(&mut self) {
        let mut removed = 0;
        for i in 0..self.slots.len() {
            if !self.slots[i].id.is_valid() {
                removed += 1;
                continue;
            }
            if removed > 0 {
                let target = i - removed;
                self.slots.swap(target, i);
                self.index.insert(self.slots[target].id, target);
            }
        }
        let live = self.slots.len() - removed;
        self.slots.truncate(live);
        self.free.clear();
        tracing::trace!("Compacted pool: {} live, {} reclaimed", live, removed);
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Length of the backing array, tombstones included.
    pub fn capacity_used(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Live ids in backing-array order.
    pub fn ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.iter().map(|s| s.id).filter(|id| id.is_valid())
    }

    /// Live `(id, data)` pairs in backing-array order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots
            .iter()
            .filter(|s| s.id.is_valid())
            .map(|s| (s.id, &s.data))
    }
}

impl<T: Default> Default for DataPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
