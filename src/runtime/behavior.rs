//! Behavior contracts and the type-erased pools that hold their instances.
//!
//! A behavior is a plain data type implementing [`Behavior`]. Every hook is an
//! optional capability with a no-op default, so a node only implements what it
//! actually handles. The engine never sees concrete behavior types: each one
//! is stored in a [`NodePool`] behind the [`NodeStore`] trait, created through
//! the [`BehaviorRegistry`].

use crate::graph::{Port, PortIndex};
use crate::runtime::engine::Context;
use crate::storage::{DataPool, SlotId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Stable name of a behavior type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BehaviorTypeId(pub &'static str);

impl fmt::Debug for BehaviorTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BehaviorTypeId({})", self.0)
    }
}

impl fmt::Display for BehaviorTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Lifecycle notifications broadcast to every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Initialize,
    DeInitialize,
    Enable,
    Disable,
    Start,
}

/// Destination for a typed output value.
///
/// Wraps the reader's `Option<T>`. A producer writes with [`put`](Self::put),
/// which fails (returns `false`) when `T` is not the type the reader asked for.
pub struct OutputSlot<'a> {
    target: &'a mut dyn Any,
}

impl<'a> OutputSlot<'a> {
    pub fn new<T: 'static>(target: &'a mut Option<T>) -> Self {
        Self { target }
    }

    pub fn accepts<T: 'static>(&self) -> bool {
        self.target.is::<Option<T>>()
    }

    pub fn put<T: 'static>(&mut self, value: T) -> bool {
        match self.target.downcast_mut::<Option<T>>() {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }
}

/// A node implementation. The implementing type is the node's instance data.
///
/// Hooks take `&self`: the same node may be re-entered or read while one of
/// its hooks is still running. Keep mutable runtime state in `Cell`s.
pub trait Behavior: Default + Clone + Serialize + DeserializeOwned + 'static {
    const TYPE_ID: BehaviorTypeId;

    /// Ordered port list for this instance.
    fn ports(&self) -> Vec<Port>;

    fn on_initialize(&self, _ctx: &Context<'_>) {}

    fn on_deinitialize(&self, _ctx: &Context<'_>) {}

    fn on_enable(&self, _ctx: &Context<'_>) {}

    fn on_disable(&self, _ctx: &Context<'_>) {}

    fn on_start(&self, _ctx: &Context<'_>) {}

    /// Control arrived on one of this node's Enter ports.
    fn on_control(&self, _port: PortIndex, _ctx: &Context<'_>) {}

    /// Typed output tier. Write the value for `port` into `out` if its type
    /// matches; return whether a value was produced.
    fn write_output(&self, _port: PortIndex, _ctx: &Context<'_>, _out: &mut OutputSlot<'_>) -> bool {
        false
    }

    /// Untyped output tier, used when the typed tier produced nothing.
    fn output_any(&self, _port: PortIndex, _ctx: &Context<'_>) -> Option<Box<dyn Any>> {
        None
    }
}

/// Decode a node's instance data blob. `Null` means "use defaults".
pub fn decode<B: Behavior>(data: &serde_json::Value) -> B {
    if data.is_null() {
        return B::default();
    }
    serde_json::from_value(data.clone()).unwrap_or_else(|e| {
        tracing::warn!("Invalid instance data for {}: {}, using defaults", B::TYPE_ID, e);
        B::default()
    })
}

/// Type-erased pool of one behavior's instances.
pub trait NodeStore {
    fn behavior(&self) -> BehaviorTypeId;

    fn allocate(&mut self) -> SlotId;

    /// Allocate an instance decoded from a graph-time data blob.
    fn materialize(&mut self, data: &serde_json::Value) -> SlotId;

    /// Clone one instance out as `Box<dyn Any>` holding the concrete behavior.
    fn clone_data(&self, slot: SlotId) -> Option<Box<dyn Any>>;

    /// Store a value produced by `clone_data`. `None` if it is a different behavior.
    fn allocate_boxed(&mut self, data: Box<dyn Any>) -> Option<SlotId>;

    fn release(&mut self, slot: SlotId) -> bool;

    fn contains(&self, slot: SlotId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current instance data as JSON.
    fn snapshot(&self, slot: SlotId) -> Option<serde_json::Value>;

    fn lifecycle(&self, slot: SlotId, event: LifecycleEvent, ctx: &Context<'_>);

    fn control(&self, slot: SlotId, port: PortIndex, ctx: &Context<'_>);

    fn write_output(&self, slot: SlotId, port: PortIndex, ctx: &Context<'_>, out: &mut OutputSlot<'_>) -> bool;

    fn output_any(&self, slot: SlotId, port: PortIndex, ctx: &Context<'_>) -> Option<Box<dyn Any>>;

    fn as_any(&self) -> &dyn Any;
}

/// Concrete pool for behavior `B`.
pub struct NodePool<B: Behavior> {
    data: DataPool<B>,
}

impl<B: Behavior> NodePool<B> {
    pub fn new(compaction_ratio: f32) -> Self {
        Self {
            data: DataPool::with_compaction_ratio(compaction_ratio),
        }
    }

    pub fn get(&self, slot: SlotId) -> Option<&B> {
        self.data.try_get(slot)
    }

    pub fn pool(&self) -> &DataPool<B> {
        &self.data
    }
}

impl<B: Behavior> NodeStore for NodePool<B> {
    fn behavior(&self) -> BehaviorTypeId {
        B::TYPE_ID
    }

    fn allocate(&mut self) -> SlotId {
        self.data.allocate()
    }

    fn materialize(&mut self, data: &serde_json::Value) -> SlotId {
        self.data.allocate_with(decode::<B>(data))
    }

    fn clone_data(&self, slot: SlotId) -> Option<Box<dyn Any>> {
        self.data
            .try_get(slot)
            .map(|b| Box::new(b.clone()) as Box<dyn Any>)
    }

    fn allocate_boxed(&mut self, data: Box<dyn Any>) -> Option<SlotId> {
        let data = data.downcast::<B>().ok()?;
        Some(self.data.allocate_with(*data))
    }

    fn release(&mut self, slot: SlotId) -> bool {
        self.data.release(slot)
    }

    fn contains(&self, slot: SlotId) -> bool {
        self.data.contains(slot)
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn snapshot(&self, slot: SlotId) -> Option<serde_json::Value> {
        let data = self.data.try_get(slot)?;
        match serde_json::to_value(data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to snapshot {} slot {:?}: {}", B::TYPE_ID, slot, e);
                None
            }
        }
    }

    fn lifecycle(&self, slot: SlotId, event: LifecycleEvent, ctx: &Context<'_>) {
        let Some(node) = self.data.try_get(slot) else {
            tracing::warn!("{:?} for missing {} slot {:?}", event, B::TYPE_ID, slot);
            return;
        };
        match event {
            LifecycleEvent::Initialize => node.on_initialize(ctx),
            LifecycleEvent::DeInitialize => node.on_deinitialize(ctx),
            LifecycleEvent::Enable => node.on_enable(ctx),
            LifecycleEvent::Disable => node.on_disable(ctx),
            LifecycleEvent::Start => node.on_start(ctx),
        }
    }

    fn control(&self, slot: SlotId, port: PortIndex, ctx: &Context<'_>) {
        match self.data.try_get(slot) {
            Some(node) => node.on_control(port, ctx),
            None => tracing::warn!("Control into missing {} slot {:?}", B::TYPE_ID, slot),
        }
    }

    fn write_output(&self, slot: SlotId, port: PortIndex, ctx: &Context<'_>, out: &mut OutputSlot<'_>) -> bool {
        self.data
            .try_get(slot)
            .is_some_and(|node| node.write_output(port, ctx, out))
    }

    fn output_any(&self, slot: SlotId, port: PortIndex, ctx: &Context<'_>) -> Option<Box<dyn Any>> {
        self.data.try_get(slot)?.output_any(port, ctx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct BehaviorEntry {
    ports: fn(&serde_json::Value) -> Vec<Port>,
    create_store: fn(f32) -> Box<dyn NodeStore>,
}

fn ports_of<B: Behavior>(data: &serde_json::Value) -> Vec<Port> {
    decode::<B>(data).ports()
}

fn create_store_for<B: Behavior>(compaction_ratio: f32) -> Box<dyn NodeStore> {
    Box::new(NodePool::<B>::new(compaction_ratio))
}

/// Catalog of known behavior types.
#[derive(Default)]
pub struct BehaviorRegistry {
    entries: HashMap<BehaviorTypeId, BehaviorEntry>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register behavior `B`. Registering the same type twice is harmless.
    pub fn register<B: Behavior>(&mut self) -> &mut Self {
        let previous = self.entries.insert(
            B::TYPE_ID,
            BehaviorEntry {
                ports: ports_of::<B>,
                create_store: create_store_for::<B>,
            },
        );
        if previous.is_some() {
            tracing::debug!("Behavior {} registered again", B::TYPE_ID);
        }
        self
    }

    pub fn contains(&self, id: BehaviorTypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ports for a node of behavior `id` with instance data `data`.
    pub fn ports_for(&self, id: BehaviorTypeId, data: &serde_json::Value) -> Option<Vec<Port>> {
        self.entries.get(&id).map(|e| (e.ports)(data))
    }

    /// A fresh, empty pool for behavior `id`.
    pub fn create_store(&self, id: BehaviorTypeId, compaction_ratio: f32) -> Option<Box<dyn NodeStore>> {
        self.entries.get(&id).map(|e| (e.create_store)(compaction_ratio))
    }

    pub fn ids(&self) -> impl Iterator<Item = BehaviorTypeId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
