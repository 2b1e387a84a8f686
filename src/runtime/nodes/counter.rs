//! Stateful counter.

use crate::graph::{Port, PortIndex};
use crate::runtime::behavior::{Behavior, BehaviorTypeId};
use crate::runtime::engine::Context;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::Cell;

/// Adds `step` to its count each time `increment` fires, then fires `then`.
///
/// The count is runtime state: it is reset to `start` on Initialize and is not
/// part of the persisted instance data. Its output port is dynamically typed
/// and served through the untyped tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counter {
    pub start: i64,
    pub step: i64,
    #[serde(skip)]
    pub count: Cell<i64>,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            start: 0,
            step: 1,
            count: Cell::new(0),
        }
    }
}

impl Counter {
    pub const INCREMENT: PortIndex = PortIndex(0);
    pub const THEN: PortIndex = PortIndex(1);
    pub const COUNT: PortIndex = PortIndex(2);
}

impl Behavior for Counter {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.counter");

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::enter("increment"),
            Port::exit("then"),
            Port::dynamic_output("count"),
        ]
    }

    fn on_initialize(&self, _ctx: &Context<'_>) {
        self.count.set(self.start);
    }

    fn on_control(&self, port: PortIndex, ctx: &Context<'_>) {
        if port != Self::INCREMENT {
            return;
        }
        self.count.set(self.count.get().wrapping_add(self.step));
        ctx.call(Self::THEN);
    }

    fn output_any(&self, port: PortIndex, _ctx: &Context<'_>) -> Option<Box<dyn Any>> {
        (port == Self::COUNT).then(|| Box::new(self.count.get()) as Box<dyn Any>)
    }
}
