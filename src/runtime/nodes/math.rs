//! Integer arithmetic and comparison.
//!
//! These are pull nodes: they hold no state and compute their output from
//! their inputs each time it is read.

use crate::graph::{Port, PortIndex};
use crate::runtime::behavior::{Behavior, BehaviorTypeId, OutputSlot};
use crate::runtime::engine::Context;
use serde::{Deserialize, Serialize};

/// `sum = a + b`, wrapping on overflow.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddInt;

impl AddInt {
    pub const A: PortIndex = PortIndex(0);
    pub const B: PortIndex = PortIndex(1);
    pub const SUM: PortIndex = PortIndex(2);
}

impl Behavior for AddInt {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.add_int");

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input::<i64>("a"),
            Port::input::<i64>("b"),
            Port::output::<i64>("sum"),
        ]
    }

    fn write_output(&self, port: PortIndex, ctx: &Context<'_>, out: &mut OutputSlot<'_>) -> bool {
        if port != Self::SUM || !out.accepts::<i64>() {
            return false;
        }
        let a = ctx.read(Self::A, 0i64);
        let b = ctx.read(Self::B, 0i64);
        out.put(a.wrapping_add(b))
    }
}

/// `result = a > b`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreaterThan;

impl Behavior for GreaterThan {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.greater_than");

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input::<i64>("a"),
            Port::input::<i64>("b"),
            Port::output::<bool>("result"),
        ]
    }

    fn write_output(&self, port: PortIndex, ctx: &Context<'_>, out: &mut OutputSlot<'_>) -> bool {
        if port != PortIndex(2) || !out.accepts::<bool>() {
            return false;
        }
        let a = ctx.read(0u32, 0i64);
        let b = ctx.read(1u32, 0i64);
        out.put(a > b)
    }
}

/// Decimal rendering of an integer.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntToText;

impl Behavior for IntToText {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.int_to_text");

    fn ports(&self) -> Vec<Port> {
        vec![Port::input::<i64>("value"), Port::output::<String>("text")]
    }

    fn write_output(&self, port: PortIndex, ctx: &Context<'_>, out: &mut OutputSlot<'_>) -> bool {
        if port != PortIndex(1) || !out.accepts::<String>() {
            return false;
        }
        out.put(ctx.read(0u32, 0i64).to_string())
    }
}
