//! Constant value nodes.

use crate::graph::{Port, PortIndex};
use crate::runtime::behavior::{Behavior, BehaviorTypeId, OutputSlot};
use crate::runtime::engine::Context;
use serde::{Deserialize, Serialize};

/// Produces a fixed integer.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstantInt {
    pub value: i64,
}

impl Behavior for ConstantInt {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.constant_int");

    fn ports(&self) -> Vec<Port> {
        vec![Port::output::<i64>("value")]
    }

    fn write_output(&self, port: PortIndex, _ctx: &Context<'_>, out: &mut OutputSlot<'_>) -> bool {
        port == PortIndex(0) && out.put(self.value)
    }
}

/// Produces a fixed string.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstantText {
    pub value: String,
}

impl Behavior for ConstantText {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.constant_text");

    fn ports(&self) -> Vec<Port> {
        vec![Port::output::<String>("value")]
    }

    fn write_output(&self, port: PortIndex, _ctx: &Context<'_>, out: &mut OutputSlot<'_>) -> bool {
        port == PortIndex(0) && out.accepts::<String>() && out.put(self.value.clone())
    }
}
