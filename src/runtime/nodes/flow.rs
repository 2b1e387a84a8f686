//! Control flow nodes.

use crate::graph::{Port, PortIndex};
use crate::runtime::behavior::{Behavior, BehaviorTypeId};
use crate::runtime::engine::Context;
use serde::{Deserialize, Deserializer, Serialize};

/// Fires its single Exit when the engine starts. Exposed on the graph boundary.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartEvent;

impl Behavior for StartEvent {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.start_event");

    fn ports(&self) -> Vec<Port> {
        vec![Port::exit("fired").external()]
    }

    fn on_start(&self, ctx: &Context<'_>) {
        ctx.call(0u32);
    }
}

/// Fires each of its `arity` Exits in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sequence {
    /// Number of Exits, at most [`Sequence::MAX_ARITY`].
    #[serde(deserialize_with = "clamp_arity")]
    pub arity: u32,
}

impl Sequence {
    pub const MAX_ARITY: u32 = 256;

    fn exits(&self) -> u32 {
        self.arity.min(Self::MAX_ARITY)
    }
}

fn clamp_arity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let arity = u32::deserialize(deserializer)?;
    if arity > Sequence::MAX_ARITY {
        tracing::warn!(
            "Sequence arity {} exceeds {}, clamping",
            arity,
            Sequence::MAX_ARITY
        );
    }
    Ok(arity.min(Sequence::MAX_ARITY))
}

impl Default for Sequence {
    fn default() -> Self {
        Self { arity: 2 }
    }
}

impl Behavior for Sequence {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.sequence");

    fn ports(&self) -> Vec<Port> {
        let exits = self.exits();
        let mut ports = Vec::with_capacity(exits as usize + 1);
        ports.push(Port::enter("in"));
        ports.extend((0..exits).map(|i| Port::exit(format!("then {i}"))));
        ports
    }

    fn on_control(&self, port: PortIndex, ctx: &Context<'_>) {
        if port != PortIndex(0) {
            return;
        }
        for exit in 1..=self.exits() {
            ctx.call(exit);
        }
    }
}

/// Fires `true` or `false` depending on its condition input.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch;

impl Branch {
    pub const IN: PortIndex = PortIndex(0);
    pub const CONDITION: PortIndex = PortIndex(1);
    pub const TRUE: PortIndex = PortIndex(2);
    pub const FALSE: PortIndex = PortIndex(3);
}

impl Behavior for Branch {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.branch");

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::enter("in"),
            Port::input::<bool>("condition"),
            Port::exit("true"),
            Port::exit("false"),
        ]
    }

    fn on_control(&self, port: PortIndex, ctx: &Context<'_>) {
        if port != Self::IN {
            return;
        }
        if ctx.read(Self::CONDITION, false) {
            ctx.call(Self::TRUE);
        } else {
            ctx.call(Self::FALSE);
        }
    }
}
