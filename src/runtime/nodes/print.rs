//! Text output to the host.

use crate::graph::{Port, PortIndex};
use crate::runtime::behavior::{Behavior, BehaviorTypeId};
use crate::runtime::engine::Context;
use serde::{Deserialize, Serialize};

/// Sends `prefix` + its text input to the host log, then fires `then`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintText {
    pub prefix: String,
}

impl PrintText {
    pub const IN: PortIndex = PortIndex(0);
    pub const TEXT: PortIndex = PortIndex(1);
    pub const THEN: PortIndex = PortIndex(2);
}

impl Behavior for PrintText {
    const TYPE_ID: BehaviorTypeId = BehaviorTypeId("core.print_text");

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::enter("in"),
            Port::input::<String>("text"),
            Port::exit("then"),
        ]
    }

    fn on_control(&self, port: PortIndex, ctx: &Context<'_>) {
        if port != Self::IN {
            return;
        }
        let text = ctx.read(Self::TEXT, String::new());
        ctx.log(&format!("{}{}", self.prefix, text));
        ctx.call(Self::THEN);
    }
}
