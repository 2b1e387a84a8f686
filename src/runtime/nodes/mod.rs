//! Built-in node behaviors.

pub mod constant;
pub mod counter;
pub mod flow;
pub mod math;
pub mod print;

pub use constant::{ConstantInt, ConstantText};
pub use counter::Counter;
pub use flow::{Branch, Sequence, StartEvent};
pub use math::{AddInt, GreaterThan, IntToText};
pub use print::PrintText;

use crate::runtime::behavior::BehaviorRegistry;

/// Registry holding every built-in behavior.
pub fn builtin_registry() -> BehaviorRegistry {
    let mut registry = BehaviorRegistry::new();
    registry
        .register::<ConstantInt>()
        .register::<ConstantText>()
        .register::<AddInt>()
        .register::<GreaterThan>()
        .register::<IntToText>()
        .register::<StartEvent>()
        .register::<Sequence>()
        .register::<Branch>()
        .register::<Counter>()
        .register::<PrintText>();
    registry
}
