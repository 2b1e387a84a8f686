//! Packed runtime identity of a node instance.
//!
//! A `PackedAddress` is `(pool_id << 32) | slot_id`. Both halves are issued
//! starting at 1, so 0 in either half marks an empty address.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a data pool inside a `PoolRegistry`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u32);

/// Stable identifier of a slot inside one data pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl PoolId {
    pub const EMPTY: PoolId = PoolId(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::EMPTY
    }
}

impl SlotId {
    pub const EMPTY: SlotId = SlotId(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::EMPTY
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({})", self.0)
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self.0)
    }
}

/// Pool id in the high 32 bits, slot id in the low 32 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedAddress(pub u64);

impl PackedAddress {
    const SLOT_BITS: u32 = 32;
    const SLOT_MASK: u64 = (1 << Self::SLOT_BITS) - 1;

    pub const EMPTY: PackedAddress = PackedAddress(0);

    #[inline]
    pub const fn pack(pool: PoolId, slot: SlotId) -> Self {
        Self(((pool.0 as u64) << Self::SLOT_BITS) | slot.0 as u64)
    }

    #[inline]
    pub const fn pool(self) -> PoolId {
        PoolId((self.0 >> Self::SLOT_BITS) as u32)
    }

    #[inline]
    pub const fn slot(self) -> SlotId {
        SlotId((self.0 & Self::SLOT_MASK) as u32)
    }

    #[inline]
    pub const fn unpack(self) -> (PoolId, SlotId) {
        (self.pool(), self.slot())
    }

    /// Both halves must be non-zero.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.pool().is_valid() && self.slot().is_valid()
    }
}

impl fmt::Debug for PackedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::EMPTY {
            write!(f, "PackedAddress(EMPTY)")
        } else {
            write!(
                f,
                "PackedAddress(pool={}, slot={})",
                self.pool().0,
                self.slot().0
            )
        }
    }
}

impl fmt::Display for PackedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pool().0, self.slot().0)
    }
}
