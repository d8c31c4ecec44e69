//! Position on the identifier ring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node or key on the ring.
///
/// The value always fits in the configured width of the identifier space;
/// see [`IdSpace`](crate::partitioner::IdSpace) for hashing and modular
/// arithmetic.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct RingId(pub u64);

impl RingId {
    /// True if `self` lies in the open interval `(from, to)`.
    ///
    /// `from == to` denotes the whole ring except `from`.
    pub fn in_open(self, from: RingId, to: RingId) -> bool {
        if from < to {
            from < self && self < to
        } else if from > to {
            self > from || self < to
        } else {
            self != from
        }
    }

    /// True if `self` lies in the half-open interval `(from, to]`.
    ///
    /// `from == to` denotes the whole ring.
    pub fn in_half_open(self, from: RingId, to: RingId) -> bool {
        if from < to {
            from < self && self <= to
        } else if from > to {
            self > from || self <= to
        } else {
            true
        }
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
