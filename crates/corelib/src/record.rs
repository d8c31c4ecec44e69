//! Versioned key/value records as stored and replicated.

use crate::token::RingId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Last-write-wins version stamp.
///
/// Ordered by timestamp first, then by the id of the node that issued it,
/// so two stamps from different nodes never compare equal.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Version {
    /// Hybrid-clock milliseconds.
    pub timestamp: u64,
    pub origin: RingId,
}

impl Version {
    pub fn new(timestamp: u64, origin: RingId) -> Self {
        Self { timestamp, origin }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.timestamp, self.origin)
    }
}

/// One stored entry. `value == None` is a tombstone left by a delete.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Record {
    pub id: RingId,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    pub version: Version,
}

impl Record {
    pub fn value(id: RingId, key: Vec<u8>, value: Vec<u8>, version: Version) -> Self {
        Self {
            id,
            key,
            value: Some(value),
            version,
        }
    }

    pub fn tombstone(id: RingId, key: Vec<u8>, version: Version) -> Self {
        Self {
            id,
            key,
            value: None,
            version,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}
