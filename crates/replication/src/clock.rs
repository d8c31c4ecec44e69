//! Hybrid logical clock issuing last-write-wins versions.

use corelib::record::Version;
use corelib::token::RingId;
use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Issues strictly increasing [`Version`]s for one node.
///
/// A stamp is `max(wall clock millis, last issued + 1, last observed + 1)`,
/// so a write issued after this node has seen a version always wins over it,
/// even if the other node's wall clock runs ahead.
#[derive(Debug)]
pub struct HybridClock {
    origin: RingId,
    last: Mutex<u64>,
}

impl HybridClock {
    pub fn new(origin: RingId) -> Self {
        Self {
            origin,
            last: Mutex::new(0),
        }
    }

    /// Issues the next version.
    pub fn tick(&self) -> Version {
        let wall = wall_millis();
        let mut last = self.last.lock();
        let timestamp = wall.max(*last + 1);
        *last = timestamp;
        Version::new(timestamp, self.origin)
    }

    /// Folds a version seen from elsewhere into the clock.
    pub fn observe(&self, version: Version) {
        let mut last = self.last.lock();
        if version.timestamp > *last {
            *last = version.timestamp;
        }
    }
}

fn wall_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
