//! Node abstractions for the ring.
//!
//! A [`NodeInfo`] is everything a peer needs to route to a node: its ring
//! position and its network address. It is small and cheap to clone; heavy
//! per-node state lives in the node runtime.

use crate::partitioner::IdSpace;
use crate::token::RingId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Routing handle for a ring member.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: RingId,
    pub addr: SocketAddr,
}

impl NodeInfo {
    pub fn new(id: RingId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }

    /// Derives the id from the address in the given space.
    pub fn from_addr(space: &IdSpace, addr: SocketAddr) -> Self {
        Self {
            id: space.node_id(&addr),
            addr,
        }
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}

/// Lifecycle of a node's ring membership.
///
/// `Bootstrapping -> Joined -> Leaving -> Left`. A crash has no transition;
/// peers presume the node dead through their failure detectors.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum MemberState {
    Bootstrapping,
    Joined,
    Leaving,
    Left,
}

impl fmt::Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberState::Bootstrapping => "bootstrapping",
            MemberState::Joined => "joined",
            MemberState::Leaving => "leaving",
            MemberState::Left => "left",
        };
        f.write_str(name)
    }
}
