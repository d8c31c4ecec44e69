//! Error types shared by every crate in the workspace.
//!
//! Errors travel between peers inside responses, so the enum is
//! serializable and carries owned strings rather than source errors.

use crate::token::RingId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Result type alias for the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while routing, replicating or serving requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    /// Ring walk exceeded the hop cap. The ring is inconsistent; retry later.
    #[error("routing for {id} gave up after {hops} hops")]
    RoutingFailure { id: RingId, hops: u32 },

    /// A single call to a peer failed or timed out.
    #[error("peer {addr} unreachable: {reason}")]
    PeerUnreachable { addr: SocketAddr, reason: String },

    /// Peer missed enough consecutive probes to be presumed dead.
    #[error("node {0} declared dead")]
    NodeDeclaredDead(RingId),

    /// No live value for the key.
    #[error("key not found")]
    KeyNotFound,

    /// Client-facing retries exhausted.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Another live member already uses this node's identifier.
    #[error("node id {0} is already present in the ring")]
    DuplicateNode(RingId),

    /// The node is not (or no longer) a ring member.
    #[error("node is not joined (state: {0})")]
    NotJoined(String),

    /// Configuration rejected by validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Frame or payload could not be encoded/decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Peer answered with a response that does not match the request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Builds a [`Error::PeerUnreachable`] from any displayable cause.
    pub fn unreachable(addr: SocketAddr, reason: impl ToString) -> Self {
        Error::PeerUnreachable {
            addr,
            reason: reason.to_string(),
        }
    }

    /// True for failures that a client-facing call should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RoutingFailure { .. } | Error::PeerUnreachable { .. } | Error::NotJoined(_)
        )
    }
}
