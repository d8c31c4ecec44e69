//! Logical peer message set and the transport-agnostic RPC contracts.
//!
//! Every interaction between nodes is one [`Request`] answered by one
//! [`Response`]. How the pair travels (TCP frames, in-process calls) is up to
//! the gateway implementing [`PeerClient`]; the receiving side implements
//! [`RequestHandler`].

use crate::error::{Error, Result};
use crate::node::{MemberState, NodeInfo};
use crate::record::{Record, Version};
use crate::token::RingId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    // ---- ring maintenance ----
    /// Ring routing; `hops` counts forwards so far.
    FindSuccessor { id: RingId, hops: u32 },
    GetPredecessor,
    GetSuccessorList,
    /// Sender claims to be the receiver's predecessor.
    Notify { candidate: NodeInfo },
    Ping,
    /// Sent by a leaving successor: adopt this successor list.
    UpdateSuccessor { successors: Vec<NodeInfo> },
    /// Sent by a leaving predecessor: adopt this predecessor.
    UpdatePredecessor { predecessor: Option<NodeInfo> },

    // ---- data plane, addressed to owners and replicas ----
    /// Write at the primary. The primary stamps a version when none is given.
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        version: Option<Version>,
    },
    /// Local read at the receiver, tombstones included.
    Get { key: Vec<u8> },
    Delete {
        key: Vec<u8>,
        version: Option<Version>,
    },
    /// Bulk ownership handoff on join/leave.
    TransferKeys { records: Vec<Record> },
    /// Replica propagation from a primary.
    ReplicatePush { records: Vec<Record> },

    // ---- client entry points; the receiver coordinates ----
    ClientPut { key: Vec<u8>, value: Vec<u8> },
    ClientGet { key: Vec<u8> },
    ClientDelete { key: Vec<u8> },
    Status,
}

impl Request {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::FindSuccessor { .. } => "FIND_SUCCESSOR",
            Request::GetPredecessor => "GET_PREDECESSOR",
            Request::GetSuccessorList => "GET_SUCCESSOR_LIST",
            Request::Notify { .. } => "NOTIFY",
            Request::Ping => "PING",
            Request::UpdateSuccessor { .. } => "UPDATE_SUCCESSOR",
            Request::UpdatePredecessor { .. } => "UPDATE_PREDECESSOR",
            Request::Put { .. } => "PUT",
            Request::Get { .. } => "GET",
            Request::Delete { .. } => "DELETE",
            Request::TransferKeys { .. } => "TRANSFER_KEYS",
            Request::ReplicatePush { .. } => "REPLICATE_PUSH",
            Request::ClientPut { .. } => "CLIENT_PUT",
            Request::ClientGet { .. } => "CLIENT_GET",
            Request::ClientDelete { .. } => "CLIENT_DELETE",
            Request::Status => "STATUS",
        }
    }
}

/// Operator view of one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node: NodeInfo,
    pub state: MemberState,
    pub predecessor: Option<NodeInfo>,
    pub successors: Vec<NodeInfo>,
    /// Stored records, tombstones included.
    pub records: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Node(NodeInfo),
    Predecessor(Option<NodeInfo>),
    SuccessorList(Vec<NodeInfo>),
    Ack,
    Pong,
    Record(Option<Record>),
    Value(Option<Vec<u8>>),
    Status(NodeStatus),
    Error(Error),
}

impl Response {
    /// Lifts a peer-reported error into `Err`.
    pub fn into_result(self) -> Result<Response> {
        match self {
            Response::Error(err) => Err(err),
            other => Ok(other),
        }
    }

    pub fn from_result(result: Result<Response>) -> Response {
        result.unwrap_or_else(Response::Error)
    }
}

/// Serves requests addressed to the local node.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}

/// Sends a request to a peer and waits for its response.
///
/// Implementations report transport failures as
/// [`Error::PeerUnreachable`]; bounding the wait is the caller's job.
#[async_trait]
pub trait PeerClient: Send + Sync + 'static {
    async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response>;
}

/// Builds the error returned when a response variant does not fit the request.
pub fn unexpected(request: &str, response: &Response) -> Error {
    Error::UnexpectedResponse(format!("{} answered with {:?}", request, response))
}
