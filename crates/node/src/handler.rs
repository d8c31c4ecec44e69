//! Inbound dispatch: maps each peer request onto the node operation.

use crate::node::Node;
use async_trait::async_trait;
use corelib::error::{Error, Result};
use corelib::network::{Request, RequestHandler, Response};
use corelib::node::MemberState;
use tracing::trace;

#[async_trait]
impl RequestHandler for Node {
    async fn handle(&self, request: Request) -> Response {
        trace!("Node {} handling {}", self.info, request.name());
        Response::from_result(self.dispatch(request).await)
    }
}

impl Node {
    async fn dispatch(&self, request: Request) -> Result<Response> {
        let state = self.state();
        if state == MemberState::Left && !matches!(request, Request::Status) {
            return Err(Error::NotJoined(format!("node {} has left", self.info)));
        }

        match request {
            Request::FindSuccessor { id, hops } => {
                self.ensure_member()?;
                self.find_successor_hops(id, hops).await.map(Response::Node)
            }
            Request::GetPredecessor => Ok(Response::Predecessor(self.topology.predecessor())),
            Request::GetSuccessorList => Ok(Response::SuccessorList(self.topology.successor_list())),
            Request::Notify { candidate } => {
                self.ensure_joined()?;
                self.handle_notify(candidate);
                Ok(Response::Ack)
            }
            Request::Ping => Ok(Response::Pong),
            Request::UpdateSuccessor { successors } => {
                self.ensure_joined()?;
                self.handle_update_successor(successors);
                Ok(Response::Ack)
            }
            Request::UpdatePredecessor { predecessor } => {
                self.ensure_joined()?;
                self.handle_update_predecessor(predecessor);
                Ok(Response::Ack)
            }

            Request::Put { key, value, version } => {
                self.handle_write(key, Some(value), version).await?;
                Ok(Response::Ack)
            }
            Request::Get { key } => {
                self.ensure_member()?;
                self.handle_read(&key).map(Response::Record)
            }
            Request::Delete { key, version } => {
                self.handle_write(key, None, version).await?;
                Ok(Response::Ack)
            }
            Request::TransferKeys { records } => {
                self.handle_transfer(records)?;
                Ok(Response::Ack)
            }
            Request::ReplicatePush { records } => {
                self.handle_replicate(records)?;
                Ok(Response::Ack)
            }

            Request::ClientPut { key, value } => {
                self.put(key, value).await?;
                Ok(Response::Ack)
            }
            Request::ClientGet { key } => match self.get(key).await {
                Ok(value) => Ok(Response::Value(Some(value))),
                Err(Error::KeyNotFound) => Ok(Response::Value(None)),
                Err(err) => Err(err),
            },
            Request::ClientDelete { key } => {
                self.delete(key).await?;
                Ok(Response::Ack)
            }
            Request::Status => Ok(Response::Status(self.status())),
        }
    }

    /// Joined or still serving while leaving.
    fn ensure_member(&self) -> Result<()> {
        match self.state() {
            MemberState::Joined | MemberState::Leaving => Ok(()),
            other => Err(Error::NotJoined(format!("node {} is {}", self.info, other))),
        }
    }
}
