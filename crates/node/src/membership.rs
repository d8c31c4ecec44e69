//! Ring membership: create, join, stabilize, successor-list repair and
//! graceful leave.

use crate::node::Node;
use corelib::error::{Error, Result};
use corelib::network::Request;
use corelib::node::{MemberState, NodeInfo};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Node {
    /// Starts a new ring with this node as its only member.
    pub fn create(self: &Arc<Self>) -> Result<()> {
        match self.state() {
            MemberState::Bootstrapping => {}
            MemberState::Joined => return Ok(()),
            other => return Err(Error::NotJoined(format!("node {} is {}", self.info, other))),
        }

        self.topology.create();
        self.set_state(MemberState::Joined);
        self.start_loops();
        info!("Node {} created a new ring", self.info);
        Ok(())
    }

    /// Joins the ring that `contact` belongs to.
    ///
    /// Joining again once joined is a no-op. If the ring already holds a
    /// different member with this node's id the join is refused with
    /// [`Error::DuplicateNode`].
    pub async fn join(self: &Arc<Self>, contact: SocketAddr) -> Result<()> {
        match self.state() {
            MemberState::Bootstrapping => {}
            MemberState::Joined => return Ok(()),
            other => return Err(Error::NotJoined(format!("node {} is {}", self.info, other))),
        }
        if contact == self.info.addr {
            return Err(Error::InvalidConfig(format!(
                "node {} cannot join through itself",
                self.info
            )));
        }

        let id = self.info.id;
        let successor = self
            .retrying("join", move || self.find_successor_via(contact, id))
            .await?;
        if successor.id == self.info.id {
            warn!("Node {} refused: {} already holds this id", self.info, successor);
            return Err(Error::DuplicateNode(self.info.id));
        }

        // Seed the list from the successor's own; stabilization fixes the
        // rest.
        let tail = self.successor_list_of(successor).await.unwrap_or_default();
        self.topology.refresh_successors(successor, &tail);
        self.set_state(MemberState::Joined);
        self.start_loops();
        info!("Node {} joined via {}; successor {}", self.info, contact, successor);

        if let Err(err) = self.stabilize().await {
            debug!("Node {} first stabilize failed: {}", self.info, err);
        }
        Ok(())
    }

    /// One stabilization round: adopt a closer live successor if the
    /// current one reports it as predecessor, then notify the successor.
    pub async fn stabilize(&self) -> Result<()> {
        if !self.is_joined() {
            return Ok(());
        }

        let successor = self.topology.successor();
        let alone = successor.id == self.info.id;
        let candidate = if alone {
            self.topology.predecessor()
        } else {
            self.predecessor_of(successor).await?
        };

        if let Some(candidate) = candidate {
            if candidate.id != self.info.id && candidate.id.in_open(self.info.id, successor.id) {
                let alive = alone || self.ping(candidate).await.is_ok();
                if alive {
                    info!("Node {} adopts {} as successor", self.info, candidate);
                    self.topology.adopt_successor(candidate);
                    self.invalidate_replicas();
                } else {
                    debug!("Node {} ignores unreachable candidate {}", self.info, candidate);
                }
            }
        }

        let successor = self.topology.successor();
        if successor.id != self.info.id {
            self.call_ack(successor.addr, Request::Notify { candidate: self.info })
                .await?;
        }
        Ok(())
    }

    /// Rebuilds the successor list from the successor's own list.
    pub async fn fix_successors(&self) -> Result<()> {
        if !self.is_joined() {
            return Ok(());
        }

        let successor = self.topology.successor();
        if successor.id == self.info.id {
            return Ok(());
        }

        let tail = self.successor_list_of(successor).await?;
        // The detector may have replaced the successor meanwhile.
        if self.topology.successor().id != successor.id {
            return Ok(());
        }

        let before = self.topology.successor_list();
        self.topology.refresh_successors(successor, &tail);
        let after = self.topology.successor_list();
        if before != after {
            debug!(
                "Node {} successor list {:?}",
                self.info,
                after.iter().map(|n| n.id).collect::<Vec<_>>()
            );
            self.request_sweep();
        }
        Ok(())
    }

    /// Handles a NOTIFY from a node claiming to be our predecessor.
    pub(crate) fn handle_notify(&self, candidate: NodeInfo) {
        if self.topology.notify(candidate) {
            info!("Node {} accepts predecessor {}", self.info, candidate);
            self.request_sweep();
        }
    }

    /// Our successor is leaving and hands us its successor list.
    pub(crate) fn handle_update_successor(&self, successors: Vec<NodeInfo>) {
        let Some((head, tail)) = successors.split_first() else {
            return;
        };
        self.topology.refresh_successors(*head, tail);
        if self.topology.is_alone() {
            self.topology.create();
        }
        info!("Node {} relinked to successor {}", self.info, self.topology.successor());
        self.invalidate_replicas();
    }

    /// Our predecessor is leaving and hands us its own predecessor.
    pub(crate) fn handle_update_predecessor(&self, predecessor: Option<NodeInfo>) {
        self.topology.set_predecessor(predecessor);
        info!("Node {} relinked to predecessor {:?}", self.info, predecessor);
        self.invalidate_replicas();
    }

    /// Leaves the ring gracefully: relinks the neighbors, hands every
    /// stored record to the successor and stops the background loops.
    ///
    /// Leaving twice is a no-op.
    pub async fn leave(&self) -> Result<()> {
        match self.state() {
            MemberState::Joined => self.set_state(MemberState::Leaving),
            MemberState::Bootstrapping => {
                self.set_state(MemberState::Left);
                return Ok(());
            }
            MemberState::Leaving | MemberState::Left => return Ok(()),
        }
        info!("Node {} leaving", self.info);
        self.stop_loops().await;

        let pointers = self.topology.snapshot();
        let successor = pointers.successor();
        let mut result = Ok(());

        if successor.id != self.info.id {
            if let Some(predecessor) = pointers.predecessor.filter(|p| p.id != self.info.id) {
                let relink = Request::UpdateSuccessor { successors: pointers.successors.clone() };
                if let Err(err) = self.call_ack(predecessor.addr, relink).await {
                    warn!("Node {} could not relink {}: {}", self.info, predecessor, err);
                }
            }

            let relink = Request::UpdatePredecessor { predecessor: pointers.predecessor };
            if let Err(err) = self.call_ack(successor.addr, relink).await {
                warn!("Node {} could not relink {}: {}", self.info, successor, err);
            }

            let records = self.store.records();
            let count = records.len();
            result = self
                .retrying("leave transfer", move || {
                    self.call_ack(successor.addr, Request::TransferKeys { records: records.clone() })
                })
                .await;
            match &result {
                Ok(()) => info!("Node {} handed {} records to {}", self.info, count, successor),
                Err(err) => warn!("Node {} lost handoff to {}: {}", self.info, successor, err),
            }
        }

        self.set_state(MemberState::Left);
        info!("Node {} left", self.info);
        result
    }
}
