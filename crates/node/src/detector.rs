//! Failure detection by periodic probing.
//!
//! Every probe period the node pings its predecessor and each successor-list
//! entry concurrently. A peer that misses `failure_threshold` consecutive
//! probes is declared dead and removed from the local pointers; any answer
//! resets its count.

use crate::node::Node;
use corelib::error::{Error, Result};
use corelib::network::Request;
use corelib::node::NodeInfo;
use corelib::token::RingId;
use dashmap::DashMap;
use tracing::{debug, info, warn};

/// Consecutive-miss counters per monitored peer.
#[derive(Debug)]
pub struct FailureDetector {
    threshold: u32,
    misses: DashMap<RingId, u32>,
}

impl FailureDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            misses: DashMap::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record_success(&self, peer: RingId) {
        self.misses.remove(&peer);
    }

    /// Counts a missed probe. Returns true when the peer reaches the
    /// threshold; its counter starts over afterwards.
    pub fn record_miss(&self, peer: RingId) -> bool {
        let count = {
            let mut entry = self.misses.entry(peer).or_insert(0);
            *entry += 1;
            *entry
        };
        if count >= self.threshold {
            self.misses.remove(&peer);
            true
        } else {
            false
        }
    }

    pub fn misses(&self, peer: RingId) -> u32 {
        self.misses.get(&peer).map(|count| *count).unwrap_or(0)
    }

    /// Drops counters of peers that are no longer monitored.
    pub fn retain(&self, monitored: &[NodeInfo]) {
        self.misses
            .retain(|id, _| monitored.iter().any(|node| node.id == *id));
    }
}

impl Node {
    /// One probe round over the predecessor and the successor list.
    pub async fn probe(&self) -> Result<()> {
        if !self.is_joined() {
            return Ok(());
        }

        let monitored = self.topology.monitored();
        self.detector.retain(&monitored);

        let rounds = monitored.iter().map(|peer| async move { (*peer, self.ping(*peer).await) });
        for (peer, result) in futures::future::join_all(rounds).await {
            match result {
                Ok(()) => self.detector.record_success(peer.id),
                Err(err) => {
                    debug!("Node {} missed probe to {}: {}", self.info, peer, err);
                    if self.detector.record_miss(peer.id) {
                        self.declare_dead(peer).await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Removes `peer` from the local pointers and repairs around it.
    pub(crate) async fn declare_dead(&self, peer: NodeInfo) {
        warn!(
            "Node {}: {} after {} missed probes",
            self.info,
            Error::NodeDeclaredDead(peer.id),
            self.detector.threshold()
        );
        metrics::counter!("chord_kv_nodes_declared_dead_total").increment(1);

        if self.topology.clear_predecessor(peer.id) {
            info!("Node {} cleared predecessor {}", self.info, peer);
        }

        if let Some(removed) = self.topology.remove_successor(peer.id) {
            if removed.was_successor {
                if removed.successor.id == self.info.id {
                    // Nothing left in the list; fall back on the predecessor
                    // through stabilize, or become a ring of one.
                    if self.topology.predecessor().is_none() {
                        info!("Node {} is alone in its ring", self.info);
                        self.topology.create();
                    }
                } else {
                    info!("Node {} promoted {} to successor", self.info, removed.successor);
                    let notify = Request::Notify { candidate: self.info };
                    if let Err(err) = self.call_ack(removed.successor.addr, notify).await {
                        debug!("Node {} could not notify {}: {}", self.info, removed.successor, err);
                    }
                }
            }
        }

        self.invalidate_replicas();
    }
}
