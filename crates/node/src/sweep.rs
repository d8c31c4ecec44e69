//! Re-replication sweep.
//!
//! Runs every replication interval and whenever pointers change. Each round:
//!
//! 1. If the predecessor moved clockwise (a node joined inside our arc),
//!    hand the keys it now owns over to it.
//! 2. Push every owned record to replica targets not known to be in sync
//!    (new targets, a new predecessor, or an earlier push that failed).
//! 3. Records outside our arc go to their owner; we drop our copy unless
//!    we are still one of the owner's replica targets.

use crate::node::Node;
use corelib::error::Result;
use corelib::network::Request;
use corelib::node::NodeInfo;
use corelib::record::Record;
use corelib::token::RingId;
use tracing::{debug, info, warn};

impl Node {
    /// One replication round. See the module docs for the steps.
    pub async fn replicate(&self) -> Result<()> {
        if !self.is_joined() {
            return Ok(());
        }
        let Some(predecessor) = self.topology.predecessor() else {
            debug!("Node {} skips replication: predecessor unknown", self.info);
            return Ok(());
        };

        let previous = self.sync.lock().predecessor;
        if previous != Some(predecessor.id) {
            if let Some(previous) = previous {
                if predecessor.id != self.info.id && predecessor.id.in_open(previous, self.info.id) {
                    let moved = self.store.records_in(previous, predecessor.id);
                    if !moved.is_empty() {
                        info!(
                            "Node {} hands {} records to new predecessor {}",
                            self.info,
                            moved.len(),
                            predecessor
                        );
                        if self.hand_off(predecessor, moved).await.is_err() {
                            // Retried next round; the sync state is untouched.
                            return Ok(());
                        }
                    }
                }
            }
            let mut sync = self.sync.lock();
            sync.predecessor = Some(predecessor.id);
            sync.synced.clear();
        }

        self.sync_replicas(predecessor).await;
        self.hand_off_foreign(predecessor).await;

        metrics::gauge!("chord_kv_records").set(self.store.len() as f64);
        Ok(())
    }

    async fn sync_replicas(&self, predecessor: NodeInfo) {
        let targets = self
            .strategy
            .replica_targets(self.info, &self.topology.successor_list());

        let stale: Vec<NodeInfo> = {
            let mut sync = self.sync.lock();
            sync.synced.retain(|id| targets.iter().any(|t| t.id == *id));
            targets
                .iter()
                .filter(|t| !sync.synced.contains(&t.id))
                .copied()
                .collect()
        };
        if stale.is_empty() {
            return;
        }

        let owned = self.store.records_in(predecessor.id, self.info.id);
        let pushes = stale.iter().map(|target| {
            let request = Request::ReplicatePush { records: owned.clone() };
            async move { (*target, self.call_ack(target.addr, request).await) }
        });

        for (target, result) in futures::future::join_all(pushes).await {
            match result {
                Ok(()) => {
                    debug!("Node {} synced {} records to {}", self.info, owned.len(), target);
                    metrics::counter!("chord_kv_replica_syncs_total").increment(1);
                    let mut sync = self.sync.lock();
                    if !sync.synced.contains(&target.id) {
                        sync.synced.push(target.id);
                    }
                }
                Err(err) => warn!("Node {} could not sync {}: {}", self.info, target, err),
            }
        }
    }

    async fn hand_off_foreign(&self, predecessor: NodeInfo) {
        let mut foreign = self.store.records_outside(predecessor.id, self.info.id);

        while let Some(first) = foreign.first() {
            let first_id = first.id;
            let owner = match self.find_successor(first_id).await {
                Ok(owner) => owner,
                Err(err) => {
                    debug!("Node {} cannot place {}: {}", self.info, first_id, err);
                    return;
                }
            };
            if owner.id == self.info.id {
                // Routing and our arc disagree until stabilization settles.
                foreign.retain(|r| r.id != first_id);
                continue;
            }

            let owner_arc = match self.predecessor_of(owner).await {
                Ok(Some(pred)) => Some(pred.id),
                Ok(None) => None,
                Err(err) => {
                    debug!("Node {} cannot reach owner {}: {}", self.info, owner, err);
                    return;
                }
            };

            let (batch, rest): (Vec<Record>, Vec<Record>) = foreign.into_iter().partition(|r| {
                r.id == first_id || owner_arc.map_or(false, |from| r.id.in_half_open(from, owner.id))
            });
            foreign = rest;

            if self.is_replica_of(owner).await {
                continue;
            }
            if let Err(err) = self.hand_off(owner, batch).await {
                debug!("Node {} handoff to {} failed: {}", self.info, owner, err);
            }
        }
    }

    /// Transfers `records` to `owner`, then drops the local copies unless
    /// this node still replicates for it. Copies overwritten since the
    /// snapshot are kept.
    async fn hand_off(&self, owner: NodeInfo, records: Vec<Record>) -> Result<()> {
        let count = records.len();
        self.call_ack(owner.addr, Request::TransferKeys { records: records.clone() })
            .await?;
        metrics::counter!("chord_kv_keys_transferred_total").increment(count as u64);

        if self.is_replica_of(owner).await {
            debug!("Node {} keeps {} records as replica of {}", self.info, count, owner);
            return Ok(());
        }

        let removed = records
            .iter()
            .filter(|record| self.store.remove_if_unchanged(record))
            .count();
        info!("Node {} moved {} records to {}", self.info, removed, owner);
        Ok(())
    }

    /// True if this node is one of `owner`'s replica targets. Assumed true
    /// when the owner cannot be asked, so nothing is dropped on doubt.
    async fn is_replica_of(&self, owner: NodeInfo) -> bool {
        match self.successor_list_of(owner).await {
            Ok(list) => self
                .strategy
                .replica_targets(owner, &list)
                .iter()
                .any(|n| n.id == self.info.id),
            Err(_) => true,
        }
    }

    /// Replica targets for the records this node owns.
    pub fn replica_targets(&self) -> Vec<NodeInfo> {
        self.strategy
            .replica_targets(self.info, &self.topology.successor_list())
    }

    /// Ids of the targets confirmed to hold every owned record.
    pub fn synced_targets(&self) -> Vec<RingId> {
        self.sync.lock().synced.clone()
    }
}
