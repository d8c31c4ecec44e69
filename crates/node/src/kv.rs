//! Client-facing PUT/GET/DELETE and the primary/replica request handlers.

use crate::node::Node;
use corelib::error::{Error, Result};
use corelib::network::{unexpected, Request, Response};
use corelib::node::NodeInfo;
use corelib::record::{Record, Version};
use tracing::{debug, trace, warn};

impl Node {
    /// Stores `value` under `key` on the key's owner and its replicas.
    pub async fn put(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_joined()?;
        let key = key.into();
        let value = value.into();
        self.retrying("put", move || self.put_once(key.clone(), Some(value.clone())))
            .await
    }

    /// Reads the current value of `key`.
    ///
    /// Falls back on the replicas when the owner is unreachable or has no
    /// copy; deleted keys report [`Error::KeyNotFound`].
    pub async fn get(&self, key: impl Into<Vec<u8>>) -> Result<Vec<u8>> {
        self.ensure_joined()?;
        let key = key.into();
        let record = self
            .retrying("get", move || self.get_once(key.clone()))
            .await?;
        record.and_then(|r| r.value).ok_or(Error::KeyNotFound)
    }

    /// Deletes `key`, leaving a tombstone so older replicas cannot revive it.
    pub async fn delete(&self, key: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_joined()?;
        let key = key.into();
        self.retrying("delete", move || self.put_once(key.clone(), None))
            .await
    }

    async fn put_once(&self, key: Vec<u8>, value: Option<Vec<u8>>) -> Result<()> {
        let id = self.space.hash(&key);
        let owner = self.find_successor(id).await?;
        trace!("Node {} routes key {} to {}", self.info, id, owner);
        let request = match value {
            Some(value) => Request::Put { key, value, version: None },
            None => Request::Delete { key, version: None },
        };
        self.call_ack(owner.addr, request).await
    }

    async fn get_once(&self, key: Vec<u8>) -> Result<Option<Record>> {
        let id = self.space.hash(&key);
        let owner = self.find_successor(id).await?;

        let mut newest: Option<Record> = None;
        let mut answered = 0usize;
        let mut last_error = None;

        match self.read_from(owner, &key).await {
            Ok(Some(record)) => return Ok(Some(record)),
            Ok(None) => answered += 1,
            Err(err) => {
                debug!("Node {} primary {} unreadable: {}", self.info, owner, err);
                last_error = Some(err);
            }
        }

        for replica in self.replicas_of(owner).await {
            match self.read_from(replica, &key).await {
                Ok(found) => {
                    answered += 1;
                    newest = newer(newest, found);
                    if newest.is_some() {
                        break;
                    }
                }
                Err(err) => {
                    debug!("Node {} replica {} unreadable: {}", self.info, replica, err);
                    last_error = Some(err);
                }
            }
        }

        if answered == 0 {
            return Err(last_error.unwrap_or_else(|| Error::unreachable(owner.addr, "no replica answered")));
        }
        Ok(newest)
    }

    async fn read_from(&self, node: NodeInfo, key: &[u8]) -> Result<Option<Record>> {
        match self.call(node.addr, Request::Get { key: key.to_vec() }).await? {
            Response::Record(record) => Ok(record),
            other => Err(unexpected("GET", &other)),
        }
    }

    /// Replica holders of keys owned by `owner`, excluding `owner`.
    ///
    /// Asks the owner for its successor list; when the owner is down, the
    /// nodes after it in our own list (or the next node on the ring) stand in.
    async fn replicas_of(&self, owner: NodeInfo) -> Vec<NodeInfo> {
        if self.strategy.replication_factor() <= 1 {
            return Vec::new();
        }

        let successors = match self.successor_list_of(owner).await {
            Ok(list) => list,
            Err(_) => {
                let local = self.topology.successor_list();
                match local.iter().position(|n| n.id == owner.id) {
                    Some(at) => local[at + 1..].to_vec(),
                    None => match self.find_successor(self.space.next(owner.id)).await {
                        Ok(next) if next.id != owner.id => vec![next],
                        _ => Vec::new(),
                    },
                }
            }
        };

        self.strategy.replica_targets(owner, &successors)
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Primary write. Stamps a version unless one is given, stores it and
    /// pushes it to the replica targets before acknowledging.
    pub(crate) async fn handle_write(&self, key: Vec<u8>, value: Option<Vec<u8>>, version: Option<Version>) -> Result<()> {
        self.ensure_joined()?;
        let version = match version {
            Some(version) => {
                self.clock.observe(version);
                version
            }
            None => self.clock.tick(),
        };

        let id = self.space.hash(&key);
        if !self.topology.owns(id) {
            debug!("Node {} accepts write for {} outside its arc", self.info, id);
        }

        let record = Record { id, key, value, version };
        if self.store.apply(record.clone()) {
            metrics::counter!("chord_kv_writes_total").increment(1);
        }
        self.push_to_replicas(vec![record]).await;
        Ok(())
    }

    pub(crate) fn handle_read(&self, key: &[u8]) -> Result<Option<Record>> {
        let id = self.space.hash(key);
        Ok(self.store.get(id, key))
    }

    /// Ownership handoff from a leaving node or a node whose arc shrank.
    pub(crate) fn handle_transfer(&self, records: Vec<Record>) -> Result<()> {
        self.ensure_joined()?;
        let received = records.len();
        let applied = self.absorb(records);
        debug!("Node {} absorbed {}/{} transferred records", self.info, applied, received);
        if applied > 0 {
            self.invalidate_replicas();
        }
        Ok(())
    }

    pub(crate) fn handle_replicate(&self, records: Vec<Record>) -> Result<()> {
        self.ensure_joined()?;
        let applied = self.absorb(records);
        trace!("Node {} applied {} replica records", self.info, applied);
        Ok(())
    }

    fn absorb(&self, records: Vec<Record>) -> usize {
        for record in &records {
            self.clock.observe(record.version);
        }
        self.store.apply_all(records)
    }

    /// Pushes `records` to the current replica targets. A failed push marks
    /// the target out of sync so the next sweep sends it everything.
    pub(crate) async fn push_to_replicas(&self, records: Vec<Record>) {
        let targets = self
            .strategy
            .replica_targets(self.info, &self.topology.successor_list());
        if targets.is_empty() || records.is_empty() {
            return;
        }

        let pushes = targets.iter().map(|target| {
            let request = Request::ReplicatePush { records: records.clone() };
            async move { (*target, self.call_ack(target.addr, request).await) }
        });
        for (target, result) in futures::future::join_all(pushes).await {
            if let Err(err) = result {
                warn!("Node {} replica push to {} failed: {}", self.info, target, err);
                self.sync.lock().synced.retain(|id| *id != target.id);
                self.request_sweep();
            }
        }
    }
}

fn newer(current: Option<Record>, found: Option<Record>) -> Option<Record> {
    match (current, found) {
        (Some(a), Some(b)) => Some(if b.version > a.version { b } else { a }),
        (a, b) => a.or(b),
    }
}
