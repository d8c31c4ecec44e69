//! Simulated clusters on the in-process network.
//!
//! Tests run with `start_paused = true`, so sleeping lets every background
//! loop run many rounds in virtual time.

#![allow(dead_code)]

use corelib::config::RingConfig;
use corelib::node::MemberState;
use node::Node;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use streaming::MemoryNetwork;
use tracing_subscriber::EnvFilter;

/// Honors `RUST_LOG` when debugging a failing test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fast_config() -> RingConfig {
    RingConfig {
        stabilize_interval_ms: 50,
        fix_successors_interval_ms: 50,
        probe_interval_ms: 50,
        failure_threshold: 3,
        rpc_timeout_ms: 100,
        replication_interval_ms: 100,
        retry_delay_ms: 50,
        request_attempts: 10,
        ..RingConfig::default()
    }
}

pub fn addr(i: u16) -> SocketAddr {
    SocketAddr::from(([10, 1, 0, 1], 9000 + i))
}

pub struct Cluster {
    pub network: MemoryNetwork,
    pub config: RingConfig,
    pub nodes: Vec<Arc<Node>>,
}

impl Cluster {
    pub fn new(config: RingConfig) -> Self {
        init_tracing();
        Self {
            network: MemoryNetwork::new(),
            config,
            nodes: Vec::new(),
        }
    }

    /// Starts `size` nodes: the first creates the ring, the rest join
    /// through it one after another, then the ring settles.
    pub async fn start(size: u16) -> Self {
        Self::start_with(size, fast_config()).await
    }

    pub async fn start_with(size: u16, config: RingConfig) -> Self {
        let mut cluster = Self::new(config);
        let first = cluster.spawn(0);
        first.create().unwrap();
        for i in 1..size {
            let node = cluster.spawn(i);
            node.join(first.addr()).await.unwrap();
        }
        cluster.settle().await;
        cluster
    }

    /// Creates and registers a node that has not joined yet.
    pub fn spawn(&mut self, i: u16) -> Arc<Node> {
        let node = Node::new(addr(i), self.config.clone(), Arc::new(self.network.clone())).unwrap();
        self.network.register(node.addr(), node.clone());
        self.nodes.push(node.clone());
        node
    }

    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    /// Crash without goodbye.
    pub fn crash(&self, node: &Arc<Node>) {
        self.network.disconnect(node.addr());
        node.kill();
    }

    pub fn live(&self) -> Vec<Arc<Node>> {
        self.nodes
            .iter()
            .filter(|n| n.state() == MemberState::Joined)
            .cloned()
            .collect()
    }

    /// Live nodes in ring order.
    pub fn ring_order(&self) -> Vec<Arc<Node>> {
        let mut live = self.live();
        live.sort_by_key(|n| n.id());
        live
    }

    /// Live node owning `key` according to the converged ring.
    pub fn owner_of(&self, key: &str) -> Arc<Node> {
        let ring = self.ring_order();
        let id = ring[0].space().hash(key.as_bytes());
        ring.iter()
            .find(|n| n.id() >= id)
            .unwrap_or(&ring[0])
            .clone()
    }

    /// Live nodes storing a live value for `key`.
    pub fn holders(&self, key: &str) -> Vec<Arc<Node>> {
        self.live()
            .into_iter()
            .filter(|n| {
                let id = n.space().hash(key.as_bytes());
                n.store().value(id, key.as_bytes()).is_some()
            })
            .collect()
    }

    /// Asserts every live node points at its ring neighbors.
    pub fn assert_converged(&self) {
        let ring = self.ring_order();
        let n = ring.len();
        for (i, node) in ring.iter().enumerate() {
            let successor = &ring[(i + 1) % n];
            let predecessor = &ring[(i + n - 1) % n];
            let pointers = node.topology().snapshot();
            assert_eq!(
                pointers.successor().id,
                successor.id(),
                "{} has wrong successor: {:?}",
                node.info(),
                pointers
            );
            assert_eq!(
                pointers.predecessor.map(|p| p.id),
                Some(predecessor.id()),
                "{} has wrong predecessor: {:?}",
                node.info(),
                pointers
            );
        }
    }
}

pub fn keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{}", i)).collect()
}
