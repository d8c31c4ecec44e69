//! Recursive `find_successor` over the network.

use crate::node::Node;
use corelib::error::{Error, Result};
use corelib::network::{unexpected, Request, Response};
use corelib::node::NodeInfo;
use corelib::ring::Route;
use corelib::token::RingId;
use tracing::{debug, trace};

impl Node {
    /// Resolves the node responsible for `id`.
    pub async fn find_successor(&self, id: RingId) -> Result<NodeInfo> {
        self.find_successor_hops(id, 0).await
    }

    /// Resolves `id` after `hops` forwards. Forwarding stops with
    /// [`Error::RoutingFailure`] once `max_hops` is reached; unreachable
    /// candidates are skipped in favor of the next closest one.
    pub(crate) async fn find_successor_hops(&self, id: RingId, hops: u32) -> Result<NodeInfo> {
        let candidates = match self.topology.route(id) {
            Route::Local => return Ok(self.info),
            Route::Successor(successor) => return Ok(successor),
            Route::Forward(candidates) => candidates,
        };

        if hops >= self.config.max_hops {
            metrics::counter!("chord_kv_routing_failures_total").increment(1);
            debug!("Node {} gave up routing {} after {} hops", self.info, id, hops);
            return Err(Error::RoutingFailure { id, hops });
        }

        let mut last_error = None;
        for candidate in candidates {
            trace!("Node {} forwards {} to {} (hop {})", self.info, id, candidate, hops + 1);
            let request = Request::FindSuccessor { id, hops: hops + 1 };
            match self.call(candidate.addr, request).await {
                Ok(Response::Node(owner)) => return Ok(owner),
                Ok(other) => last_error = Some(unexpected("FIND_SUCCESSOR", &other)),
                Err(err @ Error::RoutingFailure { .. }) => return Err(err),
                Err(err) => {
                    debug!("Node {} skipping {} for {}: {}", self.info, candidate, id, err);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(Error::RoutingFailure { id, hops }))
    }

    /// Asks `contact` to resolve `id`; used before this node is part of a
    /// ring.
    pub(crate) async fn find_successor_via(&self, contact: std::net::SocketAddr, id: RingId) -> Result<NodeInfo> {
        match self.call(contact, Request::FindSuccessor { id, hops: 0 }).await? {
            Response::Node(owner) => Ok(owner),
            other => Err(unexpected("FIND_SUCCESSOR", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::node::Node;
    use async_trait::async_trait;
    use corelib::config::RingConfig;
    use corelib::error::{Error, Result};
    use corelib::network::{PeerClient, Request, RequestHandler, Response};
    use corelib::node::{MemberState, NodeInfo};
    use corelib::token::RingId;
    use dashmap::DashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;

    /// Direct in-process wiring; nodes are looked up by address.
    #[derive(Default)]
    struct Wiring {
        nodes: DashMap<SocketAddr, Arc<Node>>,
    }

    #[async_trait]
    impl PeerClient for Wiring {
        async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response> {
            let node = self
                .nodes
                .get(&addr)
                .map(|n| Arc::clone(n.value()))
                .ok_or_else(|| Error::unreachable(addr, "down"))?;
            Ok(node.handle(request).await)
        }
    }

    /// Builds a converged ring by hand, without running any loop.
    fn ring(count: u16, config: RingConfig) -> (Arc<Wiring>, Vec<Arc<Node>>) {
        let wiring = Arc::new(Wiring::default());
        let mut nodes: Vec<Arc<Node>> = (0..count)
            .map(|i| {
                let addr = SocketAddr::from(([10, 0, 0, 1], 7000 + i));
                Node::new(addr, config.clone(), wiring.clone()).unwrap()
            })
            .collect();
        nodes.sort_by_key(|n| n.id());

        let n = nodes.len();
        for (i, node) in nodes.iter().enumerate() {
            let list: Vec<NodeInfo> = (1..=config.successor_list_len)
                .map(|k| nodes[(i + k) % n].info())
                .collect();
            node.topology.refresh_successors(list[0], &list[1..]);
            node.topology.set_predecessor(Some(nodes[(i + n - 1) % n].info()));
            node.set_state(MemberState::Joined);
            wiring.nodes.insert(node.addr(), Arc::clone(node));
        }
        (wiring, nodes)
    }

    fn owner_of(nodes: &[Arc<Node>], id: RingId) -> RingId {
        nodes
            .iter()
            .find(|n| n.topology.owns(id))
            .map(|n| n.id())
            .unwrap()
    }

    #[tokio::test]
    async fn test_every_node_resolves_every_owner() {
        let config = RingConfig { successor_list_len: 2, ..RingConfig::default() };
        let (_wiring, nodes) = ring(8, config);

        for key in ["a", "b", "c", "d", "e", "f"] {
            let id = nodes[0].space().hash(key.as_bytes());
            let expected = owner_of(&nodes, id);
            for node in &nodes {
                assert_eq!(node.find_successor(id).await.unwrap().id, expected);
            }
        }
    }

    #[tokio::test]
    async fn test_routes_around_an_unreachable_candidate() {
        let config = RingConfig { successor_list_len: 3, ..RingConfig::default() };
        let (wiring, nodes) = ring(6, config);

        // owned by node 5; node 0 would normally forward to node 3
        let target = RingId(nodes[5].id().0 - 1);
        wiring.nodes.remove(&nodes[3].addr());

        let owner = nodes[0].find_successor(target).await.unwrap();
        assert_eq!(owner.id, nodes[5].id());
    }

    #[tokio::test]
    async fn test_hop_cap_yields_routing_failure() {
        let config = RingConfig {
            successor_list_len: 1,
            replication_factor: 1,
            max_hops: 1,
            ..RingConfig::default()
        };
        let (_wiring, nodes) = ring(5, config);

        // owned by node 3: node 0 -> node 1 -> node 2 needs two forwards
        let target = nodes[3].id();
        let result = nodes[0].find_successor(target).await;
        assert!(matches!(result, Err(Error::RoutingFailure { .. })), "{:?}", result);

        // one forward is within the cap
        let owner = nodes[1].find_successor(target).await.unwrap();
        assert_eq!(owner.id, nodes[3].id());
    }

    #[tokio::test]
    async fn test_single_node_owns_everything() {
        let wiring = Arc::new(Wiring::default());
        let node = Node::new(SocketAddr::from(([10, 0, 0, 1], 7000)), RingConfig::default(), wiring).unwrap();
        node.topology.create();
        for key in ["x", "y"] {
            let id = node.space().hash(key.as_bytes());
            assert_eq!(node.find_successor(id).await.unwrap(), node.info());
        }
    }
}
