//! In-process network for running many nodes inside one runtime.
//!
//! Each message is still pushed through the frame codec so that anything a
//! node sends must be expressible on the wire. Nodes can be disconnected
//! (crash: calls fail at once) or hung (calls never complete, exercising the
//! caller's timeouts).

use crate::codec::{decode, encode};
use async_trait::async_trait;
use corelib::error::{Error, Result};
use corelib::network::{PeerClient, Request, RequestHandler, Response};
use dashmap::{DashMap, DashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone, Default)]
pub struct MemoryNetwork {
    handlers: Arc<DashMap<SocketAddr, Arc<dyn RequestHandler>>>,
    hung: Arc<DashSet<SocketAddr>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `addr` reachable, replacing any previous handler.
    pub fn register(&self, addr: SocketAddr, handler: Arc<dyn RequestHandler>) {
        self.hung.remove(&addr);
        self.handlers.insert(addr, handler);
    }

    /// Removes `addr`; later calls fail immediately. Returns false if it was
    /// not registered.
    pub fn disconnect(&self, addr: SocketAddr) -> bool {
        self.hung.remove(&addr);
        self.handlers.remove(&addr).is_some()
    }

    /// Calls made to `addr` from now on never complete; only the caller's
    /// timeout ends them. Calls already pending stay pending after
    /// [`MemoryNetwork::resume`], which only affects later calls.
    pub fn hang(&self, addr: SocketAddr) {
        self.hung.insert(addr);
    }

    /// Lets later calls to `addr` through again.
    pub fn resume(&self, addr: SocketAddr) {
        self.hung.remove(&addr);
    }

    pub fn is_connected(&self, addr: SocketAddr) -> bool {
        self.handlers.contains_key(&addr)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl PeerClient for MemoryNetwork {
    async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response> {
        if self.hung.contains(&addr) {
            trace!("{} to {} swallowed", request.name(), addr);
            futures::future::pending::<()>().await;
        }

        // Clone the handler out so no map guard is held across the await.
        let handler = self
            .handlers
            .get(&addr)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::unreachable(addr, "connection refused"))?;

        let request: Request = decode(&encode(&request)?)?;
        let response = handler.handle(request).await;
        decode(&encode(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, request: Request) -> Response {
            match request {
                Request::Ping => Response::Pong,
                other => Response::Error(Error::UnexpectedResponse(other.name().to_string())),
            }
        }
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_registered_node_answers() {
        let network = MemoryNetwork::new();
        network.register(addr(1), Arc::new(Echo));
        let response = network.call(addr(1), Request::Ping).await.unwrap();
        assert_eq!(response, Response::Pong);
    }

    #[tokio::test]
    async fn test_disconnected_node_is_unreachable() {
        let network = MemoryNetwork::new();
        network.register(addr(1), Arc::new(Echo));
        assert!(network.disconnect(addr(1)));
        assert!(!network.disconnect(addr(1)));

        let result = network.call(addr(1), Request::Ping).await;
        assert!(matches!(result, Err(Error::PeerUnreachable { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_node_never_answers() {
        let network = MemoryNetwork::new();
        network.register(addr(1), Arc::new(Echo));
        network.hang(addr(1));

        let call = network.call(addr(1), Request::Ping);
        let result = tokio::time::timeout(Duration::from_secs(5), call).await;
        assert!(result.is_err());

        network.resume(addr(1));
        assert!(network.call(addr(1), Request::Ping).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_only_releases_later_calls() {
        let network = MemoryNetwork::new();
        network.register(addr(1), Arc::new(Echo));
        network.hang(addr(1));

        let stuck = {
            let network = network.clone();
            tokio::spawn(async move { network.call(addr(1), Request::Ping).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        network.resume(addr(1));

        assert_eq!(network.call(addr(1), Request::Ping).await.unwrap(), Response::Pong);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!stuck.is_finished());
        stuck.abort();
    }
}
