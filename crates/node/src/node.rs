//! The ring member itself: shared state, lifecycle and outbound calls.

use crate::detector::FailureDetector;
use corelib::config::RingConfig;
use corelib::error::{Error, Result};
use corelib::network::{unexpected, NodeStatus, PeerClient, Request, RequestHandler, Response};
use corelib::node::{MemberState, NodeInfo};
use corelib::partitioner::IdSpace;
use corelib::ring::RingTopology;
use corelib::token::RingId;
use parking_lot::{Mutex, RwLock};
use replication::{HybridClock, LocalStore, ReplicationStrategy, SimpleStrategy};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the replication sweep last confirmed.
#[derive(Debug, Default)]
pub(crate) struct SyncState {
    /// Predecessor in effect when the owned records were last pushed.
    pub(crate) predecessor: Option<RingId>,
    /// Replica targets that hold every owned record.
    pub(crate) synced: Vec<RingId>,
}

/// One member of the ring.
///
/// A `Node` is always used behind an `Arc`: background loops hold a clone,
/// and the gateway dispatches inbound requests to it as a
/// [`RequestHandler`].
pub struct Node {
    pub(crate) info: NodeInfo,
    pub(crate) config: RingConfig,
    pub(crate) space: IdSpace,
    pub(crate) topology: RingTopology,
    pub(crate) store: LocalStore,
    pub(crate) clock: HybridClock,
    pub(crate) strategy: Box<dyn ReplicationStrategy>,
    pub(crate) detector: FailureDetector,
    pub(crate) client: Arc<dyn PeerClient>,
    pub(crate) sync: Mutex<SyncState>,
    state: RwLock<MemberState>,
    sweep_wanted: Notify,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Creates a node listening at `addr`. Its id is the hash of the
    /// address; it is not part of any ring until [`Node::create`] or
    /// [`Node::join`].
    pub fn new(addr: SocketAddr, config: RingConfig, client: Arc<dyn PeerClient>) -> Result<Arc<Self>> {
        config.validate()?;
        let space = config.id_space()?;
        let info = NodeInfo::from_addr(&space, addr);

        info!(
            "Node {} initialized ({} bits, {} hash)",
            info,
            space.bits(),
            space.hash_function().partitioner().name()
        );

        Ok(Arc::new(Self {
            info,
            topology: RingTopology::new(info, config.successor_list_len),
            store: LocalStore::new(),
            clock: HybridClock::new(info.id),
            strategy: Box::new(SimpleStrategy::new(config.replication_factor)),
            detector: FailureDetector::new(config.failure_threshold),
            client,
            sync: Mutex::new(SyncState::default()),
            state: RwLock::new(MemberState::Bootstrapping),
            sweep_wanted: Notify::new(),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            space,
            config,
        }))
    }

    pub fn info(&self) -> NodeInfo {
        self.info
    }

    pub fn id(&self) -> RingId {
        self.info.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.info.addr
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn space(&self) -> &IdSpace {
        &self.space
    }

    pub fn topology(&self) -> &RingTopology {
        &self.topology
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn state(&self) -> MemberState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: MemberState) {
        let mut current = self.state.write();
        if *current != state {
            debug!("Node {} state {} -> {}", self.info, *current, state);
            *current = state;
        }
    }

    /// True while the node takes part in the ring.
    pub fn is_joined(&self) -> bool {
        self.state() == MemberState::Joined
    }

    pub(crate) fn ensure_joined(&self) -> Result<()> {
        match self.state() {
            MemberState::Joined => Ok(()),
            other => Err(Error::NotJoined(format!("node {} is {}", self.info, other))),
        }
    }

    pub fn status(&self) -> NodeStatus {
        let pointers = self.topology.snapshot();
        NodeStatus {
            node: self.info,
            state: self.state(),
            predecessor: pointers.predecessor,
            successors: pointers.successors,
            records: self.store.len(),
        }
    }

    /// Simulates a crash: background loops stop and the node refuses all
    /// further requests, without telling any peer.
    pub fn kill(&self) {
        warn!("Node {} killed", self.info);
        self.set_state(MemberState::Left);
        self.shutdown.cancel();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    // ------------------------------------------------------------------
    // Outbound calls
    // ------------------------------------------------------------------

    /// Sends `request` to `addr` bounded by the RPC timeout. Remote errors
    /// come back as `Err`. Calls addressed to this node are served locally.
    pub(crate) async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response> {
        if addr == self.info.addr {
            return self.handle(request).await.into_result();
        }

        let name = request.name();
        match tokio::time::timeout(self.config.rpc_timeout(), self.client.call(addr, request)).await {
            Ok(response) => response?.into_result(),
            Err(_) => {
                metrics::counter!("chord_kv_rpc_timeouts_total").increment(1);
                Err(Error::unreachable(addr, format!("{} timed out", name)))
            }
        }
    }

    /// Sends a request that must be answered with `Ack`.
    pub(crate) async fn call_ack(&self, addr: SocketAddr, request: Request) -> Result<()> {
        let name = request.name();
        match self.call(addr, request).await? {
            Response::Ack => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    pub(crate) async fn ping(&self, peer: NodeInfo) -> Result<()> {
        match self.call(peer.addr, Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected("PING", &other)),
        }
    }

    pub(crate) async fn successor_list_of(&self, peer: NodeInfo) -> Result<Vec<NodeInfo>> {
        if peer.id == self.info.id {
            return Ok(self.topology.successor_list());
        }
        match self.call(peer.addr, Request::GetSuccessorList).await? {
            Response::SuccessorList(list) => Ok(list),
            other => Err(unexpected("GET_SUCCESSOR_LIST", &other)),
        }
    }

    pub(crate) async fn predecessor_of(&self, peer: NodeInfo) -> Result<Option<NodeInfo>> {
        if peer.id == self.info.id {
            return Ok(self.topology.predecessor());
        }
        match self.call(peer.addr, Request::GetPredecessor).await? {
            Response::Predecessor(predecessor) => Ok(predecessor),
            other => Err(unexpected("GET_PREDECESSOR", &other)),
        }
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error,
    /// or `request_attempts` is exhausted.
    pub(crate) async fn retrying<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.request_attempts;
        let mut last_error = None;

        for round in 1..=attempts {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    debug!("{} attempt {}/{} failed: {}", operation, round, attempts, err);
                    last_error = Some(err);
                    if round < attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        let cause = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(Error::Unavailable(format!(
            "{} failed after {} attempts: {}",
            operation, attempts, cause
        )))
    }

    // ------------------------------------------------------------------
    // Background loops
    // ------------------------------------------------------------------

    /// Asks the replication loop for an early sweep.
    pub(crate) fn request_sweep(&self) {
        self.sweep_wanted.notify_one();
    }

    /// Forgets which replica targets are in sync so the next sweep pushes
    /// every owned record again.
    pub(crate) fn invalidate_replicas(&self) {
        self.sync.lock().synced.clear();
        self.request_sweep();
    }

    pub(crate) fn start_loops(self: &Arc<Self>) {
        let config = &self.config;
        self.spawn_loop("stabilize", config.stabilize_interval(), |node| async move {
            node.stabilize().await
        });
        self.spawn_loop("fix_successors", config.fix_successors_interval(), |node| async move {
            node.fix_successors().await
        });
        self.spawn_loop("probe", config.probe_interval(), |node| async move {
            node.probe().await
        });
        self.spawn_replication_loop();
    }

    fn spawn_loop<F, Fut>(self: &Arc<Self>, name: &'static str, period: Duration, mut round: F)
    where
        F: FnMut(Arc<Node>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let node = Arc::clone(self);
        let shutdown = self.shutdown.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = round(Arc::clone(&node)) => {
                        if let Err(err) = result {
                            debug!("Node {} {} round failed: {}", node.info, name, err);
                        }
                    }
                }
            }
            debug!("Node {} {} loop stopped", node.info, name);
        });

        self.tasks.lock().push(task);
    }

    fn spawn_replication_loop(self: &Arc<Self>) {
        let node = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let period = self.config.replication_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                    _ = node.sweep_wanted.notified() => {}
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = node.replicate() => {
                        if let Err(err) = result {
                            debug!("Node {} replication round failed: {}", node.info, err);
                        }
                    }
                }
            }
            debug!("Node {} replication loop stopped", node.info);
        });

        self.tasks.lock().push(task);
    }

    /// Stops every background loop and waits for them to finish.
    pub(crate) async fn stop_loops(&self) {
        self.shutdown.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for result in futures::future::join_all(tasks).await {
            if let Err(err) = result {
                if !err.is_cancelled() {
                    warn!("Node {} background task failed: {}", self.info, err);
                }
            }
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("info", &self.info)
            .field("state", &self.state())
            .field("pointers", &self.topology.snapshot())
            .field("records", &self.store.len())
            .finish()
    }
}
