//! Simple replication strategy.
//!
//! Places R copies sequentially around the ring: the primary owner and then
//! its successors, clockwise. This is the placement Chord-style rings use,
//! since the successor list already names those nodes.
//!
//! # Algorithm
//!
//! 1. Start with the primary
//! 2. Walk the primary's successor list, skipping duplicates and the primary
//! 3. Stop at R nodes or when the list runs out (rings smaller than R)

use crate::strategy::ReplicationStrategy;
use corelib::node::NodeInfo;

/// Simple replication strategy: R replicas placed on consecutive successors.
///
/// # Example
///
/// ```rust
/// use replication::{ReplicationStrategy, SimpleStrategy};
/// use corelib::{NodeInfo, RingId};
///
/// let node = |id: u64| NodeInfo::new(RingId(id), format!("127.0.0.1:{}", 7000 + id).parse().unwrap());
/// let strategy = SimpleStrategy::new(2);
/// let set = strategy.replica_set(node(1), &[node(2), node(3)]);
/// assert_eq!(set, vec![node(1), node(2)]);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleStrategy {
    /// Number of replicas to keep (including primary).
    replication_factor: usize,
}

impl SimpleStrategy {
    /// Create a new simple strategy with the given replication factor.
    ///
    /// # Arguments
    /// * `replication_factor` - Copies kept per key, primary included.
    ///   Zero is raised to 1 so the primary always holds its keys.
    ///
    /// # Example
    ///
    /// ```rust
    /// use replication::{ReplicationStrategy, SimpleStrategy};
    ///
    /// assert_eq!(SimpleStrategy::new(3).replication_factor(), 3);
    /// assert_eq!(SimpleStrategy::new(0).replication_factor(), 1);
    /// ```
    pub fn new(replication_factor: usize) -> Self {
        Self {
            replication_factor: replication_factor.max(1),
        }
    }
}

impl Default for SimpleStrategy {
    /// Two copies, primary plus one successor.
    fn default() -> Self {
        Self::new(2)
    }
}

impl ReplicationStrategy for SimpleStrategy {
    fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    fn replica_set(&self, primary: NodeInfo, successors: &[NodeInfo]) -> Vec<NodeInfo> {
        let mut replicas = Vec::with_capacity(self.replication_factor);
        replicas.push(primary);

        for node in successors {
            if replicas.len() >= self.replication_factor {
                break;
            }
            if replicas.iter().any(|r| r.id == node.id) {
                continue;
            }
            replicas.push(*node);
        }

        replicas
    }

    fn name(&self) -> &'static str {
        "SimpleStrategy"
    }
}
