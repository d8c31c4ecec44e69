//! Replication strategy abstractions.
//!
//! A replication strategy decides which nodes hold copies of the keys a
//! primary owns. Strategies only see what a node knows locally: itself and
//! its successor list.
//!
//! - **SimpleStrategy**: the primary plus its next R-1 distinct successors

pub mod simple;

pub use simple::SimpleStrategy;

use corelib::node::NodeInfo;

/// Trait for replication strategies.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync) as they are shared by
/// the request path and the background sweep.
pub trait ReplicationStrategy: Send + Sync + 'static {
    /// Number of distinct nodes holding each key, primary included.
    ///
    /// # Returns
    /// Replication factor R (at least 1; 2 by default)
    fn replication_factor(&self) -> usize;

    /// Full replica set of a key owned by `primary`, primary first.
    ///
    /// # Arguments
    /// * `primary` - The key's owner
    /// * `successors` - The primary's successor list, nearest first
    ///
    /// # Returns
    /// At most R distinct nodes. Fewer when the ring is smaller than R.
    ///
    /// # Performance
    /// O(R * L) where L is the successor-list length
    fn replica_set(&self, primary: NodeInfo, successors: &[NodeInfo]) -> Vec<NodeInfo>;

    /// Nodes other than `primary` that must receive pushes.
    ///
    /// # Arguments
    /// * `primary` - The key's owner
    /// * `successors` - The primary's successor list, nearest first
    ///
    /// # Returns
    /// The replica set without its first entry
    fn replica_targets(&self, primary: NodeInfo, successors: &[NodeInfo]) -> Vec<NodeInfo> {
        self.replica_set(primary, successors)
            .into_iter()
            .skip(1)
            .collect()
    }

    /// Get the strategy name (for logging/debugging).
    ///
    /// # Returns
    /// Human-readable strategy name
    fn name(&self) -> &'static str;
}
