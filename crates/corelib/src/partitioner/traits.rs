//! Core partitioner trait definitions.

/// A partitioner converts keys into ring positions.
///
/// Partitioners are stateless and thread-safe, allowing concurrent
/// hashing without synchronization. The digest must be stable across
/// processes and platforms: two nodes hashing the same key must agree.
pub trait Partitioner: Send + Sync + 'static {
    /// Full 64-bit digest of `key`.
    ///
    /// # Arguments
    /// * `key` - Raw bytes to hash (a client key or a node's `ip:port`)
    ///
    /// # Returns
    /// The untruncated digest. [`IdSpace`](crate::partitioner::IdSpace)
    /// keeps its top `m` bits as the ring identifier.
    ///
    /// # Performance
    /// O(len) in the key length, no allocation.
    ///
    /// # Example
    ///
    /// ```rust
    /// use corelib::partitioner::{Partitioner, SipPartitioner, Xxh3Partitioner};
    ///
    /// let a = SipPartitioner.digest(b"user:42");
    /// assert_eq!(a, SipPartitioner.digest(b"user:42"));
    /// assert_ne!(a, SipPartitioner.digest(b"user:43"));
    /// assert_eq!(Xxh3Partitioner.digest(b"x"), Xxh3Partitioner.digest(b"x"));
    /// ```
    fn digest(&self, key: &[u8]) -> u64;

    /// Returns the name of this partitioner.
    ///
    /// # Returns
    /// Human-readable partitioner name, used in status output and logs
    fn name(&self) -> &'static str;
}
