//! The `[0, 2^m)` identifier space.

use crate::error::{Error, Result};
use crate::partitioner::HashFunction;
use crate::token::RingId;
use std::net::SocketAddr;

/// Fixed-width identifier space shared by node ids and key ids.
///
/// # Invariants
///
/// - `1 <= bits <= 64`
/// - every id produced by [`hash`](Self::hash) or [`next`](Self::next) is
///   below `2^bits`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdSpace {
    bits: u8,
    hash: HashFunction,
}

impl IdSpace {
    /// Widest supported space.
    pub const MAX_BITS: u8 = 64;

    pub fn new(bits: u8, hash: HashFunction) -> Result<Self> {
        if bits == 0 || bits > Self::MAX_BITS {
            return Err(Error::InvalidConfig(format!(
                "identifier width must be within 1..={}, got {}",
                Self::MAX_BITS,
                bits
            )));
        }
        Ok(Self { bits, hash })
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash
    }

    /// Largest id in the space, `2^bits - 1`.
    pub fn max_id(&self) -> RingId {
        RingId(self.mask())
    }

    /// Maps arbitrary bytes to a ring id. Pure and deterministic.
    pub fn hash(&self, bytes: &[u8]) -> RingId {
        let digest = self.hash.partitioner().digest(bytes);
        RingId(digest >> (Self::MAX_BITS - self.bits))
    }

    /// Identifier of the node listening on `addr`, hashed from `"ip:port"`.
    pub fn node_id(&self, addr: &SocketAddr) -> RingId {
        self.hash(addr.to_string().as_bytes())
    }

    /// Clockwise distance from `from` to `to`.
    pub fn distance(&self, from: RingId, to: RingId) -> u64 {
        to.0.wrapping_sub(from.0) & self.mask()
    }

    /// The id immediately clockwise of `id`.
    pub fn next(&self, id: RingId) -> RingId {
        RingId(id.0.wrapping_add(1) & self.mask())
    }

    fn mask(&self) -> u64 {
        if self.bits == Self::MAX_BITS {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }
}

impl Default for IdSpace {
    fn default() -> Self {
        Self {
            bits: 32,
            hash: HashFunction::Sip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_bad_widths() {
        assert!(IdSpace::new(0, HashFunction::Sip).is_err());
        assert!(IdSpace::new(65, HashFunction::Sip).is_err());
        assert!(IdSpace::new(64, HashFunction::Xxh3).is_ok());
    }

    #[test]
    fn test_hash_is_stable() {
        let space = IdSpace::default();
        assert_eq!(space.hash(b"user:42"), space.hash(b"user:42"));
        assert_ne!(space.hash(b"user:42"), space.hash(b"user:43"));
    }

    #[test]
    fn test_node_id_uses_address_text() {
        let space = IdSpace::default();
        let addr: SocketAddr = "10.0.0.1:7000".parse().unwrap();
        assert_eq!(space.node_id(&addr), space.hash(b"10.0.0.1:7000"));
    }

    #[test]
    fn test_distance_wraps() {
        let space = IdSpace::new(8, HashFunction::Sip).unwrap();
        assert_eq!(space.distance(RingId(10), RingId(20)), 10);
        assert_eq!(space.distance(RingId(250), RingId(4)), 10);
        assert_eq!(space.distance(RingId(7), RingId(7)), 0);
        assert_eq!(space.next(RingId(255)), RingId(0));
    }

    proptest! {
        #[test]
        fn prop_hash_fits_width(bits in 1u8..=64, key in proptest::collection::vec(any::<u8>(), 0..64)) {
            for hash in [HashFunction::Sip, HashFunction::Xxh3] {
                let space = IdSpace::new(bits, hash).unwrap();
                let id = space.hash(&key);
                prop_assert!(id <= space.max_id());
            }
        }

        #[test]
        fn prop_distance_round_trip(bits in 1u8..=64, a: u64, b: u64) {
            let space = IdSpace::new(bits, HashFunction::Sip).unwrap();
            let a = RingId(a & space.max_id().0);
            let b = RingId(b & space.max_id().0);
            let there = space.distance(a, b) as u128;
            let back = space.distance(b, a) as u128;
            if a == b {
                prop_assert_eq!(there + back, 0);
            } else {
                prop_assert_eq!(there + back, 1u128 << bits);
            }
        }

        #[test]
        fn prop_half_open_agrees_with_distance(bits in 2u8..=16, a: u64, b: u64, x: u64) {
            let space = IdSpace::new(bits, HashFunction::Sip).unwrap();
            let m = space.max_id().0;
            let (a, b, x) = (RingId(a & m), RingId(b & m), RingId(x & m));
            prop_assume!(a != b);
            let by_distance = x != a && space.distance(a, x) <= space.distance(a, b);
            prop_assert_eq!(x.in_half_open(a, b), by_distance);
        }
    }
}
