//! Identifier space and the hash functions that map bytes onto it.
//!
//! Partitioners turn an arbitrary byte string into a 64-bit digest. The
//! [`IdSpace`] keeps the top `m` bits of that digest, so node addresses and
//! keys land on the same `[0, 2^m)` ring.

pub mod sip;
pub mod space;
pub mod traits;
pub mod xxh3;

pub use sip::SipPartitioner;
pub use space::IdSpace;
pub use traits::Partitioner;
pub use xxh3::Xxh3Partitioner;

use serde::{Deserialize, Serialize};

/// Selects the partitioner backing an [`IdSpace`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashFunction {
    /// SipHash-1-3 with a fixed all-zero key.
    #[default]
    Sip,
    /// XXH3, 64-bit variant.
    Xxh3,
}

impl HashFunction {
    /// Returns the partitioner implementing this hash function.
    pub fn partitioner(&self) -> &'static dyn Partitioner {
        match self {
            HashFunction::Sip => &SipPartitioner,
            HashFunction::Xxh3 => &Xxh3Partitioner,
        }
    }
}
