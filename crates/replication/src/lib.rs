//! Replication building blocks for the ring.
//!
//! This crate provides:
//! - A hybrid clock issuing last-write-wins versions
//! - The per-node local store with LWW merge and tombstones
//! - Pluggable replication strategies choosing replica holders from a
//!   node's successor list

pub mod clock;
pub mod store;
pub mod strategy;

pub use clock::HybridClock;
pub use store::LocalStore;
pub use strategy::{ReplicationStrategy, SimpleStrategy};
