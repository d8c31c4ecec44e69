//! Core library for the chord-kv ring.
//!
//! This crate provides the fundamental abstractions shared by every node:
//! - Identifier space and partitioners
//! - Node identity and lifecycle states
//! - Ring topology (predecessor, successor list) and local routing
//! - Versioned records
//! - The logical peer message set and gateway traits
//! - Configuration and the error taxonomy

pub mod config;
pub mod error;
pub mod network;
pub mod node;
pub mod partitioner;
pub mod record;
pub mod ring;
pub mod token;

pub use config::RingConfig;
pub use error::{Error, Result};
pub use network::{NodeStatus, PeerClient, Request, RequestHandler, Response};
pub use node::{MemberState, NodeInfo};
pub use partitioner::{HashFunction, IdSpace, Partitioner};
pub use record::{Record, Version};
pub use ring::{Pointers, Route, RingTopology};
pub use token::RingId;
