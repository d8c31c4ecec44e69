//! Per-node view of the ring.
//!
//! The topology manager owns the predecessor pointer and the successor list
//! and makes every local routing decision. Remote hops (forwarding a lookup
//! to another node) are the runtime's job; this module only says where to go.

pub mod topology;

pub use topology::{Pointers, RemovedSuccessor, Route, RingTopology};
