//! Ring identifiers and the interval arithmetic used for every
//! "lies between" decision in the protocol.
//!
//! Intervals are evaluated clockwise and wrap around zero. The bounds of an
//! interval never need the ring width: wrapping is detected purely from the
//! ordering of the two endpoints. When both endpoints are equal the interval
//! spans the whole ring (minus the endpoint itself for the open form), which
//! is what a single-node ring needs.

pub mod ring_id;

pub use ring_id::RingId;
