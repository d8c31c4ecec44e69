//! A ring member: routing, membership maintenance, failure detection and
//! the replicated key/value operations, wired to a transport through
//! [`PeerClient`](corelib::PeerClient) and served through
//! [`RequestHandler`](corelib::RequestHandler).
//!
//! # Background tasks
//!
//! Once joined, a node runs four periodic loops until it leaves or is
//! killed:
//!
//! | Loop | Period | Work |
//! |------|--------|------|
//! | stabilize | `stabilize_interval_ms` | adopt a closer successor, notify it |
//! | fix successors | `fix_successors_interval_ms` | refresh the successor list |
//! | probe | `probe_interval_ms` | ping neighbors, declare dead after K misses |
//! | replicate | `replication_interval_ms` or on change | keep R copies, hand off foreign keys |

pub mod detector;
mod handler;
mod kv;
mod membership;
pub mod node;
mod routing;
mod sweep;

pub use detector::FailureDetector;
pub use node::Node;
