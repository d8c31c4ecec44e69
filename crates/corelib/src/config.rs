//! Node configuration.
//!
//! Durations are kept as milliseconds so the struct round-trips through
//! JSON config files without extra adapters.

use crate::error::{Error, Result};
use crate::partitioner::{HashFunction, IdSpace};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for one ring member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Width `m` of the identifier space, in bits.
    pub id_bits: u8,
    pub hash_function: HashFunction,
    /// Number of distinct nodes holding each key (R).
    pub replication_factor: usize,
    /// Length of the successor list; must be at least R.
    pub successor_list_len: usize,
    pub stabilize_interval_ms: u64,
    pub fix_successors_interval_ms: u64,
    pub probe_interval_ms: u64,
    /// Consecutive missed probes before a peer is declared dead (K).
    pub failure_threshold: u32,
    /// Upper bound on any single outbound call.
    pub rpc_timeout_ms: u64,
    pub replication_interval_ms: u64,
    /// Hop cap for `find_successor` forwarding.
    pub max_hops: u32,
    /// Attempts for client-facing operations before `Unavailable`.
    pub request_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            id_bits: 32,
            hash_function: HashFunction::Sip,
            replication_factor: 2,
            successor_list_len: 3,
            stabilize_interval_ms: 500,
            fix_successors_interval_ms: 500,
            probe_interval_ms: 500,
            failure_threshold: 3,
            rpc_timeout_ms: 300,
            replication_interval_ms: 1_000,
            max_hops: 64,
            request_attempts: 5,
            retry_delay_ms: 250,
        }
    }
}

impl RingConfig {
    pub fn validate(&self) -> Result<()> {
        IdSpace::new(self.id_bits, self.hash_function)?;
        if self.replication_factor == 0 {
            return Err(Error::InvalidConfig(
                "replication_factor must be at least 1".into(),
            ));
        }
        if self.successor_list_len < self.replication_factor {
            return Err(Error::InvalidConfig(format!(
                "successor_list_len ({}) must be >= replication_factor ({})",
                self.successor_list_len, self.replication_factor
            )));
        }
        if self.failure_threshold == 0 {
            return Err(Error::InvalidConfig(
                "failure_threshold must be at least 1".into(),
            ));
        }
        if self.max_hops == 0 || self.request_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_hops and request_attempts must be positive".into(),
            ));
        }
        let intervals = [
            self.stabilize_interval_ms,
            self.fix_successors_interval_ms,
            self.probe_interval_ms,
            self.rpc_timeout_ms,
            self.replication_interval_ms,
        ];
        if intervals.contains(&0) {
            return Err(Error::InvalidConfig("intervals must be non-zero".into()));
        }
        Ok(())
    }

    /// Identifier space described by this config.
    pub fn id_space(&self) -> Result<IdSpace> {
        IdSpace::new(self.id_bits, self.hash_function)
    }

    pub fn stabilize_interval(&self) -> Duration {
        Duration::from_millis(self.stabilize_interval_ms)
    }

    pub fn fix_successors_interval(&self) -> Duration {
        Duration::from_millis(self.fix_successors_interval_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn replication_interval(&self) -> Duration {
        Duration::from_millis(self.replication_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
