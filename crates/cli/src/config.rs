//! Top-level arguments, logging setup and ring configuration loading.

use crate::commands::Command;
use anyhow::Context;
use clap::{Args, Parser, ValueEnum};
use corelib::config::RingConfig;
use corelib::partitioner::HashFunction;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chord-kv")]
#[command(about = "Replicated key/value store on a Chord ring", long_about = None, version)]
pub struct CliConfig {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub async fn run(self) -> anyhow::Result<()> {
        self.init_tracing();
        let result = self.command.execute().await?;
        println!("{}", result);
        Ok(())
    }

    fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HashArg {
    Sip,
    Xxh3,
}

impl From<HashArg> for HashFunction {
    fn from(arg: HashArg) -> Self {
        match arg {
            HashArg::Sip => HashFunction::Sip,
            HashArg::Xxh3 => HashFunction::Xxh3,
        }
    }
}

/// Ring tuning for `start`. Flags override the JSON config file, which
/// overrides the defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct RingArgs {
    /// JSON file holding a ring configuration
    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,

    /// Copies kept of every key (R)
    #[arg(long)]
    pub replication_factor: Option<usize>,

    #[arg(long)]
    pub successor_list_len: Option<usize>,

    /// Identifier space width in bits
    #[arg(long)]
    pub id_bits: Option<u8>,

    #[arg(long, value_enum)]
    pub hash: Option<HashArg>,

    #[arg(long)]
    pub stabilize_ms: Option<u64>,

    /// Successor-list repair period
    #[arg(long)]
    pub fix_successors_ms: Option<u64>,

    #[arg(long)]
    pub probe_ms: Option<u64>,

    /// Missed probes before a peer is declared dead (K)
    #[arg(long)]
    pub failure_threshold: Option<u32>,

    #[arg(long)]
    pub rpc_timeout_ms: Option<u64>,

    /// Re-replication sweep period
    #[arg(long)]
    pub replication_ms: Option<u64>,

    /// Forwarding limit for one lookup
    #[arg(long)]
    pub max_hops: Option<u32>,

    /// Tries per client operation before giving up
    #[arg(long)]
    pub request_attempts: Option<u32>,

    #[arg(long)]
    pub retry_delay_ms: Option<u64>,
}

impl RingArgs {
    pub fn load(&self) -> anyhow::Result<RingConfig> {
        let mut config = match &self.config_file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => RingConfig::default(),
        };

        if let Some(r) = self.replication_factor {
            config.replication_factor = r;
        }
        if let Some(len) = self.successor_list_len {
            config.successor_list_len = len;
        }
        if let Some(bits) = self.id_bits {
            config.id_bits = bits;
        }
        if let Some(hash) = self.hash {
            config.hash_function = hash.into();
        }
        if let Some(ms) = self.stabilize_ms {
            config.stabilize_interval_ms = ms;
        }
        if let Some(ms) = self.fix_successors_ms {
            config.fix_successors_interval_ms = ms;
        }
        if let Some(ms) = self.probe_ms {
            config.probe_interval_ms = ms;
        }
        if let Some(k) = self.failure_threshold {
            config.failure_threshold = k;
        }
        if let Some(ms) = self.rpc_timeout_ms {
            config.rpc_timeout_ms = ms;
        }
        if let Some(ms) = self.replication_ms {
            config.replication_interval_ms = ms;
        }
        if let Some(hops) = self.max_hops {
            config.max_hops = hops;
        }
        if let Some(attempts) = self.request_attempts {
            config.request_attempts = attempts;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry_delay_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }
}
