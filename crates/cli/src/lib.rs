//! Command-line front end for chord-kv.
//!
//! Provides commands for:
//! - Running a node (creating a ring or joining one)
//! - Client PUT/GET/DELETE against any member
//! - Inspecting a node's ring pointers

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::{CliConfig, RingArgs};
