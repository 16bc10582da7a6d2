//! Command line front end of a cluster node.
//!
//! Provides commands for:
//! - Running a node over TCP
//! - Hashing keys to tokens
//! - Previewing the partition table of a membership

pub mod commands;
pub mod config;

pub use commands::Command;
pub use config::{CliConfig, LogLevel};
