//! Replication strategies and partition table construction.
//!
//! This crate determines:
//! - How many owners every bucket gets (the replication factor)
//! - Which members own which bucket
//! - How a table is reflected into each member's bucket and mirror sets

pub mod error;
pub mod strategy;
pub mod table;

pub use error::{ReplicationError, Result};
pub use strategy::{ReplicationStrategy, SimpleStrategy};
pub use table::{assign_ownership, build_partition_table, build_with};
