//! Core library for the cluster node.
//!
//! This crate provides the fundamental abstractions shared by every node:
//! - Token types and the partitioner (hash, split, midpoint)
//! - Node identity records and buckets
//! - The versioned cluster snapshot and partition table
//! - The ring: a node's compare-and-swap guarded view of the cluster

pub mod clock;
pub mod cluster;
pub mod error;
pub mod node;
pub mod partitioner;
pub mod ring;
pub mod token;

pub use cluster::{ClusterInformation, ClusterStatus, PartitionEntry, PartitionTable};
pub use error::{Error, Result};
pub use node::{Bucket, BucketState, NodeId, NodeInfo, NodeStatus, PROTOCOL_VERSION};
pub use partitioner::Partitioner;
pub use ring::Ring;
pub use token::Token;
