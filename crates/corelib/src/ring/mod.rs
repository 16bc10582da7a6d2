//! Per-node cluster state holder.
//!
//! The ring owns the node's current [`ClusterInformation`](crate::cluster::ClusterInformation)
//! and its lifecycle statuses. All mutation goes through compare-and-swap
//! transitions so that exactly one concurrent actor wins each transition.

pub mod ring;
pub mod status;

pub use ring::Ring;
pub use status::StatusCell;
