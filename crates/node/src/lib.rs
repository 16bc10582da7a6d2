//! A peer node of the storage cluster.
//!
//! Nodes discover each other through seeds, converge on one coordinator,
//! keep the partition table in line with membership, and keep every
//! node's view of the cluster eventually consistent:
//!
//! - [`ServerNode`]: the local node, its lifecycle handlers and RPC surface
//! - [`WatchDog`]: the periodic driver of the lifecycle state machine
//! - [`AntiEntropy`]: coordinator pulls, member pings, elections
//! - [`NodeRegistry`]: address to [`NodeRef`] resolution

pub mod config;
pub mod convergence;
mod election;
pub mod error;
mod lifecycle;
pub mod node;
pub mod registry;
pub mod remote;
pub mod server;
pub mod watchdog;

pub use config::NodeConfig;
pub use convergence::AntiEntropy;
pub use error::{NodeError, Result};
pub use node::{Node, NodeRef};
pub use registry::NodeRegistry;
pub use remote::RemoteNode;
pub use server::{NodeTasks, ServerNode};
pub use watchdog::{Tick, WatchDog};
