//! Node abstractions for the cluster.
//!
//! Nodes represent participants in the ring. They are identified by a
//! compact `NodeId` that is cheap to compare and hash, but ring traversal,
//! deduplication and equality all go through the network address: two
//! [`NodeInfo`] values for the same address are the same node, whatever
//! their status.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

use crate::clock::now_millis;
use crate::token::Token;

/// Version of the node RPC payloads spoken by this build.
pub const PROTOCOL_VERSION: u32 = 1;

/// Compact identifier for a node in the cluster.
///
/// Newtype over `u128` so comparisons and hashing are very fast while giving
/// plenty of space for uniqueness.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u128);

impl NodeId {
    /// Stable id derived from a network address.
    pub fn from_address(address: &str) -> Self {
        NodeId(xxh3_128(address.as_bytes()))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Lifecycle of a single node.
///
/// ```text
/// StartUp -> StartingUp -> Setup -> SettingUp -> Up <-> Repair -> Synchronization
///                                        \
///                                         -> Shutdown
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum NodeStatus {
    StartUp,
    StartingUp,
    Setup,
    SettingUp,
    Up,
    Repair,
    Synchronization,
    Shutdown,
}

impl NodeStatus {
    /// True once the node has joined (or created) a cluster and not left it.
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Up | Self::Repair | Self::Synchronization)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartUp => "START_UP",
            Self::StartingUp => "STARTING_UP",
            Self::Setup => "SETUP",
            Self::SettingUp => "SETTING_UP",
            Self::Up => "UP",
            Self::Repair => "REPAIR",
            Self::Synchronization => "SYNCHRONIZATION",
            Self::Shutdown => "SHUTDOWN",
        };
        f.write_str(name)
    }
}

/// Rebalancing state of a bucket.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum BucketState {
    Ok,
    Balancing,
    Remove,
}

/// Contiguous, inclusive token range `[start, end]`.
///
/// Buckets are compared by their start token only; the partitioner never
/// produces two buckets with the same start.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Bucket {
    pub start: Token,
    pub end: Token,
    pub state: BucketState,
}

impl Bucket {
    pub fn new(start: Token, end: Token) -> Self {
        Self {
            start,
            end,
            state: BucketState::Balancing,
        }
    }

    #[inline]
    pub fn contains(&self, token: &Token) -> bool {
        self.start <= *token && *token <= self.end
    }

    pub fn with_state(mut self, state: BucketState) -> Self {
        self.state = state;
        self
    }
}

impl PartialEq for Bucket {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
    }
}

impl Eq for Bucket {}

impl PartialOrd for Bucket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bucket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start.cmp(&other.start)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Identity and ownership record of a cluster member.
///
/// Keep this struct cheap to clone; it is copied into every published
/// cluster snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    /// Network address, `host:port`.
    pub address: String,
    pub protocol_version: u32,
    pub status: NodeStatus,
    /// Milliseconds since the Unix epoch of the last status change.
    pub last_updated: u64,
    /// Buckets this node is the primary owner of.
    pub buckets: BTreeSet<Bucket>,
    /// Buckets this node holds replicas of.
    pub mirrors: BTreeSet<Bucket>,
}

impl NodeInfo {
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            protocol_version: PROTOCOL_VERSION,
            status: NodeStatus::StartUp,
            last_updated: now_millis(),
            buckets: BTreeSet::new(),
            mirrors: BTreeSet::new(),
        }
    }

    /// Node whose id is derived from its address.
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        Self::new(NodeId::from_address(&address), address)
    }

    /// Copy of this record carrying `status`, stamped now.
    pub fn with_status(&self, status: NodeStatus) -> Self {
        let mut info = self.clone();
        info.status = status;
        info.last_updated = now_millis();
        info
    }

    /// True if `token` falls in one of this node's buckets or mirrors.
    pub fn owns(&self, token: &Token) -> bool {
        self.buckets.iter().any(|b| b.contains(token))
            || self.mirrors.iter().any(|b| b.contains(token))
    }

    /// Same node (same address) as `other`.
    #[inline]
    pub fn is(&self, other: &NodeInfo) -> bool {
        self.address == other.address
    }
}

impl PartialEq for NodeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for NodeInfo {}

impl Hash for NodeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl PartialOrd for NodeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.address)
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.address, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_status() {
        let a = NodeInfo::from_address("10.0.0.1:7000");
        let b = a.with_status(NodeStatus::Up);
        assert_eq!(a, b);

        let mut set = BTreeSet::new();
        set.insert(a);
        // A fresher record for the same address replaces nothing by itself...
        assert!(!set.insert(b.clone()));
        // ...so callers replace explicitly.
        set.replace(b);
        assert_eq!(set.iter().next().unwrap().status, NodeStatus::Up);
    }

    #[test]
    fn test_ordering_by_address() {
        let a = NodeInfo::from_address("10.0.0.1:7000");
        let b = NodeInfo::from_address("10.0.0.2:7000");
        assert!(a < b);
    }

    #[test]
    fn test_bucket_contains_is_inclusive() {
        let bucket = Bucket::new(Token::from_u128(10), Token::from_u128(20));
        assert!(bucket.contains(&Token::from_u128(10)));
        assert!(bucket.contains(&Token::from_u128(20)));
        assert!(!bucket.contains(&Token::from_u128(21)));
        assert_eq!(bucket.state, BucketState::Balancing);
    }

    #[test]
    fn test_owns_checks_mirrors() {
        let mut node = NodeInfo::from_address("10.0.0.1:7000");
        node.mirrors
            .insert(Bucket::new(Token::from_u128(0), Token::from_u128(5)));
        assert!(node.owns(&Token::from_u128(3)));
        assert!(!node.owns(&Token::from_u128(6)));
    }
}
