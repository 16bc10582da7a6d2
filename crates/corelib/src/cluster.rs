//! Shared cluster state: the unit of convergence between nodes.
//!
//! A [`ClusterInformation`] is a value. Nodes never mutate one in place;
//! every change produces a new snapshot that replaces the held one
//! wholesale (see [`crate::ring::Ring::update_cluster_info`]).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::now_millis;
use crate::node::{Bucket, NodeId, NodeInfo};
use crate::token::Token;

/// Convergence phase of the cluster, as seen by one node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ClusterStatus {
    /// No coordinator is known; an election must run.
    Elect,
    /// An election is in progress.
    Electing,
    Running,
    /// Membership changed and the partition table is stale.
    Repair,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Elect => "ELECT",
            Self::Electing => "ELECTING",
            Self::Running => "RUNNING",
            Self::Repair => "REPAIR",
        };
        f.write_str(name)
    }
}

/// One row of the partition table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub bucket: Bucket,
    /// Owners, primary first.
    pub owners: Vec<NodeId>,
}

/// Mapping from bucket to owning members, sorted by bucket start.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    replication_factor: usize,
    entries: Vec<PartitionEntry>,
}

impl PartitionTable {
    pub fn new(replication_factor: usize, mut entries: Vec<PartitionEntry>) -> Self {
        entries.sort_by(|a, b| a.bucket.cmp(&b.bucket));
        Self {
            replication_factor,
            entries,
        }
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    pub fn entries(&self) -> &[PartitionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose bucket contains `token`.
    pub fn entry_for(&self, token: &Token) -> Option<&PartitionEntry> {
        // first entry starting after the token, then step back one
        let idx = self.entries.partition_point(|e| e.bucket.start <= *token);
        let entry = self.entries.get(idx.checked_sub(1)?)?;
        entry.bucket.contains(token).then_some(entry)
    }

    /// Owners of `token`, primary first. Empty if no bucket covers it.
    pub fn owners_of(&self, token: &Token) -> &[NodeId] {
        self.entry_for(token)
            .map(|e| e.owners.as_slice())
            .unwrap_or(&[])
    }

    /// Buckets `id` is primary for, and buckets it mirrors.
    pub fn ownership_of(&self, id: NodeId) -> (BTreeSet<Bucket>, BTreeSet<Bucket>) {
        let mut primary = BTreeSet::new();
        let mut mirrors = BTreeSet::new();
        for entry in &self.entries {
            match entry.owners.iter().position(|o| *o == id) {
                Some(0) => {
                    primary.insert(entry.bucket);
                }
                Some(_) => {
                    mirrors.insert(entry.bucket);
                }
                None => {}
            }
        }
        (primary, mirrors)
    }
}

/// Versioned snapshot of the cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterInformation {
    pub coordinator: Option<NodeInfo>,
    /// Members ordered by address.
    pub members: BTreeSet<NodeInfo>,
    /// Node that authored this snapshot.
    pub sender: NodeInfo,
    pub status: ClusterStatus,
    pub partition_table: PartitionTable,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl ClusterInformation {
    /// A brand-new cluster whose only member and coordinator is `local`.
    pub fn single(local: NodeInfo, created_at: u64) -> Self {
        let mut members = BTreeSet::new();
        members.insert(local.clone());
        Self {
            coordinator: Some(local.clone()),
            members,
            sender: local,
            status: ClusterStatus::Running,
            partition_table: PartitionTable::default(),
            created_at,
        }
    }

    /// Ordering key of snapshots: creation time, ties broken by the
    /// sender's address.
    pub fn version(&self) -> (u64, &str) {
        (self.created_at, self.sender.address.as_str())
    }

    /// True if `self` must not be replaced by `candidate`.
    pub fn is_newer_than(&self, candidate: &ClusterInformation) -> bool {
        self.version() > candidate.version()
    }

    /// Timestamp for a snapshot authored after this one: now, but always
    /// strictly later than `created_at`.
    pub fn next_timestamp(&self) -> u64 {
        now_millis().max(self.created_at.saturating_add(1))
    }

    pub fn member(&self, address: &str) -> Option<&NodeInfo> {
        self.members.iter().find(|m| m.address == address)
    }

    pub fn is_member(&self, node: &NodeInfo) -> bool {
        self.members.contains(node)
    }

    pub fn is_coordinator(&self, node: &NodeInfo) -> bool {
        self.coordinator.as_ref().is_some_and(|c| c.is(node))
    }

    /// Member ids in ring (address) order.
    pub fn member_ids(&self) -> Vec<NodeId> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// Inserts `node`, replacing a stale entry for the same address.
    /// Returns true if the address was not a member before.
    pub fn upsert_member(&mut self, node: NodeInfo) -> bool {
        self.members.replace(node).is_none()
    }

    /// Removes `node` (by address), clearing the coordinator if it was the
    /// coordinator. Returns true if it was a member.
    pub fn remove_member(&mut self, node: &NodeInfo) -> bool {
        if self.is_coordinator(node) {
            self.coordinator = None;
        }
        self.members.remove(node)
    }
}

impl fmt::Display for ClusterInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClusterInformation(status={}, members={}, coordinator={}, created_at={}, sender={})",
            self.status,
            self.members.len(),
            self.coordinator
                .as_ref()
                .map(|c| c.address.as_str())
                .unwrap_or("-"),
            self.created_at,
            self.sender.address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(addr: &str) -> NodeInfo {
        NodeInfo::from_address(addr)
    }

    #[test]
    fn test_version_tie_breaks_on_sender_address() {
        let a = ClusterInformation::single(node("10.0.0.1:1"), 100);
        let b = ClusterInformation::single(node("10.0.0.2:1"), 100);
        assert!(b.is_newer_than(&a));
        assert!(!a.is_newer_than(&b));
        assert!(!a.is_newer_than(&a.clone()));
    }

    #[test]
    fn test_next_timestamp_is_strictly_later() {
        let far_future = u64::MAX / 2;
        let info = ClusterInformation::single(node("10.0.0.1:1"), far_future);
        assert_eq!(info.next_timestamp(), far_future + 1);
    }

    #[test]
    fn test_upsert_and_remove_member() {
        let mut info = ClusterInformation::single(node("10.0.0.1:1"), 1);
        assert!(info.upsert_member(node("10.0.0.2:1")));
        assert!(!info.upsert_member(node("10.0.0.2:1")));
        assert_eq!(info.members.len(), 2);

        let coordinator = node("10.0.0.1:1");
        assert!(info.remove_member(&coordinator));
        assert!(info.coordinator.is_none());
        assert!(!info.remove_member(&coordinator));
    }

    #[test]
    fn test_table_lookup() {
        let a = NodeId(1);
        let b = NodeId(2);
        let table = PartitionTable::new(
            1,
            vec![
                PartitionEntry {
                    bucket: Bucket::new(Token::from_u128(100), Token::from_u128(u128::MAX)),
                    owners: vec![b],
                },
                PartitionEntry {
                    bucket: Bucket::new(Token::from_u128(0), Token::from_u128(99)),
                    owners: vec![a],
                },
            ],
        );
        assert_eq!(table.owners_of(&Token::from_u128(0)), &[a]);
        assert_eq!(table.owners_of(&Token::from_u128(99)), &[a]);
        assert_eq!(table.owners_of(&Token::from_u128(100)), &[b]);
        assert!(PartitionTable::default()
            .owners_of(&Token::from_u128(5))
            .is_empty());

        let (primary, mirrors) = table.ownership_of(a);
        assert_eq!(primary.len(), 1);
        assert!(mirrors.is_empty());
    }
}
