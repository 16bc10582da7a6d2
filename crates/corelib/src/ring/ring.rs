//! The ring: a node's view of the cluster.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::now_millis;
use crate::cluster::{ClusterInformation, ClusterStatus};
use crate::node::{NodeId, NodeInfo, NodeStatus};
use crate::partitioner;
use crate::ring::status::StatusCell;

/// Holder of the current cluster snapshot and the local node's statuses.
///
/// # Concurrency Model
///
/// - The snapshot is an `Arc<ClusterInformation>` replaced by
///   compare-and-swap on pointer identity. The lock only guards the pointer
///   swap itself and is never held across an RPC.
/// - Readers get an `Arc` to a complete snapshot and never observe a
///   partially built one.
/// - Node and ring statuses only move through expected -> new transitions.
#[derive(Debug)]
pub struct Ring {
    local: NodeInfo,
    last_updated: AtomicU64,
    node_status: StatusCell<NodeStatus>,
    ring_status: StatusCell<ClusterStatus>,
    current: RwLock<Option<Arc<ClusterInformation>>>,
}

impl Ring {
    /// Creates a ring for `local`, in `StartUp` with no known coordinator.
    pub fn new(local: NodeInfo) -> Self {
        Self {
            last_updated: AtomicU64::new(local.last_updated),
            local,
            node_status: StatusCell::new("node", NodeStatus::StartUp),
            ring_status: StatusCell::new("ring", ClusterStatus::Elect),
            current: RwLock::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.local.address
    }

    pub fn local_id(&self) -> NodeId {
        self.local.id
    }

    /// The local node as peers should see it: current status, and the
    /// buckets the held snapshot assigns to it.
    pub fn local_info(&self) -> NodeInfo {
        let mut info = self.local.clone();
        info.status = self.node_status();
        info.last_updated = self.last_updated.load(Ordering::Acquire);
        if let Some(current) = self.cluster_info() {
            if let Some(me) = current.member(&info.address) {
                info.buckets = me.buckets.clone();
                info.mirrors = me.mirrors.clone();
            }
        }
        info
    }

    pub fn is_local(&self, node: &NodeInfo) -> bool {
        node.address == self.local.address
    }

    // -- statuses --

    pub fn node_status(&self) -> NodeStatus {
        self.node_status.get()
    }

    pub fn transition_node(&self, expected: NodeStatus, new: NodeStatus) -> bool {
        let moved = self.node_status.transition(expected, new);
        if moved {
            // strictly increasing, so peers can order two changes made within one millisecond
            let _ = self
                .last_updated
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                    Some(now_millis().max(prev.saturating_add(1)))
                });
        }
        moved
    }

    pub fn ring_status(&self) -> ClusterStatus {
        self.ring_status.get()
    }

    pub fn transition_ring(&self, expected: ClusterStatus, new: ClusterStatus) -> bool {
        self.ring_status.transition(expected, new)
    }

    // -- snapshot --

    pub fn cluster_info(&self) -> Option<Arc<ClusterInformation>> {
        self.current.read().clone()
    }

    /// Timestamp for a snapshot authored now by this node.
    pub fn next_timestamp(&self) -> u64 {
        self.cluster_info()
            .map(|c| c.next_timestamp())
            .unwrap_or_else(now_millis)
    }

    /// Replaces the snapshot with `new` if the held one is still `expected`
    /// (pointer identity; `None` means nothing is held).
    pub fn compare_and_swap(
        &self,
        expected: Option<&Arc<ClusterInformation>>,
        new: Arc<ClusterInformation>,
    ) -> bool {
        let mut current = self.current.write();
        let unchanged = match (current.as_ref(), expected) {
            (None, None) => true,
            (Some(held), Some(expected)) => Arc::ptr_eq(held, expected),
            _ => false,
        };
        if unchanged {
            *current = Some(new);
        }
        unchanged
    }

    /// Most-recent-wins merge. Rejects `candidate` (returning false and
    /// changing nothing) if the held snapshot has a higher version;
    /// otherwise replaces the held snapshot wholesale.
    pub fn update_cluster_info(&self, candidate: ClusterInformation) -> bool {
        let candidate = Arc::new(candidate);
        loop {
            let current = self.cluster_info();
            if let Some(held) = &current {
                if held.is_newer_than(&candidate) {
                    tracing::debug!(
                        node = %self.local.address,
                        held = held.created_at,
                        candidate = candidate.created_at,
                        "rejecting stale cluster information"
                    );
                    metrics::counter!("cluster_info_updates_rejected_total").increment(1);
                    return false;
                }
            }
            if self.compare_and_swap(current.as_ref(), Arc::clone(&candidate)) {
                metrics::counter!("cluster_info_updates_accepted_total").increment(1);
                return true;
            }
        }
    }

    /// Authors a new snapshot: applies `change` to a copy of the held one,
    /// stamps it with this node as sender and a strictly later timestamp.
    ///
    /// `change` returns false to abandon the update. Returns the published
    /// snapshot, or `None` if nothing is held or `change` declined.
    pub fn publish<F>(&self, mut change: F) -> Option<Arc<ClusterInformation>>
    where
        F: FnMut(&mut ClusterInformation) -> bool,
    {
        loop {
            let current = self.cluster_info()?;
            let mut next = (*current).clone();
            self.refresh_entry(&mut next);
            if !change(&mut next) {
                return None;
            }
            next.sender = self.local_info();
            next.created_at = current.next_timestamp();
            let next = Arc::new(next);
            if self.compare_and_swap(Some(&current), Arc::clone(&next)) {
                return Some(next);
            }
        }
    }

    /// Edits the local view without authoring a new version: the sender and
    /// timestamp of the held snapshot are kept.
    pub fn amend<F>(&self, mut change: F) -> Option<Arc<ClusterInformation>>
    where
        F: FnMut(&mut ClusterInformation) -> bool,
    {
        loop {
            let current = self.cluster_info()?;
            let mut next = (*current).clone();
            if !change(&mut next) {
                return None;
            }
            let next = Arc::new(next);
            if self.compare_and_swap(Some(&current), Arc::clone(&next)) {
                return Some(next);
            }
        }
    }

    /// Rewrites the local node's member entry with its current status.
    /// Returns true if the entry changed.
    pub fn refresh_self(&self) -> bool {
        self.amend(|info| self.refresh_entry(info)).is_some()
    }

    /// Authors a new version carrying the local node's current status, so
    /// that the change reaches peers. Returns false if the held entry was
    /// already current.
    pub fn publish_self(&self) -> bool {
        let status = self.node_status();
        let stale = self.cluster_info().is_some_and(|info| {
            info.member(&self.local.address)
                .is_some_and(|me| me.status != status)
        });
        stale && self.publish(|_| true).is_some()
    }

    fn refresh_entry(&self, info: &mut ClusterInformation) -> bool {
        let status = self.node_status();
        let fresh = match info.member(&self.local.address) {
            Some(me) if me.status != status => {
                let mut fresh = me.clone();
                fresh.status = status;
                fresh.last_updated = self.last_updated.load(Ordering::Acquire);
                fresh
            }
            _ => return false,
        };
        info.upsert_member(fresh);
        true
    }

    // -- membership --

    pub fn members(&self) -> Vec<NodeInfo> {
        self.cluster_info()
            .map(|c| c.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn coordinator(&self) -> Option<NodeInfo> {
        self.cluster_info().and_then(|c| c.coordinator.clone())
    }

    pub fn is_coordinator(&self) -> bool {
        self.coordinator()
            .is_some_and(|c| c.address == self.local.address)
    }

    /// Moves the coordinator pointer from `old` to `new`. Fails if the held
    /// coordinator is no longer `old` (compared by address).
    pub fn set_coordinator(&self, old: Option<&NodeInfo>, new: NodeInfo) -> bool {
        self.amend(|info| {
            let held = info.coordinator.as_ref().map(|c| c.address.as_str());
            if held != old.map(|o| o.address.as_str()) {
                tracing::debug!(
                    node = %self.local.address,
                    held = ?held,
                    "coordinator changed concurrently"
                );
                return false;
            }
            info.coordinator = Some(new.clone());
            true
        })
        .is_some()
    }

    /// Adds `node` to the membership and marks the cluster for repair.
    /// Idempotent: returns false if the address already was a member.
    pub fn node_up(&self, node: NodeInfo) -> bool {
        self.publish(|info| {
            if info.is_member(&node) {
                return false;
            }
            let mut fresh = node.clone();
            fresh.buckets.clear();
            fresh.mirrors.clear();
            info.upsert_member(fresh);
            info.status = ClusterStatus::Repair;
            true
        })
        .is_some()
    }

    /// Replaces the status of an existing member with the one `node` reports,
    /// if `node` carries a later `last_updated`. Buckets and mirrors already
    /// assigned are kept and no repair is requested.
    pub fn refresh_member(&self, node: &NodeInfo) -> bool {
        if self.is_local(node) {
            return false;
        }
        self.publish(|info| {
            let fresh = match info.member(&node.address) {
                Some(held) if node.last_updated > held.last_updated => {
                    let mut fresh = held.clone();
                    fresh.status = node.status;
                    fresh.last_updated = node.last_updated;
                    fresh
                }
                _ => return false,
            };
            info.upsert_member(fresh);
            true
        })
        .is_some()
    }

    /// Removes `node` from the membership and marks the cluster for repair.
    /// Idempotent: returns false if it was not a member.
    pub fn node_down(&self, node: &NodeInfo) -> bool {
        self.publish(|info| {
            if !info.remove_member(node) {
                return false;
            }
            info.status = ClusterStatus::Repair;
            true
        })
        .is_some()
    }

    /// Drops `node` from the local view only, without authoring a version.
    pub fn forget(&self, node: &NodeInfo) -> bool {
        self.amend(|info| info.remove_member(node)).is_some()
    }

    /// Members whose buckets or mirrors contain the token of `key`.
    pub fn key_owners(&self, key: &[u8]) -> BTreeSet<NodeInfo> {
        let token = partitioner::hash(key);
        self.cluster_info()
            .map(|c| {
                c.members
                    .iter()
                    .filter(|m| m.owns(&token))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
