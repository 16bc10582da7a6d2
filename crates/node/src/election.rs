//! Coordinator election.
//!
//! The initiator walks the ring clockwise from its successor, probing every
//! node it believes active and dropping those that do not answer. Back at
//! the start, the highest surviving address is the candidate; it is asked
//! to accept with [`Node::elected`]. A candidate that refuses or fails is
//! dropped and the next highest is asked, until one accepts. The initiator
//! itself always survives the walk, so the election terminates.

use std::collections::BTreeSet;
use corelib::{ClusterInformation, ClusterStatus, NodeId, NodeInfo, NodeStatus};

use crate::error::Result;
use crate::node::Node;
use crate::server::ServerNode;

impl ServerNode {
    /// ELECT: runs an election over the held membership.
    pub async fn start_election(&self) {
        if !self.ring().transition_ring(ClusterStatus::Elect, ClusterStatus::Electing) {
            return;
        }
        metrics::counter!("elections_started_total").increment(1);
        tracing::info!(node = %self.address(), "starting election");

        let active = self.ring().members();
        match self.run_election(active).await {
            Ok(true) => {}
            Ok(false) => {
                self.ring().transition_ring(ClusterStatus::Electing, ClusterStatus::Elect);
            }
            Err(e) => {
                tracing::warn!(node = %self.address(), error = %e, "election failed");
                self.ring().transition_ring(ClusterStatus::Electing, ClusterStatus::Elect);
            }
        }
    }

    pub(crate) async fn run_election(&self, active: Vec<NodeInfo>) -> Result<bool> {
        let local = self.ring().local_info();
        let mut active: BTreeSet<NodeInfo> = active.into_iter().collect();
        if active.iter().all(|n| n.is(&local)) {
            self.elect_alone(local);
            return Ok(true);
        }
        active.insert(local.clone());

        for node in clockwise_after(&active, &local) {
            if let Err(e) = self.registry().resolve(&node.address).ping(corelib::clock::now_millis()).await {
                tracing::warn!(node = %self.address(), peer = %node.address, error = %e, "dropping unreachable node from election");
                active.remove(&node);
                self.forget_peer(&node);
            }
        }

        while let Some(candidate) = active.iter().next_back().cloned() {
            if candidate.is(&local) {
                return self.accept_elected(local).await;
            }
            match self.registry().resolve(&candidate.address).elected(candidate.clone()).await {
                Ok(true) => {
                    if !self.adopt_coordinator(&candidate) {
                        tracing::warn!(node = %self.address(), coordinator = %candidate.address, "no view to record coordinator in");
                    }
                    self.settle_running();
                    tracing::info!(node = %self.address(), coordinator = %candidate.address, "coordinator elected");
                    return Ok(true);
                }
                Ok(false) => {
                    tracing::info!(node = %self.address(), peer = %candidate.address, "candidate refused election");
                    active.remove(&candidate);
                }
                Err(e) => {
                    tracing::warn!(node = %self.address(), peer = %candidate.address, error = %e, "candidate failed");
                    active.remove(&candidate);
                    self.forget_peer(&candidate);
                }
            }
        }
        Ok(false)
    }

    /// Degenerate election: no other active node. Contacts nobody.
    fn elect_alone(&self, local: NodeInfo) {
        if self.ring().cluster_info().is_none() {
            let info = ClusterInformation::single(local.clone(), self.ring().next_timestamp());
            self.ring().update_cluster_info(info);
        }
        self.adopt_coordinator(&local);
        self.settle_running();
        tracing::info!(node = %self.address(), "elected self as sole coordinator");
        if self.partition_is_stale() {
            self.ring().transition_node(NodeStatus::Up, NodeStatus::Repair);
        }
    }

    /// Points the held view at `coordinator`, retrying against whatever
    /// pointer a concurrent writer left. False if no view is held.
    fn adopt_coordinator(&self, coordinator: &NodeInfo) -> bool {
        loop {
            if self.ring().cluster_info().is_none() {
                return false;
            }
            let old = self.ring().coordinator();
            if old.as_ref().is_some_and(|c| c.is(coordinator))
                || self.ring().set_coordinator(old.as_ref(), coordinator.clone())
            {
                return true;
            }
        }
    }

    /// True when the held table is owned by a different set of nodes than
    /// the held membership.
    fn partition_is_stale(&self) -> bool {
        self.ring().cluster_info().is_some_and(|info| {
            let owners: BTreeSet<NodeId> = info
                .partition_table
                .entries()
                .iter()
                .flat_map(|e| e.owners.iter().copied())
                .collect();
            let members: BTreeSet<NodeId> = info.member_ids().into_iter().collect();
            owners != members
        })
    }

    /// Handles the announcement that `coordinator` won. When that is this
    /// node, it publishes itself as coordinator, schedules a repair, and
    /// announces the result to the other members.
    pub(crate) async fn accept_elected(&self, coordinator: NodeInfo) -> Result<bool> {
        let status = self.status();
        if !status.is_member() {
            tracing::debug!(node = %self.address(), %status, "refusing election while not a member");
            return Ok(false);
        }
        if self.ring().cluster_info().is_none() {
            return Ok(false);
        }

        if !self.ring().is_local(&coordinator) {
            self.adopt_coordinator(&coordinator);
            self.settle_running();
            self.refresh_self();
            tracing::debug!(node = %self.address(), coordinator = %coordinator.address, "accepted coordinator");
            return Ok(true);
        }

        let published = self.ring().publish(|info| {
            info.coordinator = Some(self.ring().local_info());
            info.status = ClusterStatus::Repair;
            true
        });
        self.settle_running();
        if published.is_none() {
            return Ok(false);
        }
        metrics::counter!("coordinator_changes_total").increment(1);
        tracing::info!(node = %self.address(), "elected coordinator");
        self.ring().transition_node(NodeStatus::Up, NodeStatus::Repair);

        let peers = self.peers();
        match self.registry().local() {
            Some(this) => {
                tokio::spawn(async move { this.announce(peers).await });
            }
            None => self.announce(peers).await,
        }
        Ok(true)
    }

    /// Tells `peers` that this node is the coordinator.
    async fn announce(&self, peers: Vec<NodeInfo>) {
        let local = self.ring().local_info();
        let outcomes = self
            .broadcast(peers, move |node| {
                let local = local.clone();
                async move { node.elected(local).await }
            })
            .await;
        for (peer, outcome) in outcomes {
            match outcome {
                Ok(true) => {}
                Ok(false) => tracing::info!(node = %self.address(), peer = %peer.address, "peer refused coordinator"),
                Err(e) => tracing::warn!(node = %self.address(), peer = %peer.address, error = %e, "peer unreachable"),
            }
        }
    }
}

/// Nodes of `active` in ring order after `start`, wrapping around and
/// excluding `start`.
fn clockwise_after(active: &BTreeSet<NodeInfo>, start: &NodeInfo) -> Vec<NodeInfo> {
    use std::ops::Bound::{Excluded, Unbounded};
    active
        .range((Excluded(start), Unbounded))
        .chain(active.range((Unbounded, Excluded(start))))
        .cloned()
        .collect()
}
