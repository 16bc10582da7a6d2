//! Lifecycle handlers dispatched by the [`WatchDog`](crate::WatchDog).
//!
//! ```text
//! START_UP -> STARTING_UP -> SET_UP -> SETTING_UP -> UP <-> REPAIR
//!                                          |          \       |
//!                                          v           \      v
//!                                       SHUTDOWN      SYNCHRONIZATION
//! ```
//!
//! Each handler first claims its work with a status transition, so a tick
//! that loses the race does nothing.

use std::sync::Arc;

use corelib::{ClusterInformation, ClusterStatus, NodeStatus};
use replication::{assign_ownership, build_partition_table, ReplicationError};

use crate::error::{NodeError, Result};
use crate::node::Node;
use crate::server::ServerNode;

impl ServerNode {
    /// START_UP: seeds the view from the persisted snapshot, if any.
    pub async fn on_start_up(&self) {
        if !self.ring().transition_node(NodeStatus::StartUp, NodeStatus::StartingUp) {
            return;
        }
        if let Some(info) = self.load_snapshot().await {
            let created_at = info.created_at;
            if self.ring().update_cluster_info(info) {
                tracing::info!(node = %self.address(), created_at, "restored cluster snapshot");
            }
        }
        self.ring().transition_node(NodeStatus::StartingUp, NodeStatus::Setup);
    }

    /// SET_UP: bootstraps a new cluster, or joins through the seeds.
    pub async fn on_set_up(&self) {
        if !self.ring().transition_node(NodeStatus::Setup, NodeStatus::SettingUp) {
            return;
        }
        let seeds = self.config().peer_seeds();
        if seeds.is_empty() {
            self.set_up().await;
        } else {
            self.set_up_in_the_cluster(&seeds).await;
        }
    }

    /// Becomes the only member and coordinator of a new cluster.
    async fn set_up(&self) {
        let local = self.ring().local_info();
        let mut info = ClusterInformation::single(local.clone(), self.ring().next_timestamp());

        let table = build_partition_table(&info.member_ids(), self.config().replication_factor);
        let repair_needed = match table {
            Ok(table) => {
                info.members = assign_ownership(&info.members, &table);
                info.partition_table = table;
                false
            }
            Err(e) => {
                tracing::warn!(node = %self.address(), error = %e, "cannot partition new cluster");
                info.status = ClusterStatus::Repair;
                true
            }
        };

        self.ring().update_cluster_info(info);
        self.settle_running();
        if self.ring().transition_node(NodeStatus::SettingUp, NodeStatus::Up) {
            self.refresh_self();
            tracing::info!(node = %self.address(), "bootstrapped cluster");
            if repair_needed {
                self.ring().transition_node(NodeStatus::Up, NodeStatus::Repair);
            }
        }
        self.persist().await;
    }

    /// Asks each seed in turn to admit this node. Shuts down when none does.
    async fn set_up_in_the_cluster(&self, seeds: &[String]) {
        for seed in seeds {
            let handle = self.registry().resolve(seed);
            match handle.node_up(self.ring().local_info()).await {
                Ok(info) => {
                    let coordinated = info.coordinator.is_some();
                    if !self.ring().update_cluster_info(info) {
                        tracing::debug!(node = %self.address(), %seed, "held view is newer than seed's");
                    }
                    if coordinated {
                        self.settle_running();
                    }
                    if self.ring().transition_node(NodeStatus::SettingUp, NodeStatus::Up) {
                        // the seed recorded this node as SETTING_UP
                        match handle.node_up(self.ring().local_info()).await {
                            Ok(info) => {
                                self.ring().update_cluster_info(info);
                            }
                            Err(e) => {
                                tracing::debug!(node = %self.address(), %seed, error = %e, "status report failed");
                            }
                        }
                    }
                    // the seed's view must list this node; until the
                    // coordinator repairs, it owns nothing
                    let local = self.ring().local_info();
                    self.ring().amend(|info| {
                        if info.is_member(&local) {
                            return false;
                        }
                        let mut me = local.clone();
                        me.buckets.clear();
                        me.mirrors.clear();
                        info.upsert_member(me);
                        info.status = ClusterStatus::Repair;
                        true
                    });
                    self.refresh_self();
                    tracing::info!(
                        node = %self.address(),
                        %seed,
                        members = self.ring().members().len(),
                        "joined cluster"
                    );
                    self.persist().await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(node = %self.address(), %seed, error = %e, "seed failed");
                }
            }
        }
        tracing::error!(node = %self.address(), seeds = seeds.len(), "no seed reachable; shutting down");
        self.ring().transition_node(NodeStatus::SettingUp, NodeStatus::Shutdown);
    }

    /// REPAIR: rebuilds the partition table from the current membership,
    /// reassigns ownership and, if this node authored the repair, pushes
    /// the result to every other member.
    pub async fn on_repair(&self) {
        if !self.ring().transition_node(NodeStatus::Repair, NodeStatus::Synchronization) {
            return;
        }
        match self.repair().await {
            Ok(published) => {
                if self.ring().transition_node(NodeStatus::Synchronization, NodeStatus::Up) {
                    self.refresh_self();
                }
                tracing::info!(
                    node = %self.address(),
                    members = published.members.len(),
                    buckets = published.partition_table.len(),
                    "repair complete"
                );
                self.persist().await;
                // membership changed while synchronizing
                if self.repair_pending() {
                    self.ring().transition_node(NodeStatus::Up, NodeStatus::Repair);
                }
            }
            Err(e) => {
                tracing::warn!(node = %self.address(), error = %e, "repair failed; will retry");
                self.ring().transition_node(NodeStatus::Synchronization, NodeStatus::Repair);
            }
        }
    }

    async fn repair(&self) -> Result<Arc<ClusterInformation>> {
        let current = self.ring().cluster_info().ok_or(corelib::Error::NoClusterInfo)?;
        let initiator = self.ring().is_local(&current.sender);
        let replication_factor = self.config().replication_factor;

        let mut failure: Option<ReplicationError> = None;
        let published = self.ring().publish(|info| {
            match build_partition_table(&info.member_ids(), replication_factor) {
                Ok(table) => {
                    info.members = assign_ownership(&info.members, &table);
                    info.partition_table = table;
                    info.status = ClusterStatus::Running;
                    true
                }
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        });
        if let Some(e) = failure {
            return Err(e.into());
        }
        let published = published.ok_or(NodeError::Core(corelib::Error::NoClusterInfo))?;

        if initiator {
            self.propagate(&published).await;
        }
        Ok(published)
    }

    /// Offers `info` to every other member. Unreachable peers are logged;
    /// the coordinator's liveness pings evict them.
    pub(crate) async fn propagate(&self, info: &Arc<ClusterInformation>) {
        let peers: Vec<_> = info
            .members
            .iter()
            .filter(|m| !self.ring().is_local(m))
            .cloned()
            .collect();
        let snapshot = (**info).clone();
        let outcomes = self
            .broadcast(peers, move |node| {
                let snapshot = snapshot.clone();
                async move { node.update_cluster_info(snapshot).await }
            })
            .await;
        for (peer, outcome) in outcomes {
            match outcome {
                Ok(true) => {}
                Ok(false) => tracing::debug!(node = %self.address(), peer = %peer.address, "peer holds a newer view"),
                Err(e) => tracing::warn!(node = %self.address(), peer = %peer.address, error = %e, "peer unreachable"),
            }
        }
    }

    /// True when the held view was authored here and still awaits repair.
    fn repair_pending(&self) -> bool {
        self.ring().cluster_info().is_some_and(|info| {
            info.status == ClusterStatus::Repair && self.ring().is_local(&info.sender)
        })
    }

    /// SHUTDOWN: persists the view, tells the coordinator this member is
    /// leaving, and stops the node's loops.
    pub async fn close(&self) {
        if !self.is_running() {
            return;
        }
        if let Some(coordinator) = self.ring().coordinator() {
            let member = self
                .ring()
                .cluster_info()
                .is_some_and(|info| info.member(self.address()).is_some());
            if member && !self.ring().is_local(&coordinator) {
                let local = self.ring().local_info();
                if let Err(e) = self
                    .registry()
                    .resolve(&coordinator.address)
                    .node_down(local)
                    .await
                {
                    tracing::debug!(node = %self.address(), error = %e, "leave notification failed");
                }
            }
        }
        self.persist().await;
        if self.mark_closed() {
            tracing::info!(node = %self.address(), "node closed");
        }
    }
}
