//! Anti-entropy: the periodic loop that keeps views converging.
//!
//! On every round a node that is `UP`:
//! - runs an election while the ring has no coordinator,
//! - as coordinator, pings every member and evicts the unreachable ones,
//! - otherwise pulls the coordinator's view, and falls back to an
//!   election when the coordinator does not answer.

use std::sync::Arc;
use std::time::Duration;

use corelib::{clock::now_millis, ClusterStatus, NodeInfo, NodeStatus};

use crate::node::Node;
use crate::server::ServerNode;

pub struct AntiEntropy {
    node: Arc<ServerNode>,
    interval: Duration,
}

impl AntiEntropy {
    pub fn new(node: Arc<ServerNode>) -> Self {
        let interval = node.config().sync_interval();
        Self { node, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs rounds until the node closes.
    pub async fn wait(self) {
        loop {
            tokio::time::sleep(self.interval).await;
            if !self.node.is_running() {
                break;
            }
            self.run_once().await;
        }
        tracing::debug!(node = %self.node.address(), "anti-entropy stopped");
    }

    pub async fn run_once(&self) {
        let node = &self.node;
        if !node.is_running() || node.status() != NodeStatus::Up {
            return;
        }
        match node.ring().ring_status() {
            ClusterStatus::Elect => node.start_election().await,
            ClusterStatus::Electing => {}
            ClusterStatus::Running | ClusterStatus::Repair => match node.ring().coordinator() {
                None => {
                    node.ring().transition_ring(ClusterStatus::Running, ClusterStatus::Elect);
                }
                Some(coordinator) if node.ring().is_local(&coordinator) => self.ping_members().await,
                Some(coordinator) => self.pull_from(coordinator).await,
            },
        }
    }

    /// Coordinator round: evicts members that do not answer a ping.
    async fn ping_members(&self) {
        let node = &self.node;
        let now = now_millis();
        let outcomes = node
            .broadcast(node.peers(), move |peer| async move { peer.ping(now).await })
            .await;

        let mut evicted = 0;
        for (peer, outcome) in outcomes {
            if let Err(e) = outcome {
                tracing::warn!(node = %node.address(), peer = %peer.address, error = %e, "evicting unreachable member");
                match node.node_down(peer).await {
                    Ok(true) => evicted += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(node = %node.address(), error = %e, "eviction failed"),
                }
            }
        }
        if evicted > 0 {
            metrics::counter!("members_evicted_total").increment(evicted);
        }
    }

    /// Member round: adopts the coordinator's view, rejoining if that view
    /// no longer lists this node.
    async fn pull_from(&self, coordinator: NodeInfo) {
        let node = &self.node;
        let handle = node.registry().resolve(&coordinator.address);
        match handle.get_cluster_info().await {
            Ok(Some(info)) => {
                let listed = info.member(node.address()).map(|me| me.status);
                if node.ring().update_cluster_info(info) {
                    node.refresh_self();
                }
                let report = match listed {
                    None => {
                        tracing::warn!(node = %node.address(), coordinator = %coordinator.address, "evicted by coordinator; rejoining");
                        true
                    }
                    Some(status) => status != node.status(),
                };
                if report {
                    match handle.node_up(node.ring().local_info()).await {
                        Ok(info) => {
                            node.ring().update_cluster_info(info);
                            node.refresh_self();
                        }
                        Err(e) => tracing::warn!(node = %node.address(), error = %e, "status report failed"),
                    }
                }
            }
            Ok(None) => {
                tracing::debug!(node = %node.address(), coordinator = %coordinator.address, "coordinator holds no view");
            }
            Err(e) => {
                tracing::warn!(node = %node.address(), coordinator = %coordinator.address, error = %e, "coordinator unreachable; electing");
                node.forget_peer(&coordinator);
                metrics::counter!("members_evicted_total").increment(1);
                node.ring().transition_ring(ClusterStatus::Running, ClusterStatus::Elect);
            }
        }
    }
}
