//! The local node.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use corelib::{ClusterInformation, ClusterStatus, NodeInfo, NodeStatus, Ring, PROTOCOL_VERSION};
use streaming::{Request, RequestHandler, Response, SnapshotStore, Transport};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::NodeConfig;
use crate::convergence::AntiEntropy;
use crate::error::{NodeError, Result};
use crate::node::{Node, NodeRef};
use crate::registry::NodeRegistry;
use crate::watchdog::WatchDog;

/// A cluster peer: its ring view, its lifecycle handlers and the RPC
/// operations it serves to the other nodes.
///
/// # Concurrency Model
///
/// Handlers may run concurrently from the WatchDog, the anti-entropy loop
/// and incoming RPCs. State changes go through compare-and-swap on the
/// [`Ring`]: a handler only acts after winning its status transition, and
/// no lock is held across an RPC.
pub struct ServerNode {
    config: NodeConfig,
    ring: Ring,
    registry: NodeRegistry,
    snapshots: Option<SnapshotStore>,
    running: AtomicBool,
    closed: Notify,
}

/// Background tasks of a started node.
pub struct NodeTasks {
    pub watchdog: JoinHandle<()>,
    pub anti_entropy: JoinHandle<()>,
}

impl NodeTasks {
    pub fn abort(&self) {
        self.watchdog.abort();
        self.anti_entropy.abort();
    }
}

impl ServerNode {
    pub fn new(config: NodeConfig, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let local = config.node_info();
            Self {
                registry: NodeRegistry::new(
                    local.address.clone(),
                    weak.clone(),
                    transport,
                    config.rpc_timeout(),
                ),
                ring: Ring::new(local),
                snapshots: config.snapshot_path.clone().map(SnapshotStore::new),
                running: AtomicBool::new(true),
                closed: Notify::new(),
                config,
            }
        })
    }

    /// Spawns the WatchDog and the anti-entropy loop.
    pub fn start(self: &Arc<Self>) -> NodeTasks {
        tracing::info!(node = %self.address(), "starting node");
        NodeTasks {
            watchdog: tokio::spawn(WatchDog::new(Arc::clone(self)).run()),
            anti_entropy: tokio::spawn(AntiEntropy::new(Arc::clone(self)).wait()),
        }
    }

    pub fn address(&self) -> &str {
        self.ring.address()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn status(&self) -> NodeStatus {
        self.ring.node_status()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Requests shutdown from whatever state the node is in. The WatchDog
    /// closes the node on its next tick.
    pub fn shutdown(&self) {
        loop {
            let status = self.status();
            if status == NodeStatus::Shutdown || self.ring.transition_node(status, NodeStatus::Shutdown) {
                return;
            }
        }
    }

    /// Resolves once the node has closed.
    pub async fn closed(&self) {
        loop {
            let notified = self.closed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn mark_closed(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            self.closed.notify_waiters();
        }
        was_running
    }

    /// Writes the held snapshot, if persistence is configured.
    pub async fn persist(&self) {
        let (Some(store), Some(info)) = (&self.snapshots, self.ring.cluster_info()) else {
            return;
        };
        if let Err(e) = store.save(&info).await {
            tracing::warn!(node = %self.address(), error = %e, "failed to persist cluster snapshot");
        }
    }

    pub(crate) async fn load_snapshot(&self) -> Option<ClusterInformation> {
        match &self.snapshots {
            Some(store) => store.load().await,
            None => None,
        }
    }

    /// Sets the ring status to `Running` from either election status.
    pub(crate) fn settle_running(&self) {
        if !self.ring.transition_ring(ClusterStatus::Electing, ClusterStatus::Running) {
            self.ring.transition_ring(ClusterStatus::Elect, ClusterStatus::Running);
        }
    }

    /// Writes the local status into the held view. On the coordinator this
    /// authors a new version, which members adopt on their next pull.
    pub(crate) fn refresh_self(&self) -> bool {
        if self.ring.is_coordinator() {
            self.ring.publish_self()
        } else {
            self.ring.refresh_self()
        }
    }

    /// Members of the held view other than this node.
    pub(crate) fn peers(&self) -> Vec<NodeInfo> {
        self.ring
            .members()
            .into_iter()
            .filter(|m| !self.ring.is_local(m))
            .collect()
    }

    /// Removes a peer from the local view and drops its stub.
    pub(crate) fn forget_peer(&self, node: &NodeInfo) {
        if self.ring.forget(node) {
            tracing::info!(node = %self.address(), peer = %node.address, "forgot peer");
        }
        self.registry.forget(&node.address);
    }

    /// Calls every node in `targets` concurrently and collects the outcomes.
    pub(crate) async fn broadcast<F, Fut, T>(
        &self,
        targets: Vec<NodeInfo>,
        call: F,
    ) -> Vec<(NodeInfo, Result<T>)>
    where
        F: Fn(NodeRef) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut calls = JoinSet::new();
        for target in targets {
            let fut = call(self.registry.resolve(&target.address));
            calls.spawn(async move { (target, fut.await) });
        }
        let mut outcomes = Vec::new();
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::warn!(node = %self.address(), error = %e, "broadcast task failed"),
            }
        }
        outcomes
    }
}

#[async_trait]
impl Node for ServerNode {
    async fn get_node_info(&self) -> Result<NodeInfo> {
        Ok(self.ring.local_info())
    }

    async fn get_cluster_info(&self) -> Result<Option<ClusterInformation>> {
        Ok(self.ring.cluster_info().map(|info| (*info).clone()))
    }

    async fn elect(&self, active: Vec<NodeInfo>) -> Result<bool> {
        self.run_election(active).await
    }

    async fn elected(&self, coordinator: NodeInfo) -> Result<bool> {
        self.accept_elected(coordinator).await
    }

    async fn node_up(&self, node: NodeInfo) -> Result<ClusterInformation> {
        let status = self.status();
        if !status.is_member() {
            return Err(NodeError::NotReady(status));
        }
        if node.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                node = %self.address(),
                peer = %node.address,
                version = node.protocol_version,
                "refusing join with incompatible protocol version"
            );
            return Err(NodeError::Rejected(format!(
                "protocol version {} != {}",
                node.protocol_version, PROTOCOL_VERSION
            )));
        }
        if self.ring.is_local(&node) {
            return Err(NodeError::Rejected("node_up for self".to_string()));
        }

        if self.ring.node_up(node.clone()) {
            tracing::info!(node = %self.address(), peer = %node.address, "member joined");
            self.ring.transition_node(NodeStatus::Up, NodeStatus::Repair);
        } else if self.ring.refresh_member(&node) {
            tracing::debug!(node = %self.address(), peer = %node.address, status = ?node.status, "member status refreshed");
        }
        self.refresh_self();
        self.ring
            .cluster_info()
            .map(|info| (*info).clone())
            .ok_or(NodeError::Core(corelib::Error::NoClusterInfo))
    }

    async fn node_down(&self, node: NodeInfo) -> Result<bool> {
        if self.ring.is_local(&node) {
            return Err(NodeError::Rejected("node_down for self".to_string()));
        }
        let removed = self.ring.node_down(&node);
        if removed {
            tracing::info!(node = %self.address(), peer = %node.address, "member left");
            self.registry.forget(&node.address);
            self.ring.transition_node(NodeStatus::Up, NodeStatus::Repair);
        }
        self.refresh_self();
        Ok(removed)
    }

    async fn update_cluster_info(&self, info: ClusterInformation) -> Result<bool> {
        let has_coordinator = info.coordinator.is_some();
        let running = info.status == ClusterStatus::Running;
        let accepted = self.ring.update_cluster_info(info);
        if accepted {
            self.refresh_self();
            if has_coordinator {
                self.ring.transition_ring(ClusterStatus::Elect, ClusterStatus::Running);
            }
            if running {
                self.persist().await;
            }
        }
        Ok(accepted)
    }

    async fn ping(&self, time: u64) -> Result<u64> {
        if !self.is_running() {
            return Err(NodeError::NotReady(self.status()));
        }
        Ok(time)
    }
}

#[async_trait]
impl RequestHandler for ServerNode {
    async fn handle(&self, request: Request) -> Response {
        let op = request.name();
        let result = match request {
            Request::GetNodeInfo => self.get_node_info().await.map(Response::NodeInfo),
            Request::GetClusterInfo => self.get_cluster_info().await.map(Response::ClusterInfo),
            Request::Elect(active) => self.elect(active).await.map(Response::Ack),
            Request::Elected(coordinator) => self.elected(coordinator).await.map(Response::Ack),
            Request::NodeUp(node) => self
                .node_up(node)
                .await
                .map(|info| Response::ClusterInfo(Some(info))),
            Request::NodeDown(node) => self.node_down(node).await.map(Response::Ack),
            Request::UpdateClusterInfo(info) => {
                self.update_cluster_info(info).await.map(Response::Ack)
            }
            Request::Ping(time) => self.ping(time).await.map(Response::Pong),
        };
        result.unwrap_or_else(|e| {
            tracing::debug!(node = %self.address(), op, error = %e, "request failed");
            Response::Error(e.to_string())
        })
    }
}
