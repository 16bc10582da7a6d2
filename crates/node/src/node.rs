//! The node RPC contract.

use std::sync::Arc;

use async_trait::async_trait;
use corelib::{ClusterInformation, NodeInfo};

use crate::error::Result;
use crate::remote::RemoteNode;
use crate::server::ServerNode;

/// Operations every node answers, locally or across the network.
///
/// Every call resolves asynchronously. Dropping the returned future
/// abandons the call; transports bound each remote call with a timeout.
#[async_trait]
pub trait Node: Send + Sync {
    async fn get_node_info(&self) -> Result<NodeInfo>;

    async fn get_cluster_info(&self) -> Result<Option<ClusterInformation>>;

    /// Runs a coordinator election over `active`. Resolves true once a
    /// coordinator was accepted.
    async fn elect(&self, active: Vec<NodeInfo>) -> Result<bool>;

    /// `coordinator` won an election. False when this node refuses it.
    async fn elected(&self, coordinator: NodeInfo) -> Result<bool>;

    /// `node` asks to join. Resolves to the cluster view including it.
    async fn node_up(&self, node: NodeInfo) -> Result<ClusterInformation>;

    /// `node` left or failed. True if it was a member.
    async fn node_down(&self, node: NodeInfo) -> Result<bool>;

    /// Offers a snapshot. True if it was accepted.
    async fn update_cluster_info(&self, info: ClusterInformation) -> Result<bool>;

    /// Echoes `time`.
    async fn ping(&self, time: u64) -> Result<u64>;
}

/// A resolved node: the local server, or a stub for a peer.
#[derive(Clone)]
pub enum NodeRef {
    Local(Arc<ServerNode>),
    Remote(Arc<RemoteNode>),
}

impl NodeRef {
    pub fn is_local(&self) -> bool {
        matches!(self, NodeRef::Local(_))
    }

    pub fn address(&self) -> &str {
        match self {
            NodeRef::Local(node) => node.address(),
            NodeRef::Remote(node) => node.address(),
        }
    }

    fn inner(&self) -> &dyn Node {
        match self {
            NodeRef::Local(node) => node.as_ref(),
            NodeRef::Remote(node) => node.as_ref(),
        }
    }
}

#[async_trait]
impl Node for NodeRef {
    async fn get_node_info(&self) -> Result<NodeInfo> {
        self.inner().get_node_info().await
    }

    async fn get_cluster_info(&self) -> Result<Option<ClusterInformation>> {
        self.inner().get_cluster_info().await
    }

    async fn elect(&self, active: Vec<NodeInfo>) -> Result<bool> {
        self.inner().elect(active).await
    }

    async fn elected(&self, coordinator: NodeInfo) -> Result<bool> {
        self.inner().elected(coordinator).await
    }

    async fn node_up(&self, node: NodeInfo) -> Result<ClusterInformation> {
        self.inner().node_up(node).await
    }

    async fn node_down(&self, node: NodeInfo) -> Result<bool> {
        self.inner().node_down(node).await
    }

    async fn update_cluster_info(&self, info: ClusterInformation) -> Result<bool> {
        self.inner().update_cluster_info(info).await
    }

    async fn ping(&self, time: u64) -> Result<u64> {
        self.inner().ping(time).await
    }
}
