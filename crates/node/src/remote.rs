//! Stub for a node reached through a [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corelib::{ClusterInformation, NodeInfo};
use streaming::{Request, Response, StreamingError, Transport};

use crate::error::{NodeError, Result};
use crate::node::Node;

pub struct RemoteNode {
    address: String,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl RemoteNode {
    pub fn new(address: impl Into<String>, transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            transport,
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let op = request.name();
        let result = match self.transport.call(&self.address, request, self.timeout).await {
            Ok(Response::Error(message)) => Err(StreamingError::Remote(message).into()),
            Ok(response) => Ok(response),
            Err(e) => Err(NodeError::from(e)),
        };
        if let Err(e) = &result {
            tracing::debug!(peer = %self.address, op, error = %e, "rpc failed");
            metrics::counter!("rpc_failures_total", "op" => op).increment(1);
        }
        result
    }
}

#[async_trait]
impl Node for RemoteNode {
    async fn get_node_info(&self) -> Result<NodeInfo> {
        match self.call(Request::GetNodeInfo).await? {
            Response::NodeInfo(info) => Ok(info),
            _ => Err(NodeError::UnexpectedResponse("get_node_info")),
        }
    }

    async fn get_cluster_info(&self) -> Result<Option<ClusterInformation>> {
        match self.call(Request::GetClusterInfo).await? {
            Response::ClusterInfo(info) => Ok(info),
            _ => Err(NodeError::UnexpectedResponse("get_cluster_info")),
        }
    }

    async fn elect(&self, active: Vec<NodeInfo>) -> Result<bool> {
        match self.call(Request::Elect(active)).await? {
            Response::Ack(done) => Ok(done),
            _ => Err(NodeError::UnexpectedResponse("elect")),
        }
    }

    async fn elected(&self, coordinator: NodeInfo) -> Result<bool> {
        match self.call(Request::Elected(coordinator)).await? {
            Response::Ack(accepted) => Ok(accepted),
            _ => Err(NodeError::UnexpectedResponse("elected")),
        }
    }

    async fn node_up(&self, node: NodeInfo) -> Result<ClusterInformation> {
        match self.call(Request::NodeUp(node)).await? {
            Response::ClusterInfo(Some(info)) => Ok(info),
            _ => Err(NodeError::UnexpectedResponse("node_up")),
        }
    }

    async fn node_down(&self, node: NodeInfo) -> Result<bool> {
        match self.call(Request::NodeDown(node)).await? {
            Response::Ack(removed) => Ok(removed),
            _ => Err(NodeError::UnexpectedResponse("node_down")),
        }
    }

    async fn update_cluster_info(&self, info: ClusterInformation) -> Result<bool> {
        match self.call(Request::UpdateClusterInfo(info)).await? {
            Response::Ack(accepted) => Ok(accepted),
            _ => Err(NodeError::UnexpectedResponse("update_cluster_info")),
        }
    }

    async fn ping(&self, time: u64) -> Result<u64> {
        match self.call(Request::Ping(time)).await? {
            Response::Pong(time) => Ok(time),
            _ => Err(NodeError::UnexpectedResponse("ping")),
        }
    }
}
