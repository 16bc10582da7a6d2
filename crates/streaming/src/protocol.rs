//! Messages exchanged between nodes.

use corelib::{ClusterInformation, NodeInfo};
use serde::{Deserialize, Serialize};

/// Node RPC operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    GetNodeInfo,
    GetClusterInfo,
    /// Run an election over the given active members.
    Elect(Vec<NodeInfo>),
    /// The given node has been elected coordinator.
    Elected(NodeInfo),
    NodeUp(NodeInfo),
    NodeDown(NodeInfo),
    UpdateClusterInfo(ClusterInformation),
    /// Liveness check carrying the sender's clock (ms).
    Ping(u64),
}

impl Request {
    /// Short operation name, for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Request::GetNodeInfo => "get_node_info",
            Request::GetClusterInfo => "get_cluster_info",
            Request::Elect(_) => "elect",
            Request::Elected(_) => "elected",
            Request::NodeUp(_) => "node_up",
            Request::NodeDown(_) => "node_down",
            Request::UpdateClusterInfo(_) => "update_cluster_info",
            Request::Ping(_) => "ping",
        }
    }
}

/// Replies to [`Request`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    NodeInfo(NodeInfo),
    ClusterInfo(Option<ClusterInformation>),
    Ack(bool),
    /// Echo of the ping time.
    Pong(u64),
    /// The operation failed on the remote node.
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageType {
    Request(Request),
    Response(Response),
}

/// Envelope correlating a reply with its request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Generated locally by the requester, echoed by the responder.
    pub request_id: u64,
    pub body: MessageType,
}

impl Message {
    pub fn request(request_id: u64, request: Request) -> Self {
        Self {
            request_id,
            body: MessageType::Request(request),
        }
    }

    pub fn response(request_id: u64, response: Response) -> Self {
        Self {
            request_id,
            body: MessageType::Response(response),
        }
    }
}
