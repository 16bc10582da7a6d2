//! Node errors.

use corelib::NodeStatus;
use replication::ReplicationError;
use streaming::StreamingError;

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum NodeError {
    #[error(transparent)]
    Transport(#[from] StreamingError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),

    #[error(transparent)]
    Core(#[from] corelib::Error),

    #[error("node is {0}, not ready")]
    NotReady(NodeStatus),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),
}
