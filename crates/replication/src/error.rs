//! Replication errors.

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// The replication factor cannot be satisfied by the member count.
    #[error("cannot place {replication_factor} replicas on {members} members")]
    RepartitionIllegalOperation {
        replication_factor: usize,
        members: usize,
    },
}
