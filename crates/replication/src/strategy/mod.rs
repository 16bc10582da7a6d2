//! Replication strategy abstractions.
//!
//! A replication strategy decides how many owners a bucket has and which
//! members they are.
//!
//! - **SimpleStrategy**: N owners taken consecutively from the member list

pub mod simple;

pub use simple::SimpleStrategy;

use corelib::NodeId;

/// Trait for replication strategies.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync) as they may be
/// shared across threads.
pub trait ReplicationStrategy: Send + Sync + 'static {
    /// Number of owners per bucket, primary included.
    fn replication_factor(&self) -> usize;

    /// Owners of the bucket at `bucket_index`, primary first.
    ///
    /// # Arguments
    /// * `members` - Sorted, deduplicated member ids
    /// * `bucket_index` - Position of the bucket in token order
    ///
    /// Implementations must be pure: the same arguments always give the
    /// same owners, on every node.
    fn owners_for_bucket(&self, members: &[NodeId], bucket_index: usize) -> Vec<NodeId>;

    /// Strategy name (for logging/debugging).
    fn name(&self) -> &'static str;
}
