//! Simple replication strategy.
//!
//! Bucket `i` is owned by member `i` (primary) and the next N-1 members of
//! the sorted member list, wrapping around. With as many buckets as
//! members every member is primary exactly once and mirrors N-1 buckets.
//!
//! # Limitations
//!
//! - Doesn't consider data center/rack placement
//! - May place replicas on nodes in the same failure domain

use corelib::NodeId;

use crate::strategy::ReplicationStrategy;

/// Simple replication strategy: N owners taken consecutively.
///
/// # Example
///
/// ```rust
/// use corelib::NodeId;
/// use replication::{ReplicationStrategy, SimpleStrategy};
///
/// let strategy = SimpleStrategy::new(2);
/// let members = [NodeId(1), NodeId(2), NodeId(3)];
/// assert_eq!(strategy.owners_for_bucket(&members, 2), vec![NodeId(3), NodeId(1)]);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleStrategy {
    /// Number of owners per bucket (including primary).
    replication_factor: usize,
}

impl SimpleStrategy {
    pub fn new(replication_factor: usize) -> Self {
        Self { replication_factor }
    }
}

impl Default for SimpleStrategy {
    /// A single owner per bucket.
    fn default() -> Self {
        Self::new(1)
    }
}

impl ReplicationStrategy for SimpleStrategy {
    fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    fn owners_for_bucket(&self, members: &[NodeId], bucket_index: usize) -> Vec<NodeId> {
        if members.is_empty() {
            return Vec::new();
        }
        let count = self.replication_factor.min(members.len());
        (0..count)
            .map(|offset| members[(bucket_index + offset) % members.len()])
            .collect()
    }

    fn name(&self) -> &'static str {
        "SimpleStrategy"
    }
}
