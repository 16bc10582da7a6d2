//! Partition table construction.

use std::collections::BTreeSet;

use corelib::partitioner;
use corelib::{NodeId, NodeInfo, PartitionEntry, PartitionTable};

use crate::error::{ReplicationError, Result};
use crate::strategy::{ReplicationStrategy, SimpleStrategy};

/// Splits the token space into one bucket per member and gives each bucket
/// `replication_factor` distinct owners with [`SimpleStrategy`].
///
/// The table depends only on the *set* of ids: input order and duplicates
/// do not matter.
///
/// # Errors
///
/// [`ReplicationError::RepartitionIllegalOperation`] if the replication
/// factor is zero or exceeds the number of distinct members.
pub fn build_partition_table(
    member_ids: &[NodeId],
    replication_factor: usize,
) -> Result<PartitionTable> {
    build_with(&SimpleStrategy::new(replication_factor), member_ids)
}

/// [`build_partition_table`] with an explicit strategy.
pub fn build_with<S>(strategy: &S, member_ids: &[NodeId]) -> Result<PartitionTable>
where
    S: ReplicationStrategy + ?Sized,
{
    let mut ids = member_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let replication_factor = strategy.replication_factor();
    if replication_factor == 0 || replication_factor > ids.len() {
        return Err(ReplicationError::RepartitionIllegalOperation {
            replication_factor,
            members: ids.len(),
        });
    }

    let entries = partitioner::split(ids.len())
        .into_iter()
        .enumerate()
        .map(|(i, bucket)| PartitionEntry {
            bucket,
            owners: strategy.owners_for_bucket(&ids, i),
        })
        .collect();

    tracing::debug!(
        strategy = strategy.name(),
        members = ids.len(),
        replication_factor,
        "built partition table"
    );
    Ok(PartitionTable::new(replication_factor, entries))
}

/// Copies of `members` whose buckets and mirrors reflect `table`.
pub fn assign_ownership(members: &BTreeSet<NodeInfo>, table: &PartitionTable) -> BTreeSet<NodeInfo> {
    members
        .iter()
        .map(|member| {
            let (buckets, mirrors) = table.ownership_of(member.id);
            let mut member = member.clone();
            member.buckets = buckets;
            member.mirrors = mirrors;
            member
        })
        .collect()
}
