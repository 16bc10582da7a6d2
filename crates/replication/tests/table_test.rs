//! Property tests for partition table construction.

use corelib::NodeId;
use proptest::prelude::*;
use replication::build_partition_table;

fn member_ids() -> impl Strategy<Value = Vec<NodeId>> {
    proptest::collection::vec(any::<u128>().prop_map(NodeId), 1..24)
}

proptest! {
    #[test]
    fn table_is_deterministic(ids in member_ids(), rf in 1usize..4) {
        let first = build_partition_table(&ids, rf);
        let second = build_partition_table(&ids, rf);
        prop_assert_eq!(first.clone(), second);

        if let Ok(table) = first {
            // buckets compare by start; check the full ranges too
            let again = build_partition_table(&ids, rf).unwrap();
            for (a, b) in table.entries().iter().zip(again.entries()) {
                prop_assert_eq!(a.bucket.end, b.bucket.end);
                prop_assert_eq!(&a.owners, &b.owners);
            }
        }
    }

    #[test]
    fn table_ignores_member_order(mut ids in member_ids(), rf in 1usize..3) {
        let forward = build_partition_table(&ids, rf);
        ids.reverse();
        prop_assert_eq!(forward, build_partition_table(&ids, rf));
    }

    #[test]
    fn owners_are_distinct(ids in member_ids(), rf in 1usize..4) {
        if let Ok(table) = build_partition_table(&ids, rf) {
            for entry in table.entries() {
                let mut owners = entry.owners.clone();
                owners.sort();
                owners.dedup();
                prop_assert_eq!(owners.len(), rf);
            }
        }
    }
}
