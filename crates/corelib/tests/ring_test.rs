//! Tests for the ring state holder.
//!
//! # Test Strategy
//!
//! 1. **Convergence**: most-recent-wins replacement, stale rejection
//! 2. **Membership**: node up/down idempotence, coordinator CAS
//! 3. **Ownership**: key owner lookup over buckets and mirrors
//! 4. **Thread safety**: concurrent transitions and updates

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use corelib::partitioner;
use corelib::{
    Bucket, ClusterInformation, ClusterStatus, NodeInfo, NodeStatus, Ring, Token,
};

fn node(addr: &str) -> NodeInfo {
    NodeInfo::from_address(addr)
}

fn snapshot(sender: &str, created_at: u64, members: &[&str]) -> ClusterInformation {
    let mut info = ClusterInformation::single(node(sender), created_at);
    for m in members {
        info.upsert_member(node(m));
    }
    info
}

// ============================================================================
// Convergence Tests
// ============================================================================

#[test]
fn test_first_update_is_accepted() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    assert!(ring.cluster_info().is_none());
    assert!(ring.update_cluster_info(snapshot("10.0.0.2:7000", 10, &[])));
    assert_eq!(ring.cluster_info().unwrap().created_at, 10);
}

#[test]
fn test_stale_update_is_rejected() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    assert!(ring.update_cluster_info(snapshot("10.0.0.2:7000", 100, &["10.0.0.3:7000"])));
    let before = ring.cluster_info().unwrap();

    assert!(!ring.update_cluster_info(snapshot("10.0.0.2:7000", 99, &[])));

    let after = ring.cluster_info().unwrap();
    assert!(Arc::ptr_eq(&before, &after), "held value must be untouched");
}

#[test]
fn test_increasing_updates_end_on_last() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    for ts in 1..=50 {
        assert!(ring.update_cluster_info(snapshot("10.0.0.2:7000", ts, &[])));
    }
    assert_eq!(ring.cluster_info().unwrap().created_at, 50);
}

#[test]
fn test_shuffled_arrival_keeps_newest() {
    // Arrival order differs from creation order; only the newest survives.
    let ring = Ring::new(node("10.0.0.1:7000"));
    let order = [7u64, 3, 9, 1, 12, 5, 11, 2];
    let mut accepted = 0;
    for ts in order {
        if ring.update_cluster_info(snapshot("10.0.0.2:7000", ts, &[])) {
            accepted += 1;
        }
    }
    assert_eq!(ring.cluster_info().unwrap().created_at, 12);
    // 7, 9, 12 were each newer than everything before them.
    assert_eq!(accepted, 3);
}

#[test]
fn test_equal_timestamp_breaks_tie_on_sender() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    assert!(ring.update_cluster_info(snapshot("10.0.0.5:7000", 10, &[])));
    assert!(!ring.update_cluster_info(snapshot("10.0.0.4:7000", 10, &[])));
    assert!(ring.update_cluster_info(snapshot("10.0.0.6:7000", 10, &[])));
    // Re-applying the held version is accepted.
    assert!(ring.update_cluster_info(snapshot("10.0.0.6:7000", 10, &[])));
    assert_eq!(ring.cluster_info().unwrap().sender.address, "10.0.0.6:7000");
}

#[test]
fn test_concurrent_updates_converge_to_newest() {
    let ring = Arc::new(Ring::new(node("10.0.0.1:7000")));
    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for i in 0..200u64 {
                    ring.update_cluster_info(snapshot("10.0.0.2:7000", i * 8 + t, &[]));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(ring.cluster_info().unwrap().created_at, 199 * 8 + 7);
}

#[test]
fn test_publish_authors_strictly_newer_version() {
    let local = node("10.0.0.1:7000");
    let ring = Ring::new(local.clone());
    let far_future = u64::MAX / 2;
    ring.update_cluster_info(snapshot("10.0.0.9:7000", far_future, &["10.0.0.1:7000"]));

    let published = ring.publish(|info| {
        info.status = ClusterStatus::Repair;
        true
    });
    let published = published.unwrap();
    assert_eq!(published.created_at, far_future + 1);
    assert_eq!(published.sender, local);
}

#[test]
fn test_publish_after_maximal_timestamp_does_not_overflow() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    assert!(ring.update_cluster_info(snapshot("10.0.0.9:7000", u64::MAX, &["10.0.0.1:7000"])));

    assert!(ring.node_up(node("10.0.0.2:7000")));
    let held = ring.cluster_info().unwrap();
    assert_eq!(held.created_at, u64::MAX);
    assert_eq!(held.members.len(), 3);
}

#[test]
fn test_amend_keeps_version() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    ring.update_cluster_info(snapshot("10.0.0.9:7000", 42, &["10.0.0.1:7000"]));
    assert!(ring.forget(&node("10.0.0.9:7000")));
    let held = ring.cluster_info().unwrap();
    assert_eq!(held.version(), (42, "10.0.0.9:7000"));
    assert!(held.coordinator.is_none());
}

// ============================================================================
// Membership Tests
// ============================================================================

#[test]
fn test_node_up_is_idempotent_and_requests_repair() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    ring.update_cluster_info(ClusterInformation::single(node("10.0.0.1:7000"), 1));

    assert!(ring.node_up(node("10.0.0.2:7000")));
    assert!(!ring.node_up(node("10.0.0.2:7000")));

    let held = ring.cluster_info().unwrap();
    assert_eq!(held.members.len(), 2);
    assert_eq!(held.status, ClusterStatus::Repair);
}

#[test]
fn test_node_down_is_idempotent() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    ring.update_cluster_info(snapshot("10.0.0.1:7000", 1, &["10.0.0.2:7000"]));

    assert!(ring.node_down(&node("10.0.0.2:7000")));
    assert!(!ring.node_down(&node("10.0.0.2:7000")));
    assert_eq!(ring.members().len(), 1);
}

#[test]
fn test_set_coordinator_requires_expected_old_value() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    ring.update_cluster_info(snapshot("10.0.0.1:7000", 1, &["10.0.0.2:7000"]));
    let old = node("10.0.0.1:7000");
    let new = node("10.0.0.2:7000");

    assert!(!ring.set_coordinator(Some(&new), new.clone()));
    assert!(ring.set_coordinator(Some(&old), new.clone()));
    assert_eq!(ring.coordinator().unwrap(), new);
    assert!(!ring.set_coordinator(Some(&old), old.clone()));
}

#[test]
fn test_refresh_self_updates_own_status() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    ring.update_cluster_info(snapshot("10.0.0.1:7000", 1, &[]));
    assert!(ring.transition_node(NodeStatus::StartUp, NodeStatus::StartingUp));

    assert!(ring.refresh_self());
    assert!(!ring.refresh_self());
    let held = ring.cluster_info().unwrap();
    assert_eq!(
        held.member("10.0.0.1:7000").unwrap().status,
        NodeStatus::StartingUp
    );
}

#[test]
fn test_publish_self_authors_status_change() {
    let local = node("10.0.0.1:7000");
    let ring = Ring::new(local.clone());
    ring.update_cluster_info(snapshot("10.0.0.9:7000", 5, &["10.0.0.1:7000"]));
    assert!(ring.transition_node(NodeStatus::StartUp, NodeStatus::StartingUp));

    assert!(ring.publish_self());
    let held = ring.cluster_info().unwrap();
    assert!(held.created_at > 5);
    assert_eq!(held.sender, local);
    assert_eq!(held.member("10.0.0.1:7000").unwrap().status, NodeStatus::StartingUp);
    assert!(!ring.publish_self());
}

#[test]
fn test_refresh_member_keeps_later_status() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    ring.update_cluster_info(ClusterInformation::single(node("10.0.0.1:7000"), 1));
    let mut joiner = node("10.0.0.2:7000");
    joiner.status = NodeStatus::SettingUp;
    joiner.last_updated = 100;
    assert!(ring.node_up(joiner.clone()));
    let joined = ring.cluster_info().unwrap().created_at;

    let mut up = joiner.clone();
    up.status = NodeStatus::Up;
    up.last_updated = 200;
    assert!(ring.refresh_member(&up));
    // an older report does not overwrite the newer one
    assert!(!ring.refresh_member(&joiner));
    assert!(!ring.node_up(up.clone()));

    let held = ring.cluster_info().unwrap();
    assert!(held.created_at > joined);
    assert_eq!(held.member("10.0.0.2:7000").unwrap().status, NodeStatus::Up);
}

#[test]
fn test_concurrent_node_transition_single_winner() {
    let ring = Arc::new(Ring::new(node("10.0.0.1:7000")));
    let winners = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..32)
        .map(|_| {
            let ring = Arc::clone(&ring);
            let winners = Arc::clone(&winners);
            std::thread::spawn(move || {
                if ring.transition_node(NodeStatus::StartUp, NodeStatus::StartingUp) {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(ring.node_status(), NodeStatus::StartingUp);
}

// ============================================================================
// Ownership Tests
// ============================================================================

#[test]
fn test_key_owners_scans_buckets() {
    let ring = Ring::new(node("10.0.0.1:7000"));
    let buckets: Vec<Bucket> = partitioner::split(2).into_iter().collect();

    let mut a = node("10.0.0.1:7000");
    a.buckets.insert(buckets[0]);
    a.mirrors.insert(buckets[1]);
    let mut b = node("10.0.0.2:7000");
    b.buckets.insert(buckets[1]);

    let mut info = ClusterInformation::single(a.clone(), 1);
    info.upsert_member(a.clone());
    info.upsert_member(b.clone());
    ring.update_cluster_info(info);

    // Find a key landing in the second bucket.
    let key = (0..)
        .map(|i: u32| format!("key-{i}").into_bytes())
        .find(|k| buckets[1].contains(&partitioner::hash(k)))
        .unwrap();

    let owners = ring.key_owners(&key);
    let expected: BTreeSet<NodeInfo> = [a, b].into_iter().collect();
    assert_eq!(owners, expected);

    assert!(Ring::new(node("10.0.0.3:7000")).key_owners(b"k").is_empty());
    assert!(buckets[0].contains(&Token::from_u128(0)));
}
