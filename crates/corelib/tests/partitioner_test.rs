//! Property tests for the partitioner.

use corelib::partitioner::{self, Partitioner, Xxh3Partitioner};
use corelib::token::{Token, MAX_TOKEN, MIN_TOKEN};
use proptest::prelude::*;

proptest! {
    #[test]
    fn split_is_contiguous_and_complete(n in 1usize..512) {
        let buckets: Vec<_> = partitioner::split(n).into_iter().collect();
        prop_assert_eq!(buckets.len(), n);
        prop_assert_eq!(buckets[0].start, MIN_TOKEN);
        prop_assert_eq!(buckets[n - 1].end, MAX_TOKEN);
        for pair in buckets.windows(2) {
            prop_assert!(pair[0].start <= pair[0].end);
            // next bucket starts right after the previous one ends
            prop_assert_eq!(pair[0].end.as_u128() + 1, pair[1].start.as_u128());
        }
    }

    #[test]
    fn every_token_has_exactly_one_bucket(n in 1usize..64, raw in any::<u128>()) {
        let token = Token::from_u128(raw);
        let hits = partitioner::split(n)
            .iter()
            .filter(|b| b.contains(&token))
            .count();
        prop_assert_eq!(hits, 1);
    }

    #[test]
    fn midpoint_lies_between(a in any::<u128>(), b in any::<u128>()) {
        let (lo, hi) = (a.min(b), a.max(b));
        let mid = partitioner::midpoint(&Token::from_u128(a), &Token::from_u128(b));
        prop_assert!(lo <= mid.as_u128() && mid.as_u128() <= hi);
        prop_assert_eq!(mid, Token::from_u128(b).midpoint(&Token::from_u128(a)));
    }

    #[test]
    fn hash_is_deterministic(key in proptest::collection::vec(any::<u8>(), 0..64)) {
        prop_assert_eq!(partitioner::hash(&key), Xxh3Partitioner.partition(&key));
    }
}

#[test]
fn partitioner_name() {
    assert_eq!(Xxh3Partitioner.name(), "Xxh3Partitioner");
}
