//! xxh3-128 partitioner implementation.

use crate::partitioner::traits::Partitioner;
use crate::token::{Token, MAX_TOKEN, MIN_TOKEN};

/// Partitioner hashing keys with 128-bit xxh3.
#[derive(Clone, Copy, Debug, Default)]
pub struct Xxh3Partitioner;

impl Partitioner for Xxh3Partitioner {
    fn partition(&self, key: &[u8]) -> Token {
        Token::from_key(key)
    }

    fn min_token(&self) -> Token {
        MIN_TOKEN
    }

    fn max_token(&self) -> Token {
        MAX_TOKEN
    }

    fn name(&self) -> &'static str {
        "Xxh3Partitioner"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BucketState;

    #[test]
    fn test_split_single_bucket_covers_everything() {
        let buckets = Xxh3Partitioner.split(1);
        assert_eq!(buckets.len(), 1);
        let bucket = buckets.iter().next().unwrap();
        assert_eq!(bucket.start, MIN_TOKEN);
        assert_eq!(bucket.end, MAX_TOKEN);
        assert_eq!(bucket.state, BucketState::Balancing);
    }

    #[test]
    fn test_split_zero() {
        assert!(Xxh3Partitioner.split(0).is_empty());
    }

    #[test]
    fn test_split_three() {
        let buckets: Vec<_> = Xxh3Partitioner.split(3).into_iter().collect();
        let width = u128::MAX / 3;
        assert_eq!(buckets[0].end.as_u128(), width - 1);
        assert_eq!(buckets[1].start.as_u128(), width);
        assert_eq!(buckets[2].end, MAX_TOKEN);
    }
}
