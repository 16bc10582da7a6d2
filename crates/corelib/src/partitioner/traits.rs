//! Core partitioner trait definitions.

use std::collections::BTreeSet;

use crate::node::Bucket;
use crate::token::Token;

/// A partitioner converts keys into tokens for placement on the ring.
///
/// Partitioners are stateless and thread-safe, allowing concurrent
/// token generation without synchronization overhead.
pub trait Partitioner: Send + Sync + 'static {
    /// Converts a key into a token.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to partition
    ///
    /// # Returns
    ///
    /// A token representing the position on the ring
    fn partition(&self, key: &[u8]) -> Token;

    /// Returns the minimum token value for this partitioner.
    fn min_token(&self) -> Token;

    /// Returns the maximum token value for this partitioner.
    fn max_token(&self) -> Token;

    /// Returns the name of this partitioner.
    fn name(&self) -> &'static str;

    /// Divides `[min_token, max_token]` into `n` contiguous, non-overlapping
    /// buckets of equal width. The last bucket absorbs the remainder up to
    /// `max_token` inclusive. Every bucket starts out `Balancing`.
    ///
    /// `n == 0` yields no buckets.
    fn split(&self, n: usize) -> BTreeSet<Bucket> {
        let mut buckets = BTreeSet::new();
        if n == 0 {
            return buckets;
        }

        let min = self.min_token().as_u128();
        let max = self.max_token().as_u128();
        let width = (max - min) / n as u128;

        for i in 0..n {
            let start = min + width * i as u128;
            let end = if i + 1 == n { max } else { start + width - 1 };
            buckets.insert(Bucket::new(Token::from_u128(start), Token::from_u128(end)));
        }
        buckets
    }
}
