//! Partitioner abstraction for consistent hashing.
//!
//! Partitioners are responsible for converting keys into tokens and for
//! carving the token space into buckets. Everything here is a pure
//! function of its inputs: two nodes given the same arguments produce the
//! same tokens and buckets bit for bit.

pub mod traits;
pub mod xxh3;

use std::collections::BTreeSet;

pub use traits::Partitioner;
pub use xxh3::Xxh3Partitioner;

use crate::node::Bucket;
use crate::token::Token;

/// Hashes `key` with the cluster's partitioner.
pub fn hash(key: &[u8]) -> Token {
    Xxh3Partitioner.partition(key)
}

/// Splits the whole token space into `n` buckets. See [`Partitioner::split`].
pub fn split(n: usize) -> BTreeSet<Bucket> {
    Xxh3Partitioner.split(n)
}

/// Mean of two tokens. See [`Token::midpoint`].
pub fn midpoint(a: &Token, b: &Token) -> Token {
    a.midpoint(b)
}
