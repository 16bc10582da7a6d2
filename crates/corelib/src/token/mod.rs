//! Token abstraction module for consistent hashing.
//!
//! Tokens represent positions in the token space and must be comparable,
//! hashable, and thread-safe. A single fixed-width token type is used across
//! the cluster so independent nodes place keys identically.

pub mod hash128;
pub mod traits;

pub use hash128::{Token, MAX_TOKEN, MIN_TOKEN, TOKEN_LEN};
pub use traits::TokenError;
