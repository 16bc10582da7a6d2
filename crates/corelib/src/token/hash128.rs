//! 128-bit hash token.
//!
//! Tokens are stored as big-endian byte arrays so that the derived ordering
//! (lexicographic over bytes) is the unsigned integer ordering. Arithmetic
//! (midpoints, distances, range splitting) goes through `u128`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

use super::traits::TokenError;

/// Width of a token in bytes.
pub const TOKEN_LEN: usize = 16;

/// Smallest token of the ring.
pub const MIN_TOKEN: Token = Token([0; TOKEN_LEN]);

/// Largest token of the ring (inclusive).
pub const MAX_TOKEN: Token = Token([u8::MAX; TOKEN_LEN]);

/// Fixed-width position in the token space.
///
/// # Example
///
/// ```rust
/// use corelib::token::Token;
///
/// let a = Token::from_key(b"user:42");
/// assert_eq!(a, Token::from_key(b"user:42"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Token(pub [u8; TOKEN_LEN]);

impl Token {
    /// Hashes an arbitrary key into a token (xxh3, 128 bit).
    #[inline]
    pub fn from_key(key: &[u8]) -> Self {
        Self::from_u128(xxh3_128(key))
    }

    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Token(value.to_be_bytes())
    }

    #[inline]
    pub const fn as_u128(&self) -> u128 {
        u128::from_be_bytes(self.0)
    }

    /// Builds a token from exactly [`TOKEN_LEN`] big-endian bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TokenError> {
        let array: [u8; TOKEN_LEN] = bytes.try_into().map_err(|_| {
            TokenError::InvalidBytes(format!(
                "expected {} bytes, got {}",
                TOKEN_LEN,
                bytes.len()
            ))
        })?;
        Ok(Token(array))
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }

    pub fn is_min(&self) -> bool {
        *self == MIN_TOKEN
    }

    pub fn is_max(&self) -> bool {
        *self == MAX_TOKEN
    }

    /// Arithmetic mean of two tokens, rounded down. Symmetric in its arguments.
    pub fn midpoint(&self, other: &Self) -> Self {
        let (a, b) = (self.as_u128(), other.as_u128());
        // (a + b) / 2 without the overflow of the intermediate sum
        Self::from_u128((a >> 1) + (b >> 1) + (a & b & 1))
    }

    /// Clockwise distance from `self` to `other` on the ring.
    pub fn distance_to(&self, other: &Self) -> u128 {
        other.as_u128().wrapping_sub(self.as_u128())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.as_u128())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self)
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim_start_matches("0x");
        if digits.is_empty() || digits.len() > TOKEN_LEN * 2 {
            return Err(TokenError::InvalidHex(s.to_string()));
        }
        u128::from_str_radix(digits, 16)
            .map(Token::from_u128)
            .map_err(|_| TokenError::InvalidHex(s.to_string()))
    }
}

impl From<u128> for Token {
    fn from(value: u128) -> Self {
        Token::from_u128(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_unsigned_big_endian() {
        let small = Token::from_u128(1);
        let large = Token::from_u128(1 << 120);
        assert!(small < large);
        assert!(MIN_TOKEN < small);
        assert!(large < MAX_TOKEN);
        assert_eq!(large.as_bytes()[0], 1);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(Token::from_key(b"key"), Token::from_key(b"key"));
        assert_ne!(Token::from_key(b"key1"), Token::from_key(b"key2"));
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(
            Token::from_u128(10).midpoint(&Token::from_u128(20)),
            Token::from_u128(15)
        );
        assert_eq!(
            Token::from_u128(3).midpoint(&Token::from_u128(4)),
            Token::from_u128(3)
        );
        // No overflow at the top of the range.
        assert_eq!(MAX_TOKEN.midpoint(&MAX_TOKEN), MAX_TOKEN);
        assert_eq!(
            MIN_TOKEN.midpoint(&MAX_TOKEN),
            Token::from_u128(u128::MAX / 2)
        );
    }

    #[test]
    fn test_distance_wraps() {
        let a = Token::from_u128(100);
        let b = Token::from_u128(200);
        assert_eq!(a.distance_to(&b), 100);
        assert_eq!(MAX_TOKEN.distance_to(&MIN_TOKEN), 1);
    }

    #[test]
    fn test_parse_and_display() {
        let token = Token::from_u128(0xabc);
        let text = token.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(text.parse::<Token>().unwrap(), token);
        assert_eq!("0xabc".parse::<Token>().unwrap(), token);
        assert!("zz".parse::<Token>().is_err());
        assert!(Token::from_slice(&[1, 2, 3]).is_err());
    }
}
