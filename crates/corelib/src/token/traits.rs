//! Core token error definitions.

/// Errors that can occur when parsing or manipulating tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Invalid byte sequence for this token type
    InvalidBytes(String),
    /// Token string is not valid hexadecimal
    InvalidHex(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::InvalidBytes(s) => write!(f, "invalid token bytes: {}", s),
            TokenError::InvalidHex(s) => write!(f, "invalid token hex: {}", s),
        }
    }
}

impl std::error::Error for TokenError {}
