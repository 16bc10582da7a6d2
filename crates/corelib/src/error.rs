//! Error types for the core library.

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid token value
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] crate::token::TokenError),
    /// The node holds no cluster information yet
    #[error("No cluster information available")]
    NoClusterInfo,
}
