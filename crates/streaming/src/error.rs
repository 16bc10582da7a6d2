//! Streaming errors.

/// Result type alias for streaming operations.
pub type Result<T> = std::result::Result<T, StreamingError>;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum StreamingError {
    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("connection to {0} closed")]
    ConnectionClosed(String),

    #[error("peer {0} unreachable")]
    Unreachable(String),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted snapshot: {0}")]
    CorruptSnapshot(String),
}
