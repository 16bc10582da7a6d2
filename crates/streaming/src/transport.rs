//! Transport capability consumed by remote node stubs.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{Request, Response};

/// Asynchronous send-and-correlate-reply primitive.
///
/// Implementations must fail the call with
/// [`StreamingError::Timeout`](crate::StreamingError::Timeout) once
/// `timeout` elapses instead of waiting indefinitely.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn call(&self, address: &str, request: Request, timeout: Duration) -> Result<Response>;
}

/// Serves requests arriving from peers.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}
