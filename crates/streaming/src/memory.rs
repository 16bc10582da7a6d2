//! In-process transport.
//!
//! Routes requests to handlers registered under an address, passing every
//! request and reply through the real codec. Addresses can be marked
//! unreachable to simulate partitions and crashed peers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use dashmap::{DashMap, DashSet};

use crate::codec;
use crate::error::{Result, StreamingError};
use crate::protocol::{Message, MessageType, Request, Response};
use crate::transport::{RequestHandler, Transport};

#[derive(Default)]
pub struct MemoryTransport {
    handlers: DashMap<String, Weak<dyn RequestHandler>>,
    unreachable: DashSet<String>,
    next_request_id: AtomicU64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves requests for `address` with `handler`. Only a weak reference
    /// is kept: dropping the handler makes the address unreachable.
    pub fn register<H: RequestHandler>(&self, address: &str, handler: &Arc<H>) {
        let weak: Weak<dyn RequestHandler> = Arc::downgrade(handler) as Weak<dyn RequestHandler>;
        self.handlers.insert(address.to_string(), weak);
    }

    pub fn unregister(&self, address: &str) {
        self.handlers.remove(address);
    }

    pub fn set_reachable(&self, address: &str, reachable: bool) {
        if reachable {
            self.unreachable.remove(address);
        } else {
            self.unreachable.insert(address.to_string());
        }
    }

    fn handler(&self, address: &str) -> Option<Arc<dyn RequestHandler>> {
        if self.unreachable.contains(address) {
            return None;
        }
        self.handlers.get(address).and_then(|h| h.upgrade())
    }
}

/// Encodes and decodes `message` as it would travel over a socket.
fn transmit(message: &Message) -> Result<Message> {
    let frame = codec::encode(message)?;
    let mut buf = BytesMut::from(&frame[..]);
    codec::decode(&mut buf)?
        .ok_or_else(|| StreamingError::Protocol("incomplete in-memory frame".to_string()))
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn call(&self, address: &str, request: Request, timeout: Duration) -> Result<Response> {
        let handler = self
            .handler(address)
            .ok_or_else(|| StreamingError::Unreachable(address.to_string()))?;

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = match transmit(&Message::request(request_id, request))?.body {
            MessageType::Request(request) => request,
            MessageType::Response(_) => {
                return Err(StreamingError::Protocol("request decoded as response".to_string()))
            }
        };

        let response = tokio::time::timeout(timeout, handler.handle(request))
            .await
            .map_err(|_| StreamingError::Timeout(address.to_string()))?;

        // the peer may have become unreachable while handling
        if self.unreachable.contains(address) {
            return Err(StreamingError::ConnectionClosed(address.to_string()));
        }

        match transmit(&Message::response(request_id, response))?.body {
            MessageType::Response(response) => Ok(response),
            MessageType::Request(_) => {
                Err(StreamingError::Protocol("response decoded as request".to_string()))
            }
        }
    }
}
