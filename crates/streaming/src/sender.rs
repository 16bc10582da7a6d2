//! Client side of the TCP transport.
//!
//! One connection per peer address. Requests carry a locally generated id;
//! a reader task per connection completes the matching pending request when
//! the reply frame arrives.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};

use crate::codec;
use crate::error::{Result, StreamingError};
use crate::protocol::{Message, MessageType, Request, Response};
use crate::transport::Transport;

struct Connection {
    address: String,
    writer: Mutex<OwnedWriteHalf>,
    pending: DashMap<u64, oneshot::Sender<Response>>,
    closed: AtomicBool,
}

impl Connection {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // dropping the senders fails every waiter with ConnectionClosed
        self.pending.clear();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// TCP [`Transport`] with per-peer connection caching.
#[derive(Default)]
pub struct StreamSender {
    connections: DashMap<String, Arc<Connection>>,
    next_request_id: AtomicU64,
}

impl StreamSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached, open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.iter().filter(|c| !c.is_closed()).count()
    }

    async fn connection(&self, address: &str, timeout: Duration) -> Result<Arc<Connection>> {
        if let Some(conn) = self.connections.get(address) {
            if !conn.is_closed() {
                return Ok(Arc::clone(&conn));
            }
        }

        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| StreamingError::Timeout(address.to_string()))?
            .map_err(|e| {
                tracing::debug!(peer = %address, error = %e, "connect failed");
                StreamingError::Unreachable(address.to_string())
            })?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        let conn = Arc::new(Connection {
            address: address.to_string(),
            writer: Mutex::new(writer),
            pending: DashMap::new(),
            closed: AtomicBool::new(false),
        });
        match self.connections.entry(address.to_string()) {
            // a concurrent caller connected first; our halves drop unused
            Entry::Occupied(cached) if !cached.get().is_closed() => {
                return Ok(Arc::clone(cached.get()));
            }
            Entry::Occupied(mut stale) => {
                stale.insert(Arc::clone(&conn));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&conn));
            }
        }
        tokio::spawn(read_replies(Arc::clone(&conn), reader));
        metrics::counter!("connections_opened_total").increment(1);
        tracing::debug!(peer = %address, "connected");
        Ok(conn)
    }

    fn drop_connection(&self, conn: &Arc<Connection>) {
        conn.close();
        self.connections
            .remove_if(&conn.address, |_, cached| Arc::ptr_eq(cached, conn));
    }
}

async fn read_replies(conn: Arc<Connection>, mut reader: OwnedReadHalf) {
    loop {
        match codec::read_message(&mut reader).await {
            Ok(Some(Message {
                request_id,
                body: MessageType::Response(response),
            })) => match conn.pending.remove(&request_id) {
                Some((_, waiter)) => {
                    let _ = waiter.send(response);
                }
                None => tracing::debug!(peer = %conn.address, request_id, "reply for abandoned request"),
            },
            Ok(Some(message)) => {
                tracing::warn!(peer = %conn.address, request_id = message.request_id, "unexpected request on client connection");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(peer = %conn.address, error = %e, "connection read failed");
                break;
            }
        }
    }
    tracing::debug!(peer = %conn.address, "connection closed");
    conn.close();
}

#[async_trait]
impl Transport for StreamSender {
    async fn call(&self, address: &str, request: Request, timeout: Duration) -> Result<Response> {
        let conn = self.connection(address, timeout).await?;
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        conn.pending.insert(request_id, tx);

        let message = Message::request(request_id, request);
        let written = {
            let mut writer = conn.writer.lock().await;
            codec::write_message(&mut *writer, &message).await
        };
        if let Err(e) = written {
            tracing::warn!(peer = %address, error = %e, "request write failed");
            self.drop_connection(&conn);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.drop_connection(&conn);
                Err(StreamingError::ConnectionClosed(address.to_string()))
            }
            Err(_) => {
                conn.pending.remove(&request_id);
                Err(StreamingError::Timeout(address.to_string()))
            }
        }
    }
}
