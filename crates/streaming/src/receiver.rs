//! Server side of the TCP transport.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::codec;
use crate::error::Result;
use crate::protocol::{Message, MessageType};
use crate::transport::RequestHandler;

/// Replies queued per connection before request tasks back off.
const WRITE_QUEUE: usize = 64;

/// Accepts peer connections and dispatches their requests to a handler.
pub struct StreamReceiver {
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
}

impl StreamReceiver {
    pub async fn bind(address: &str, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, handler })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the task is dropped or accepting fails.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(%peer, error = %e, "set_nodelay failed");
            }
            metrics::counter!("connections_accepted_total").increment(1);
            tracing::debug!(%peer, "accepted connection");
            tokio::spawn(serve_connection(stream, peer, Arc::clone(&self.handler)));
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, handler: Arc<dyn RequestHandler>) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Message>(WRITE_QUEUE);

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = codec::write_message(&mut writer, &message).await {
                tracing::warn!(%peer, error = %e, "reply write failed");
                break;
            }
        }
    });

    loop {
        match codec::read_message(&mut reader).await {
            Ok(Some(Message {
                request_id,
                body: MessageType::Request(request),
            })) => {
                let handler = Arc::clone(&handler);
                let tx = tx.clone();
                tokio::spawn(async move {
                    tracing::trace!(%peer, request_id, op = request.name(), "handling request");
                    let response = handler.handle(request).await;
                    if tx.send(Message::response(request_id, response)).await.is_err() {
                        tracing::debug!(%peer, request_id, "connection gone before reply");
                    }
                });
            }
            Ok(Some(message)) => {
                tracing::warn!(%peer, request_id = message.request_id, "unexpected response on server connection");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "request read failed");
                break;
            }
        }
    }
    tracing::debug!(%peer, "connection closed");
}
