//! End-to-end tests of the TCP transport over loopback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corelib::NodeInfo;
use streaming::{
    codec, Message, MessageType, Request, RequestHandler, Response, StreamReceiver, StreamSender,
    StreamingError, Transport,
};

struct Peer {
    info: NodeInfo,
}

#[async_trait]
impl RequestHandler for Peer {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Ping(t) => Response::Pong(t),
            Request::GetNodeInfo => Response::NodeInfo(self.info.clone()),
            Request::Elect(_) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Response::Ack(false)
            }
            _ => Response::Error("unsupported".to_string()),
        }
    }
}

async fn start_peer() -> String {
    let handler = Arc::new(Peer {
        info: NodeInfo::from_address("peer:1"),
    });
    let receiver = StreamReceiver::bind("127.0.0.1:0", handler).await.unwrap();
    let address = receiver.local_addr().unwrap().to_string();
    tokio::spawn(receiver.run());
    address
}

#[tokio::test]
async fn test_request_reply_correlation() {
    let address = start_peer().await;
    let sender = Arc::new(StreamSender::new());

    // concurrent requests on one connection get their own replies
    let calls: Vec<_> = (0..20u64)
        .map(|i| {
            let sender = Arc::clone(&sender);
            let address = address.clone();
            tokio::spawn(async move {
                sender
                    .call(&address, Request::Ping(i), Duration::from_secs(5))
                    .await
            })
        })
        .collect();
    for (i, call) in calls.into_iter().enumerate() {
        match call.await.unwrap().unwrap() {
            Response::Pong(t) => assert_eq!(t, i as u64),
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(sender.connection_count(), 1);

    match sender
        .call(&address, Request::GetNodeInfo, Duration::from_secs(5))
        .await
        .unwrap()
    {
        Response::NodeInfo(info) => assert_eq!(info.address, "peer:1"),
        other => panic!("unexpected {:?}", other),
    }
}

/// Pong server that counts the client connections it still holds open.
async fn start_counting_peer() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let open = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&open);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.into_split();
                while let Ok(Some(message)) = codec::read_message(&mut reader).await {
                    if let MessageType::Request(Request::Ping(t)) = message.body {
                        let reply = Message {
                            request_id: message.request_id,
                            body: MessageType::Response(Response::Pong(t)),
                        };
                        if codec::write_message(&mut writer, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                counter.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });
    (address, open)
}

#[tokio::test]
async fn test_concurrent_first_calls_keep_one_connection() {
    let (address, open) = start_counting_peer().await;
    let sender = Arc::new(StreamSender::new());

    let calls: Vec<_> = (0..16u64)
        .map(|i| {
            let sender = Arc::clone(&sender);
            let address = address.clone();
            tokio::spawn(async move {
                sender
                    .call(&address, Request::Ping(i), Duration::from_secs(5))
                    .await
            })
        })
        .collect();
    for call in calls {
        assert!(matches!(call.await.unwrap(), Ok(Response::Pong(_))));
    }
    assert_eq!(sender.connection_count(), 1);

    // connections that lost the race are closed, not left dangling
    tokio::time::timeout(Duration::from_secs(5), async {
        while open.load(Ordering::SeqCst) != 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_slow_reply_times_out() {
    let address = start_peer().await;
    let sender = StreamSender::new();
    let result = sender
        .call(&address, Request::Elect(vec![]), Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(StreamingError::Timeout(_))));

    // the connection stays usable
    assert!(sender
        .call(&address, Request::Ping(1), Duration::from_secs(5))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let result = StreamSender::new()
        .call(&address, Request::Ping(1), Duration::from_secs(2))
        .await;
    assert!(matches!(
        result,
        Err(StreamingError::Unreachable(_)) | Err(StreamingError::Timeout(_))
    ));
}
