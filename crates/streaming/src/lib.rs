//! Streaming protocol for ring state synchronization.
//!
//! This crate provides the node RPC plumbing:
//! - Request/response messages exchanged between nodes
//! - A length-prefixed bincode codec
//! - The [`Transport`] capability (send a request, correlate its reply)
//!   with a TCP implementation ([`StreamSender`] / [`StreamReceiver`]) and
//!   an in-process one ([`MemoryTransport`])
//! - Durable snapshots of the cluster state

pub mod codec;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod snapshot;
pub mod transport;

pub use error::{Result, StreamingError};
pub use memory::MemoryTransport;
pub use protocol::{Message, MessageType, Request, Response};
pub use receiver::StreamReceiver;
pub use sender::StreamSender;
pub use snapshot::SnapshotStore;
pub use transport::{RequestHandler, Transport};
