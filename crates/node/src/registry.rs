//! Address to [`NodeRef`] resolution.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use streaming::Transport;

use crate::node::NodeRef;
use crate::remote::RemoteNode;
use crate::server::ServerNode;

/// Resolves addresses to the local server or to cached remote stubs.
///
/// Holds the local server weakly; the server owns the registry.
pub struct NodeRegistry {
    local_address: String,
    local: Weak<ServerNode>,
    transport: Arc<dyn Transport>,
    rpc_timeout: Duration,
    remotes: DashMap<String, Arc<RemoteNode>>,
}

impl NodeRegistry {
    pub(crate) fn new(
        local_address: String,
        local: Weak<ServerNode>,
        transport: Arc<dyn Transport>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            local_address,
            local,
            transport,
            rpc_timeout,
            remotes: DashMap::new(),
        }
    }

    /// The local server while it is alive.
    pub fn local(&self) -> Option<Arc<ServerNode>> {
        self.local.upgrade()
    }

    /// Handle for `address`. The local address resolves to the server
    /// itself, so local calls never touch the transport.
    pub fn resolve(&self, address: &str) -> NodeRef {
        if address == self.local_address {
            if let Some(local) = self.local() {
                return NodeRef::Local(local);
            }
        }
        let remote = self
            .remotes
            .entry(address.to_string())
            .or_insert_with(|| {
                Arc::new(RemoteNode::new(
                    address,
                    Arc::clone(&self.transport),
                    self.rpc_timeout,
                ))
            })
            .value()
            .clone();
        NodeRef::Remote(remote)
    }

    /// Drops the cached stub of a departed peer.
    pub fn forget(&self, address: &str) {
        self.remotes.remove(address);
    }

    /// Number of cached remote stubs.
    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }
}
