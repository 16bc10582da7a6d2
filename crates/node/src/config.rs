//! Node configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use corelib::{NodeId, NodeInfo};
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, Result};

/// Settings of one node. Every field has a default, so a JSON file only
/// needs the fields it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Ring identity. Derived from `address` when absent.
    pub node_id: Option<u128>,
    pub address: String,
    /// Addresses tried in order when joining. Empty bootstraps a new cluster.
    pub seeds: Vec<String>,
    pub replication_factor: usize,
    /// WatchDog period.
    pub tick_interval_ms: u64,
    /// Anti-entropy period.
    pub sync_interval_ms: u64,
    pub rpc_timeout_ms: u64,
    /// Where the cluster snapshot is persisted. No persistence when absent.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            address: "127.0.0.1:7000".to_string(),
            seeds: Vec::new(),
            replication_factor: 1,
            tick_interval_ms: 500,
            sync_interval_ms: 1000,
            rpc_timeout_ms: 2000,
            snapshot_path: None,
        }
    }
}

impl NodeConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seeds = seeds.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: usize) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Reads a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| NodeError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(NodeError::Config("address must not be empty".to_string()));
        }
        if self.replication_factor == 0 {
            return Err(NodeError::Config(
                "replication_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
            .map(NodeId)
            .unwrap_or_else(|| NodeId::from_address(&self.address))
    }

    /// Identity of the local node as first advertised to peers.
    pub fn node_info(&self) -> NodeInfo {
        NodeInfo::new(self.node_id(), self.address.clone())
    }

    /// Seeds other than this node's own address.
    pub fn peer_seeds(&self) -> Vec<String> {
        self.seeds
            .iter()
            .filter(|s| **s != self.address)
            .cloned()
            .collect()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
