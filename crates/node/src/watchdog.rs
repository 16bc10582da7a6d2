//! Periodic driver of the node lifecycle.

use std::sync::Arc;
use std::time::Duration;

use corelib::NodeStatus;

use crate::server::ServerNode;

/// Outcome of one [`WatchDog::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Terminated,
}

/// Reads the node status each tick and runs the matching handler.
pub struct WatchDog {
    node: Arc<ServerNode>,
    interval: Duration,
}

impl WatchDog {
    pub fn new(node: Arc<ServerNode>) -> Self {
        let interval = node.config().tick_interval();
        Self { node, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn tick(&self) -> Tick {
        if !self.node.is_running() {
            return Tick::Terminated;
        }
        match self.node.status() {
            NodeStatus::StartUp => self.node.on_start_up().await,
            NodeStatus::Setup => self.node.on_set_up().await,
            NodeStatus::Repair => self.node.on_repair().await,
            NodeStatus::Shutdown => self.node.close().await,
            // in progress, or nothing to do
            NodeStatus::StartingUp
            | NodeStatus::SettingUp
            | NodeStatus::Synchronization
            | NodeStatus::Up => {}
        }
        Tick::Continue
    }

    pub async fn run(self) {
        while self.tick().await == Tick::Continue {
            tokio::time::sleep(self.interval).await;
        }
        tracing::debug!(node = %self.node.address(), "watchdog stopped");
    }
}
