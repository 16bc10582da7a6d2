//! Subcommands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use corelib::{partitioner, NodeId};
use node::{NodeConfig, ServerNode};
use serde::Serialize;
use streaming::{RequestHandler, StreamReceiver, StreamSender, Transport};

/// How long a node gets to leave the cluster after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum Command {
    #[command(about = "Runs a node until interrupted.")]
    Start(StartArgs),
    #[command(about = "Prints the token of a key.")]
    Token(TokenArgs),
    #[command(about = "Prints the partition table of a membership.")]
    Table(TableArgs),
}

#[derive(Args, Debug)]
pub struct StartArgs {
    #[arg(long, short = 'c', help = "JSON node config file")]
    pub config: Option<PathBuf>,

    #[arg(long, short = 'a', help = "Listen address, host:port")]
    pub address: Option<String>,

    #[arg(long = "seed", short = 's', help = "Seed address; repeat for several")]
    pub seeds: Vec<String>,

    #[arg(long, help = "Copies of every bucket")]
    pub replication_factor: Option<usize>,

    #[arg(long, help = "Where to persist the cluster snapshot")]
    pub snapshot: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TokenArgs {
    pub key: String,
}

#[derive(Args, Debug)]
pub struct TableArgs {
    #[arg(required = true, help = "Member addresses")]
    pub members: Vec<String>,

    #[arg(long, default_value_t = 1)]
    pub replication_factor: usize,
}

#[derive(Serialize)]
struct TableRow {
    start: String,
    end: String,
    owners: Vec<String>,
}

impl Command {
    pub async fn execute(self) -> anyhow::Result<()> {
        match self {
            Command::Start(args) => start(args).await,
            Command::Token(args) => {
                println!("{}", partitioner::hash(args.key.as_bytes()));
                Ok(())
            }
            Command::Table(args) => {
                println!("{}", table(&args)?);
                Ok(())
            }
        }
    }
}

impl StartArgs {
    /// File config, if any, overridden by the flags given.
    pub fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_file(path)?,
            None => NodeConfig::default(),
        };
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if !self.seeds.is_empty() {
            config.seeds = self.seeds.clone();
        }
        if let Some(replication_factor) = self.replication_factor {
            config.replication_factor = replication_factor;
        }
        if let Some(snapshot) = &self.snapshot {
            config.snapshot_path = Some(snapshot.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

async fn start(args: StartArgs) -> anyhow::Result<()> {
    let config = args.node_config()?;
    let transport: Arc<dyn Transport> = Arc::new(StreamSender::new());
    let server = ServerNode::new(config, transport);

    let handler: Arc<dyn RequestHandler> = Arc::clone(&server) as Arc<dyn RequestHandler>;
    let receiver = StreamReceiver::bind(server.address(), handler).await?;
    tracing::info!(address = %receiver.local_addr()?, "listening");
    let listener = tokio::spawn(receiver.run());
    let tasks = server.start();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted; leaving cluster");
            server.shutdown();
            if tokio::time::timeout(SHUTDOWN_GRACE, server.closed()).await.is_err() {
                tracing::warn!("node did not close in time");
            }
        }
        _ = server.closed() => {}
    }

    tasks.abort();
    listener.abort();
    Ok(())
}

fn table(args: &TableArgs) -> anyhow::Result<String> {
    let ids: Vec<NodeId> = args.members.iter().map(|m| NodeId::from_address(m)).collect();
    let table = replication::build_partition_table(&ids, args.replication_factor)?;
    let name_of = |id: &NodeId| {
        args.members
            .iter()
            .find(|m| NodeId::from_address(m) == *id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    };
    let rows: Vec<TableRow> = table
        .entries()
        .iter()
        .map(|entry| TableRow {
            start: entry.bucket.start.to_string(),
            end: entry.bucket.end.to_string(),
            owners: entry.owners.iter().map(name_of).collect(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}
