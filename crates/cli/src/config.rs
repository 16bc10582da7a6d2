//! Top-level arguments and logging setup.

use clap::{Parser, ValueEnum};
use tracing::Level;

use crate::commands::Command;

#[derive(Parser, Debug)]
#[command(name = "clustr", about, version)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, default_value_t = LogLevel::Info, value_enum, global = true)]
    pub log_level: LogLevel,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl CliConfig {
    pub fn run(self) -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(Level::from(self.log_level))
            .with_target(false)
            .init();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.command.execute())
    }
}
