//! CLI argument parsing for agg-node

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Operation aggregator node
#[derive(Parser, Debug, Clone)]
#[command(name = "aggregator")]
#[command(about = "Operation aggregator admission engine")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Node commands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Feed a scenario file through the admission engine and print the outcome
    Replay(ReplayArgs),
}

/// Pool backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Pools live in process memory
    Memory,
    /// Pools persist in a RocksDB directory
    Rocksdb,
}

/// Arguments of `replay`
#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// Scenario JSON file
    pub scenario: PathBuf,

    /// Pool backend
    #[arg(long, value_enum, default_value = "memory")]
    pub store: StoreKind,

    /// Data directory for the rocksdb backend
    #[arg(long, default_value = "./data")]
    pub datadir: PathBuf,

    /// Future pool capacity
    #[arg(long, default_value = "1024")]
    pub max_future: usize,

    /// Page size of pool queries
    #[arg(long, default_value = "100")]
    pub query_limit: usize,

    /// Maximum operations in the printed ready batch
    #[arg(long, default_value = "100")]
    pub batch_size: usize,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["aggregator", "replay", "ops.json"]);
        assert_eq!(cli.log_level, "info");

        let Command::Replay(args) = cli.command;
        assert_eq!(args.scenario, PathBuf::from("ops.json"));
        assert_eq!(args.store, StoreKind::Memory);
        assert_eq!(args.datadir, PathBuf::from("./data"));
        assert_eq!(args.max_future, 1024);
        assert_eq!(args.query_limit, 100);
        assert_eq!(args.batch_size, 100);
    }

    #[test]
    fn test_cli_custom_values() {
        let cli = Cli::parse_from([
            "aggregator",
            "replay",
            "ops.json",
            "--store",
            "rocksdb",
            "--datadir",
            "/tmp/agg",
            "--max-future",
            "8",
            "--query-limit",
            "4",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.log_level, "debug");

        let Command::Replay(args) = cli.command;
        assert_eq!(args.store, StoreKind::Rocksdb);
        assert_eq!(args.datadir, PathBuf::from("/tmp/agg"));
        assert_eq!(args.max_future, 8);
        assert_eq!(args.query_limit, 4);
    }
}
