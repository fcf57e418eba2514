//! Operation aggregator node binary
//!
//! Runs the admission engine over a scenario file and reports the outcome.

mod cli;
mod config;
mod replay;

use anyhow::{Context, Result};
use cli::{Cli, Command};
use config::{NodeConfig, Scenario};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // stdout carries the report
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match &cli.command {
        Command::Replay(args) => {
            let config = NodeConfig::from(args);
            let scenario = load_scenario(&args.scenario)?;
            let report = replay::run(&config, &scenario).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Load a scenario from file
fn load_scenario(path: &Path) -> Result<Scenario> {
    tracing::info!("Loading scenario from {:?}", path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&content)
        .with_context(|| format!("parsing scenario {}", path.display()))?;
    Ok(scenario)
}
