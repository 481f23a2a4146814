//! CLI implementation for depnet
//!
//! Collects the dependency network of one contract and prints it as pretty
//! JSON, optionally exporting JSON and Graphviz DOT files as well.

use crate::block::BlockBound;
use crate::cache::CachedGateway;
use crate::collector::TraceCollector;
use crate::config::{load_config, CollectorConfig};
use crate::rpc::RpcClient;
use crate::types::format_address;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Contract dependency network builder
#[derive(Parser, Debug)]
#[command(name = "depnet")]
#[command(about = "Build a contract's call dependency network from historical traces")]
pub struct Cli {
    /// Contract address to analyse (hex, with 0x prefix)
    #[arg(short, long)]
    pub address: String,

    /// First block of the range (decimal or 0x-prefixed hex)
    #[arg(long, requires = "to_block")]
    pub from_block: Option<BlockBound>,

    /// Last block of the range (decimal or 0x-prefixed hex)
    #[arg(long, requires = "from_block")]
    pub to_block: Option<BlockBound>,

    /// Analyse the last N blocks instead of an explicit range
    #[arg(long, conflicts_with_all = ["from_block", "to_block"])]
    pub last_blocks: Option<u64>,

    /// RPC endpoint URL (overrides the config file)
    #[arg(short, long)]
    pub rpc_url: Option<String>,

    /// Path to a JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the network as JSON to this file
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Write the network as a Graphviz DOT file
    #[arg(long)]
    pub export_dot: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); a valid RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Effective configuration: file (or defaults) with flag overrides applied.
    pub fn collector_config(&self) -> Result<CollectorConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => CollectorConfig::default(),
        };
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(blocks) = self.last_blocks {
            config.default_last_blocks = blocks;
        }
        Ok(config)
    }

    /// Log filter: `env` (the `RUST_LOG` value) when it parses, `--log-level` otherwise.
    pub fn log_filter(&self, env: Option<&str>) -> EnvFilter {
        env.filter(|directives| !directives.trim().is_empty())
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(&self.log_level))
    }
}

/// Run the CLI command and print JSON output.
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.collector_config()?;
    info!("RPC URL: {}", config.rpc_url);

    let rpc = RpcClient::new(config.rpc_url.clone(), config.rpc_timeout())?;
    let collector = TraceCollector::new(CachedGateway::new(rpc), config)?;

    let network = collector
        .get_network(&cli.address, cli.from_block, cli.to_block)
        .await
        .context("Failed to collect dependency network")?;

    for dependency in network.dependencies() {
        info!("Dependency: {}", format_address(&dependency));
    }

    if let Some(path) = &cli.export_json {
        network.export_json(path)?;
        info!("Call graph exported to JSON file: {:?}", path);
    }
    if let Some(path) = &cli.export_dot {
        network.export_dot(path)?;
        info!("Call graph exported to DOT file: {:?}", path);
    }

    // Pretty print JSON
    println!("{}", network.to_json_pretty()?);
    Ok(())
}
