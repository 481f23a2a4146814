//! depnet - contract dependency network builder
//!
//! Replays a contract's on-chain activity over a block range and prints the
//! graph of contracts it calls into.

use clap::Parser;
use depnet::cli::{self, Cli};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging. Logs go to stderr so stdout stays valid JSON.
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = cli.log_filter(rust_log.as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Handle Ctrl+C gracefully
    tokio::select! {
        result = cli::run(cli) => {
            if let Err(e) = result {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            std::process::exit(130);
        }
    }
}
