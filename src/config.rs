//! Collector configuration
//!
//! All knobs of a collection run live in one explicit struct that is handed
//! to the collector. It can be loaded from a JSON file; every field has a
//! default, so a partial file (or none at all) is fine.
//!
//! # Example file format:
//! ```json
//! {
//!   "rpc_url": "http://127.0.0.1:8545",
//!   "max_block_range": 7000,
//!   "max_concurrent_traces": 16
//! }
//! ```

use crate::types::decode_hex_bytes;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    /// JSON-RPC endpoint with `trace_*` and `debug_*` namespaces enabled.
    pub rpc_url: String,
    /// Timeout of a single RPC request.
    pub rpc_timeout_secs: u64,
    /// Deadline for a whole collection request.
    pub request_timeout_secs: u64,
    /// Largest accepted `to_block - from_block`.
    pub max_block_range: u64,
    /// Range size used when no bounds are given.
    pub default_last_blocks: u64,
    /// Concurrent `debug_traceTransaction` calls.
    pub max_concurrent_traces: usize,
    /// Concurrent `eth_getCode` calls.
    pub max_concurrent_code_lookups: usize,
    /// Runtime code of an uninitialized proxy implementation (hex).
    /// Empty disables the check.
    pub null_implementation_code: String,
    /// Fail the request when transaction discovery fails instead of
    /// treating it as "no transactions".
    pub strict_discovery: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            rpc_timeout_secs: 30,
            request_timeout_secs: 120,
            max_block_range: 7000,
            default_last_blocks: 10,
            max_concurrent_traces: 8,
            max_concurrent_code_lookups: 8,
            null_implementation_code: "0x00".to_string(),
            strict_discovery: false,
        }
    }
}

impl CollectorConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Decoded null implementation bytecode.
    pub fn null_implementation(&self) -> Result<Vec<u8>> {
        decode_hex_bytes(&self.null_implementation_code)
            .context("Invalid null_implementation_code")
    }

    /// Reject values the collector cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_traces == 0 || self.max_concurrent_code_lookups == 0 {
            anyhow::bail!("Concurrency limits must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        self.null_implementation()?;
        Ok(())
    }
}

/// Load a configuration file.
pub fn load_config(path: &Path) -> Result<CollectorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: CollectorConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config.validate()?;
    Ok(config)
}
