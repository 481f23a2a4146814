//! JSON-RPC client for Ethereum nodes
//!
//! Provides a typed interface to the tracing and state endpoints the
//! collector needs. Handles hex string parsing and error handling.
//!
//! Responses are parsed without serde_json's nesting limit. A `callTracer`
//! tree takes two JSON levels per call frame, so the default limit of 128
//! would drop any trace nested deeper than about 63 calls. Deep documents
//! are parsed on a growing stack instead.

use crate::gateway::ChainGateway;
use crate::types::{decode_hex_bytes, format_address, CallFrame, TraceFilterEntry, TxHash};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

/// JSON-RPC client for Ethereum nodes.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    /// Create a new RPC client with a per-request timeout.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }

    /// Make a JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {} response", method))?;
        let mut json = parse_json(&body).with_context(|| format!("Failed to parse {} response", method))?;

        // Check for RPC error
        if let Some(error) = json.get("error") {
            anyhow::bail!("RPC error from {}: {}", method, error);
        }

        // Extract result
        json.get_mut("result")
            .map(Value::take)
            .with_context(|| format!("{} response missing 'result' field", method))
    }
}

/// Parse a JSON document of any nesting depth.
fn parse_json(body: &[u8]) -> serde_json::Result<Value> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    deserializer.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(value)
}

/// Decode a `trace_filter` result entry by entry.
///
/// An entry that does not decode is logged and skipped so the rest of the
/// response is still used.
fn parse_filter_entries(result: Value) -> Result<Option<Vec<TraceFilterEntry>>> {
    let raw = match result {
        Value::Null => return Ok(None),
        Value::Array(raw) => raw,
        other => anyhow::bail!("trace_filter result is not an array: {}", other),
    };

    let total = raw.len();
    let entries: Vec<TraceFilterEntry> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(index, "Skipping undecodable trace_filter entry: {}", e);
                None
            }
        })
        .collect();

    if entries.len() < total {
        warn!("Decoded {} of {} trace_filter entries", entries.len(), total);
    }
    Ok(Some(entries))
}

#[async_trait]
impl ChainGateway for RpcClient {
    async fn filter_calls(
        &self,
        from_block: &str,
        to_block: &str,
        from_address: Address,
    ) -> Result<Option<Vec<TraceFilterEntry>>> {
        let params = json!([{
            "fromBlock": from_block,
            "toBlock": to_block,
            "fromAddress": [format_address(&from_address)],
        }]);
        let result = self.call("trace_filter", params).await?;
        parse_filter_entries(result)
    }

    async fn trace_transaction(&self, tx_hash: TxHash) -> Result<Option<CallFrame>> {
        let hash_str = format!("0x{:x}", tx_hash);
        let params = json!([hash_str, { "tracer": "callTracer" }]);
        let result = self.call("debug_traceTransaction", params).await?;
        if result.is_null() {
            return Ok(None);
        }
        CallFrame::deserialize(serde_stacker::Deserializer::new(result))
            .map(Some)
            .context("Failed to deserialize call trace")
    }

    /// Returns empty Vec for EOA addresses, contract bytecode for contracts.
    async fn get_code(&self, address: Address, block: &str) -> Result<Vec<u8>> {
        let params = json!([format_address(&address), block]);
        let result = self.call("eth_getCode", params).await?;

        let code_str = result.as_str().context("Code response is not a string")?;
        decode_hex_bytes(code_str).context("Failed to decode code hex")
    }

    async fn latest_block_number(&self) -> Result<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let number_str = result
            .as_str()
            .context("Block number response is not a string")?;

        let number_str = number_str.strip_prefix("0x").unwrap_or(number_str);
        if number_str.is_empty() {
            anyhow::bail!("Block number is empty");
        }
        u64::from_str_radix(number_str, 16).context("Failed to parse block number")
    }
}
