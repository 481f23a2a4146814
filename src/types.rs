//! Ethereum JSON-RPC types
//!
//! Type definitions for `trace_filter` entries and `callTracer` call trees,
//! plus the hex parsing helpers shared by the rest of the crate.

use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serializer};

/// Transaction hash as returned by the node.
pub type TxHash = B256;

/// One entry of a `trace_filter` response.
///
/// Only the fields the discoverer needs are kept. Reward and other
/// block-level entries carry no transaction hash, hence the `Option`.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceFilterEntry {
    /// Hash of the transaction this trace belongs to.
    #[serde(
        rename = "transactionHash",
        default,
        deserialize_with = "deserialize_tx_hash_opt"
    )]
    pub transaction_hash: Option<TxHash>,

    /// Trace entry type: `call`, `create`, `suicide`, `reward`, ...
    #[serde(rename = "type", default)]
    pub r#type: String,
}

impl TraceFilterEntry {
    /// Whether this entry describes a message call.
    pub fn is_call(&self) -> bool {
        self.r#type == "call"
    }
}

/// Call frame produced by `debug_traceTransaction` with `callTracer`.
///
/// Addresses are kept as the raw strings the tracer returned. They are
/// normalized (and rejected when malformed) while the tree is walked, so a
/// single odd frame never invalidates the whole trace.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallFrame {
    /// Call type: CALL / STATICCALL / DELEGATECALL / CREATE / CREATE2 / ...
    #[serde(rename = "type", default)]
    pub r#type: Option<String>,

    /// Sender address.
    #[serde(default)]
    pub from: Option<String>,

    /// Recipient address (may be absent for failed CREATE-like frames).
    #[serde(default)]
    pub to: Option<String>,

    /// Nested child calls.
    #[serde(default)]
    pub calls: Option<Vec<CallFrame>>,
}

impl CallFrame {
    /// Child frames, empty when the tracer omitted `calls`.
    pub fn children(&self) -> &[CallFrame] {
        self.calls.as_deref().unwrap_or(&[])
    }

    /// Call type as reported by the tracer, or an empty string.
    pub fn call_type(&self) -> &str {
        self.r#type.as_deref().unwrap_or("")
    }
}

// Hex helpers

/// Pad an odd-length hex string with a leading zero.
/// This handles cases where RPC returns hex strings without leading zeros.
pub(crate) fn pad_hex_string(s: &str) -> String {
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

/// Decode a hex string (with or without 0x prefix) into bytes.
///
/// `"0x"` and `""` decode to an empty buffer.
pub fn decode_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(pad_hex_string(s)).with_context(|| format!("Invalid hex data: {}", s))
}

/// Parse an address from a hex string.
///
/// Accepts addresses with or without 0x prefix, in any letter case.
pub fn parse_address(s: &str) -> Result<Address> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if s.len() != 40 {
        anyhow::bail!("Address must be 40 hex chars, got {}", s.len());
    }
    let bytes = hex::decode(s).with_context(|| format!("Invalid hex address: {}", s))?;
    Ok(Address::from_slice(&bytes))
}

/// Parse a 32-byte hash from a hex string.
pub fn parse_hash(s: &str) -> Result<B256> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(pad_hex_string(s))
        .with_context(|| format!("Invalid hex hash: {}", s))?;
    if bytes.len() != 32 {
        anyhow::bail!("Hash must be 32 bytes (64 hex chars), got {} bytes", bytes.len());
    }
    Ok(B256::from_slice(&bytes))
}

/// Canonical textual form of an address: `0x`-prefixed lowercase hex.
pub fn format_address(addr: &Address) -> String {
    format!("0x{:x}", addr)
}

/// Serialize an address in its canonical lowercase form.
pub(crate) fn serialize_address<S>(addr: &Address, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_address(addr))
}

/// Transaction hashes show up either as hex strings or, from some client
/// libraries, as raw byte arrays.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTxHash {
    Hex(String),
    Bytes(Vec<u8>),
}

/// Deserialize an optional transaction hash from a hex string or byte array.
fn deserialize_tx_hash_opt<'de, D>(deserializer: D) -> Result<Option<TxHash>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTxHash>::deserialize(deserializer)? {
        Some(RawTxHash::Hex(s)) => parse_hash(&s).map(Some).map_err(serde::de::Error::custom),
        Some(RawTxHash::Bytes(bytes)) => {
            if bytes.len() != 32 {
                return Err(serde::de::Error::custom(format!(
                    "Expected 32 bytes for hash, got {}",
                    bytes.len()
                )));
            }
            Ok(Some(B256::from_slice(&bytes)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";

    #[test]
    fn test_parse_address_case_insensitive() {
        let lower = parse_address("0xdac17f958d2ee523a2206206994597c13d831ec7").unwrap();
        let mixed = parse_address("0xdAC17F958D2ee523a2206206994597C13D831ec7").unwrap();
        let bare = parse_address("dAC17F958D2ee523a2206206994597C13D831ec7").unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(lower, bare);
        assert_eq!(format_address(&mixed), "0xdac17f958d2ee523a2206206994597c13d831ec7");
    }

    #[test]
    fn test_parse_address_rejects_malformed() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xzz17f958d2ee523a2206206994597c13d831ec7").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_trace_filter_entry_hex_hash() {
        let entry: TraceFilterEntry =
            serde_json::from_value(json!({ "transactionHash": HASH, "type": "call" })).unwrap();
        assert!(entry.is_call());
        assert_eq!(entry.transaction_hash, Some(parse_hash(HASH).unwrap()));
    }

    #[test]
    fn test_trace_filter_entry_byte_hash() {
        let bytes: Vec<u8> = hex::decode(&HASH[2..]).unwrap();
        let entry: TraceFilterEntry =
            serde_json::from_value(json!({ "transactionHash": bytes, "type": "call" })).unwrap();
        assert_eq!(entry.transaction_hash, Some(parse_hash(HASH).unwrap()));
    }

    #[test]
    fn test_trace_filter_reward_entry() {
        let entry: TraceFilterEntry =
            serde_json::from_value(json!({ "transactionHash": null, "type": "reward" })).unwrap();
        assert!(!entry.is_call());
        assert!(entry.transaction_hash.is_none());
    }

    #[test]
    fn test_call_frame_missing_fields() {
        let frame: CallFrame = serde_json::from_value(json!({
            "type": "CALL",
            "from": "0x0000000000000000000000000000000000000aaa",
            "to": "0x0000000000000000000000000000000000000bbb"
        }))
        .unwrap();
        assert!(frame.children().is_empty());
        assert_eq!(frame.call_type(), "CALL");
    }

    #[test]
    fn test_decode_hex_bytes() {
        assert!(decode_hex_bytes("0x").unwrap().is_empty());
        assert_eq!(decode_hex_bytes("0x6001").unwrap(), vec![0x60, 0x01]);
        assert_eq!(decode_hex_bytes("0xf").unwrap(), vec![0x0f]);
    }
}
