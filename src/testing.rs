//! In-memory chain fake used by unit tests.

use crate::gateway::ChainGateway;
use crate::types::{format_address, CallFrame, TraceFilterEntry, TxHash};
use alloy_primitives::{Address, B256};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Runtime bytecode of a trivial contract (`PUSH1 0 PUSH1 0 RETURN`).
pub const SOME_CODE: &[u8] = &[0x60, 0x00, 0x60, 0x00, 0xf3];

/// Build an address whose low 8 bytes hold `n`.
pub fn addr(n: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xc0;
    bytes[12..].copy_from_slice(&n.to_be_bytes());
    Address::from_slice(&bytes)
}

/// Build a transaction hash whose low 8 bytes hold `n`.
pub fn tx(n: u64) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    B256::from_slice(&bytes)
}

/// Helper to build a call frame.
pub fn frame(call_type: &str, from: Address, to: Address, calls: Vec<CallFrame>) -> CallFrame {
    CallFrame {
        r#type: Some(call_type.to_string()),
        from: Some(format_address(&from)),
        to: Some(format_address(&to)),
        calls: if calls.is_empty() { None } else { Some(calls) },
    }
}

pub fn call_entry(hash: TxHash) -> TraceFilterEntry {
    TraceFilterEntry { transaction_hash: Some(hash), r#type: "call".to_string() }
}

#[derive(Default)]
pub struct MockGateway {
    pub entries: Option<Vec<TraceFilterEntry>>,
    pub filter_fails: bool,
    pub traces: HashMap<TxHash, CallFrame>,
    pub failing_traces: HashSet<TxHash>,
    pub trace_delays: HashMap<TxHash, Duration>,
    pub code_at: HashMap<(Address, String), Vec<u8>>,
    pub code_any: HashMap<Address, Vec<u8>>,
    pub failing_code: HashSet<Address>,
    pub code_delays: HashMap<Address, Duration>,
    pub latest: u64,
    pub latest_fails: bool,
    pub latest_delay: Option<Duration>,
    pub code_calls: AtomicUsize,
    pub trace_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self { entries: Some(Vec::new()), ..Default::default() }
    }

    pub fn with_tx(mut self, hash: TxHash, trace: CallFrame) -> Self {
        self.entries.get_or_insert_with(Vec::new).push(call_entry(hash));
        self.traces.insert(hash, trace);
        self
    }

    /// Give `address` non-empty code at every block.
    pub fn with_contract(mut self, address: Address) -> Self {
        self.code_any.insert(address, SOME_CODE.to_vec());
        self
    }

    pub fn with_code_at(mut self, address: Address, block: &str, code: Vec<u8>) -> Self {
        self.code_at.insert((address, block.to_string()), code);
        self
    }

    pub fn code_calls(&self) -> usize {
        self.code_calls.load(Ordering::SeqCst)
    }

    pub fn trace_calls(&self) -> usize {
        self.trace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn filter_calls(
        &self,
        _from_block: &str,
        _to_block: &str,
        _from_address: Address,
    ) -> Result<Option<Vec<TraceFilterEntry>>> {
        if self.filter_fails {
            anyhow::bail!("trace_filter unavailable");
        }
        Ok(self.entries.clone())
    }

    async fn trace_transaction(&self, tx_hash: TxHash) -> Result<Option<CallFrame>> {
        self.trace_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.trace_delays.get(&tx_hash) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_traces.contains(&tx_hash) {
            anyhow::bail!("trace failed for 0x{:x}", tx_hash);
        }
        Ok(self.traces.get(&tx_hash).cloned())
    }

    async fn get_code(&self, address: Address, block: &str) -> Result<Vec<u8>> {
        self.code_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.code_delays.get(&address) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_code.contains(&address) {
            anyhow::bail!("eth_getCode failed for {}", format_address(&address));
        }
        if let Some(code) = self.code_at.get(&(address, block.to_string())) {
            return Ok(code.clone());
        }
        Ok(self.code_any.get(&address).cloned().unwrap_or_default())
    }

    async fn latest_block_number(&self) -> Result<u64> {
        if let Some(delay) = self.latest_delay {
            tokio::time::sleep(delay).await;
        }
        if self.latest_fails {
            anyhow::bail!("eth_blockNumber unavailable");
        }
        Ok(self.latest)
    }
}
