//! Chain access seam
//!
//! The collector only needs four capabilities from a node. Keeping them
//! behind a trait lets the pipeline run against the JSON-RPC client, a
//! caching wrapper, or an in-memory fake in tests.

use crate::types::{CallFrame, TraceFilterEntry, TxHash};
use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// `trace_filter` over `[from_block, to_block]` for calls sent by `from_address`.
    ///
    /// Block params are canonical hex strings. `Ok(None)` means the node
    /// returned no usable data.
    async fn filter_calls(
        &self,
        from_block: &str,
        to_block: &str,
        from_address: Address,
    ) -> Result<Option<Vec<TraceFilterEntry>>>;

    /// Full nested `callTracer` tree for a transaction.
    async fn trace_transaction(&self, tx_hash: TxHash) -> Result<Option<CallFrame>>;

    /// Deployed bytecode at `block` (canonical hex). Empty for EOAs.
    async fn get_code(&self, address: Address, block: &str) -> Result<Vec<u8>>;

    /// Current chain head.
    async fn latest_block_number(&self) -> Result<u64>;
}
