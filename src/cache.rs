//! Bytecode lookup cache
//!
//! In-memory cache in front of a gateway to avoid repeated `eth_getCode`
//! calls for the same address at the same block.
//!
//! Strategy:
//! - Lookups are pinned to a block, so both empty and non-empty results are
//!   immutable and cached forever.
//! - Failed lookups are not cached.
//! - Traces and trace filters pass straight through.

use crate::gateway::ChainGateway;
use crate::types::{format_address, CallFrame, TraceFilterEntry, TxHash};
use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Gateway wrapper memoizing bytecode per `(address, block)`.
pub struct CachedGateway<G> {
    inner: G,
    code: Mutex<HashMap<(Address, String), Vec<u8>>>,
}

impl<G> CachedGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            code: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached bytecode entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Address, String), Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.code.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<G: ChainGateway> ChainGateway for CachedGateway<G> {
    async fn filter_calls(
        &self,
        from_block: &str,
        to_block: &str,
        from_address: Address,
    ) -> Result<Option<Vec<TraceFilterEntry>>> {
        self.inner.filter_calls(from_block, to_block, from_address).await
    }

    async fn trace_transaction(&self, tx_hash: TxHash) -> Result<Option<CallFrame>> {
        self.inner.trace_transaction(tx_hash).await
    }

    async fn get_code(&self, address: Address, block: &str) -> Result<Vec<u8>> {
        let key = (address, block.to_string());
        let hit = self.lock().get(&key).cloned();
        if let Some(code) = hit {
            tracing::trace!(address = %format_address(&address), block, "bytecode cache hit");
            return Ok(code);
        }

        let code = self.inner.get_code(address, block).await?;
        self.lock().insert(key, code.clone());
        Ok(code)
    }

    async fn latest_block_number(&self) -> Result<u64> {
        self.inner.latest_block_number().await
    }
}
