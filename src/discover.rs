//! Transaction discovery
//!
//! Turns a block range and a contract address into the set of transactions
//! in which the contract sent at least one message call.

use crate::block::BlockBound;
use crate::gateway::ChainGateway;
use crate::types::{format_address, TxHash};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::info;

/// Collect the hashes of transactions whose traces contain a `call` sent by
/// `contract` within `[from_block, to_block]`.
///
/// `Ok` with an empty set means the node reported no activity, including a
/// `null` result. An `Err` means the node could not answer at all; whether
/// that degrades to "no activity" is the caller's decision.
pub async fn discover<G: ChainGateway + ?Sized>(
    gateway: &G,
    from_block: BlockBound,
    to_block: BlockBound,
    contract: Address,
) -> Result<HashSet<TxHash>> {
    info!(
        "Filtering transactions from block {} to {} for contract {}",
        from_block,
        to_block,
        format_address(&contract)
    );

    let entries = gateway
        .filter_calls(&from_block.to_hex(), &to_block.to_hex(), contract)
        .await
        .context("trace_filter failed")?;

    let Some(entries) = entries else {
        info!("trace_filter returned no data");
        return Ok(HashSet::new());
    };

    let hashes: HashSet<TxHash> = entries
        .iter()
        .filter(|entry| entry.is_call())
        .filter_map(|entry| entry.transaction_hash)
        .collect();

    info!("Found {} transactions", hashes.len());
    Ok(hashes)
}
