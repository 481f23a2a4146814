//! Dependency network collection
//!
//! Orchestrates one request end to end: validate the input, discover the
//! contract's transactions, trace them concurrently, fold the extracted
//! calls into one graph, drop non-contract targets, and assemble the result.
//!
//! Partial failure never aborts a request. A transaction that cannot be
//! traced is skipped, and when the request deadline passes the graph
//! aggregated so far is returned.

use crate::block::BlockBound;
use crate::config::CollectorConfig;
use crate::discover::discover;
use crate::error::CollectError;
use crate::filter::{ContractFilter, ContractVerdict};
use crate::gateway::ChainGateway;
use crate::graph::{CallGraph, ContractNetwork};
use crate::trace::{extract_subcalls, fetch_trace};
use crate::types::{format_address, TxHash};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

/// Share of the request deadline spent on discovery and tracing. The rest
/// is left for bytecode validation of whatever was collected.
const TRACE_PHASE_SHARE: f64 = 0.75;

fn deadline_reached(stage: &str) -> CollectError {
    CollectError::Upstream(anyhow::anyhow!("Deadline reached while {}", stage))
}

/// Builds contract dependency networks from historical traces.
pub struct TraceCollector<G> {
    gateway: G,
    config: CollectorConfig,
    null_implementation: Vec<u8>,
}

impl<G: ChainGateway> TraceCollector<G> {
    pub fn new(gateway: G, config: CollectorConfig) -> Result<Self> {
        config.validate().context("Invalid collector configuration")?;
        let null_implementation = config.null_implementation()?;
        Ok(Self {
            gateway,
            config,
            null_implementation,
        })
    }

    /// Dependency network of `contract` over `[from_block, to_block]`.
    ///
    /// When both bounds are `None` the last `default_last_blocks` blocks are
    /// used. The request is bounded by `request_timeout_secs`.
    pub async fn get_network(
        &self,
        contract: &str,
        from_block: Option<BlockBound>,
        to_block: Option<BlockBound>,
    ) -> Result<ContractNetwork, CollectError> {
        let deadline = Instant::now() + self.config.request_timeout();
        let (from_block, to_block) = timeout_at(deadline, self.resolve_range(from_block, to_block))
            .await
            .map_err(|_| deadline_reached("resolving the block range"))??;
        self.collect_until(contract, from_block, to_block, deadline).await
    }

    /// Turn optional bounds into a checked range.
    pub async fn resolve_range(
        &self,
        from_block: Option<BlockBound>,
        to_block: Option<BlockBound>,
    ) -> Result<(BlockBound, BlockBound), CollectError> {
        let (from_block, to_block) = match (from_block, to_block) {
            (Some(from), Some(to)) => (from, to),
            (None, None) => {
                info!("Collecting calls from the last {} blocks", self.config.default_last_blocks);
                let latest = self
                    .gateway
                    .latest_block_number()
                    .await
                    .map_err(CollectError::Upstream)?;
                let from = latest.saturating_sub(self.config.default_last_blocks);
                (BlockBound::new(from), BlockBound::new(latest))
            }
            _ => return Err(CollectError::PartialRange),
        };

        let requested = to_block.number().saturating_sub(from_block.number());
        if requested > self.config.max_block_range {
            return Err(CollectError::BlockRangeTooLarge {
                requested,
                max: self.config.max_block_range,
            });
        }

        Ok((from_block, to_block))
    }

    async fn collect_until(
        &self,
        contract: &str,
        from_block: BlockBound,
        to_block: BlockBound,
        deadline: Instant,
    ) -> Result<ContractNetwork, CollectError> {
        info!(
            "Getting calls from block {} to {} for contract {}",
            from_block, to_block, contract
        );
        let trace_deadline = Instant::now()
            + deadline
                .saturating_duration_since(Instant::now())
                .mul_f64(TRACE_PHASE_SHARE);

        let contract = timeout_at(deadline, self.validate_target(contract, to_block))
            .await
            .map_err(|_| deadline_reached("validating the target contract"))??;

        let discovered = timeout_at(
            trace_deadline,
            discover(&self.gateway, from_block, to_block, contract),
        )
        .await
        .unwrap_or_else(|_| Err(anyhow::anyhow!("Deadline reached during transaction discovery")));

        let tx_hashes = match discovered {
            Ok(hashes) => hashes,
            Err(e) if self.config.strict_discovery => return Err(CollectError::Upstream(e)),
            Err(e) => {
                error!("Error filtering transactions: {:#}", e);
                HashSet::new()
            }
        };

        let mut graph = self.collect_calls(&tx_hashes, contract, trace_deadline).await;
        self.filter_graph(&mut graph, to_block, deadline).await;

        let network =
            ContractNetwork::assemble(contract, from_block, to_block, graph, tx_hashes.len());
        info!(
            contract = %format_address(&contract),
            nodes = network.n_nodes,
            edges = network.edges.len(),
            transactions = network.n_matching_transactions,
            "Network assembled"
        );
        Ok(network)
    }

    /// The analysed contract must itself hold real code at `to_block`.
    async fn validate_target(&self, contract: &str, to_block: BlockBound) -> Result<Address, CollectError> {
        let filter = ContractFilter::new(&self.gateway, &self.null_implementation);
        match filter.validate(contract, to_block).await {
            (Some(address), verdict) if verdict.is_contract() => Ok(address),
            (_, ContractVerdict::Malformed) => Err(CollectError::InvalidAddress(contract.to_string())),
            (_, verdict) => Err(CollectError::NotAContract {
                address: contract.to_string(),
                block: to_block.number(),
                verdict,
            }),
        }
    }

    /// Trace every transaction and fold the calls made below `contract`.
    ///
    /// Traces run concurrently and are merged in completion order. Fetches
    /// still in flight at `deadline` are dropped.
    pub async fn collect_calls(
        &self,
        tx_hashes: &HashSet<TxHash>,
        contract: Address,
        deadline: Instant,
    ) -> CallGraph {
        info!("Getting calls for contract {}", format_address(&contract));

        let mut results = stream::iter(tx_hashes.iter().copied())
            .map(|tx_hash| async move {
                fetch_trace(&self.gateway, tx_hash)
                    .await
                    .map(|trace| extract_subcalls(&trace, contract))
            })
            .buffer_unordered(self.config.max_concurrent_traces);

        let mut graph = CallGraph::new();
        let mut traced = 0usize;
        let mut calls = 0usize;
        loop {
            match timeout_at(deadline, results.next()).await {
                Ok(Some(Some(records))) => {
                    traced += 1;
                    calls += records.len();
                    graph.add_records(&records);
                }
                Ok(Some(None)) => {}
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Deadline reached after tracing {} of {} transactions, keeping partial graph",
                        traced,
                        tx_hashes.len()
                    );
                    break;
                }
            }
        }

        info!("Extracted {} calls into {} edges from {} traces", calls, graph.len(), traced);
        graph
    }

    /// Drop every edge whose target is not a genuine contract at `block`.
    ///
    /// Targets whose lookup has not finished by `deadline` are dropped too.
    pub async fn filter_graph(&self, graph: &mut CallGraph, block: BlockBound, deadline: Instant) {
        let filter = ContractFilter::new(&self.gateway, &self.null_implementation);
        let filter = &filter;
        let targets = graph.targets();
        let total = targets.len();

        let mut checks = stream::iter(targets)
            .map(|address| async move { (address, filter.check(address, block).await) })
            .buffer_unordered(self.config.max_concurrent_code_lookups);

        let mut accepted: HashSet<Address> = HashSet::new();
        let mut checked = 0usize;
        loop {
            match timeout_at(deadline, checks.next()).await {
                Ok(Some((address, verdict))) => {
                    checked += 1;
                    if verdict.is_contract() {
                        accepted.insert(address);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Deadline reached after validating {} of {} addresses, rejecting the rest",
                        checked, total
                    );
                    break;
                }
            }
        }
        drop(checks);

        let before = graph.len();
        graph.retain_targets(|target| accepted.contains(target));
        info!(
            "Kept {} of {} target addresses, {} of {} edges",
            accepted.len(),
            total,
            graph.len(),
            before
        );
    }
}
