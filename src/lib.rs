//! depnet - contract dependency networks from historical call traces
//!
//! Given a contract address and a block range, this library discovers the
//! transactions in which the contract made calls, traces each of them,
//! extracts the calls made below the contract, and aggregates them into a
//! deduplicated multigraph of contract-to-contract calls. Edges pointing at
//! precompiles, EOAs, or placeholder code are filtered out against on-chain
//! bytecode.

pub mod block;
pub mod cache;
pub mod cli;
pub mod collector;
pub mod config;
pub mod discover;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod graph;
pub mod rpc;
pub mod trace;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the main types for convenience
pub use block::BlockBound;
pub use collector::TraceCollector;
pub use config::CollectorConfig;
pub use error::CollectError;
pub use filter::ContractVerdict;
pub use gateway::ChainGateway;
pub use graph::{CallGraph, ContractNetwork, Edge};
pub use trace::CallRecord;
