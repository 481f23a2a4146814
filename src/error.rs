//! Errors surfaced to callers of the collector.

use crate::filter::ContractVerdict;

/// Failure of a network collection request.
///
/// Everything except `Upstream` is an input validation failure and is never
/// worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Block number must be decimal or 0x-prefixed hexadecimal: {0:?}")]
    InvalidBlock(String),

    #[error("Invalid contract address: {0:?}")]
    InvalidAddress(String),

    #[error("Block range of {requested} blocks exceeds maximum limit of {max} blocks")]
    BlockRangeTooLarge { requested: u64, max: u64 },

    #[error("Either both from and to block must be given, or neither")]
    PartialRange,

    #[error("{address} is not a contract at block {block}: {verdict}")]
    NotAContract {
        address: String,
        block: u64,
        verdict: ContractVerdict,
    },

    #[error("Upstream RPC failure: {0:#}")]
    Upstream(anyhow::Error),
}

impl CollectError {
    /// Whether this error was caused by the request itself rather than the node.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, CollectError::Upstream(_))
    }
}
