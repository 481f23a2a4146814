//! Contract validation against on-chain bytecode
//!
//! An address only stays in the graph when it can be shown to hold real
//! contract code at the query block. Anything that cannot be proven,
//! including failed lookups, is rejected.

use crate::block::BlockBound;
use crate::gateway::ChainGateway;
use crate::types::{format_address, parse_address};
use alloy_primitives::Address;
use std::fmt;
use tracing::{debug, info, warn};

/// Outcome of validating one address. Only `Contract` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractVerdict {
    Contract,
    Precompile,
    Malformed,
    NoCode,
    NullImplementation,
    LookupFailed,
}

impl ContractVerdict {
    pub fn is_contract(&self) -> bool {
        matches!(self, ContractVerdict::Contract)
    }
}

impl fmt::Display for ContractVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ContractVerdict::Contract => "contract",
            ContractVerdict::Precompile => "precompile address",
            ContractVerdict::Malformed => "malformed address",
            ContractVerdict::NoCode => "no code",
            ContractVerdict::NullImplementation => "null implementation bytecode",
            ContractVerdict::LookupFailed => "bytecode lookup failed",
        };
        f.write_str(reason)
    }
}

/// Reserved low addresses `0x00..00` through `0x00..0f`.
pub fn is_precompile(address: &Address) -> bool {
    let bytes = address.as_slice();
    bytes[..19].iter().all(|b| *b == 0) && bytes[19] <= 0x0f
}

/// Bytecode checks shared by every address of one request.
pub struct ContractFilter<'a, G: ?Sized> {
    gateway: &'a G,
    null_implementation: &'a [u8],
}

impl<'a, G: ChainGateway + ?Sized> ContractFilter<'a, G> {
    /// `null_implementation` is the placeholder runtime code that marks an
    /// uninitialized proxy implementation. An empty slice disables the check.
    pub fn new(gateway: &'a G, null_implementation: &'a [u8]) -> Self {
        Self { gateway, null_implementation }
    }

    /// Validate a user-supplied address string.
    pub async fn validate(&self, address: &str, block: BlockBound) -> (Option<Address>, ContractVerdict) {
        let trimmed = address.trim().to_ascii_lowercase();
        if trimmed.len() == 42 && trimmed.starts_with(&format!("0x{}", "0".repeat(39))) {
            info!(address = %trimmed, "Address is a precompile address");
            return (None, ContractVerdict::Precompile);
        }

        match parse_address(&trimmed) {
            Ok(parsed) => (Some(parsed), self.check(parsed, block).await),
            Err(e) => {
                warn!(address = %address, "Invalid contract address format: {:#}", e);
                (None, ContractVerdict::Malformed)
            }
        }
    }

    /// Validate an already-normalized address. First matching rule wins.
    pub async fn check(&self, address: Address, block: BlockBound) -> ContractVerdict {
        let shown = format_address(&address);

        if is_precompile(&address) {
            debug!(address = %shown, "Address is a precompile address");
            return ContractVerdict::Precompile;
        }

        let code = match self.gateway.get_code(address, &block.to_hex()).await {
            Ok(code) => code,
            Err(e) => {
                warn!(address = %shown, block = block.number(), "Error validating contract: {:#}", e);
                return ContractVerdict::LookupFailed;
            }
        };

        if code.is_empty() {
            debug!(address = %shown, block = block.number(), "No code at address");
            return ContractVerdict::NoCode;
        }

        if !self.null_implementation.is_empty() && code == self.null_implementation {
            info!(address = %shown, "Contract matches null implementation bytecode");
            return ContractVerdict::NullImplementation;
        }

        ContractVerdict::Contract
    }
}
