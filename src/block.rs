//! Block bound parsing
//!
//! Block numbers arrive as native integers, decimal strings, or
//! `0x`-prefixed hex strings. They are normalized to a `u64` height, which
//! renders as canonical hex for RPC params and as an integer for output.

use crate::error::CollectError;
use std::fmt;
use std::str::FromStr;

/// A chain height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockBound(u64);

impl BlockBound {
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u64 {
        self.0
    }

    /// Canonical hex form used in RPC params, e.g. `0xf4240`.
    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl From<u64> for BlockBound {
    fn from(number: u64) -> Self {
        Self(number)
    }
}

impl FromStr for BlockBound {
    type Err = CollectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CollectError::InvalidBlock(s.to_string());

        if let Some(digits) = s.strip_prefix("0x") {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            return u64::from_str_radix(digits, 16).map(Self).map_err(|_| invalid());
        }

        // The std parsers also accept a leading '+'.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        s.parse::<u64>().map(Self).map_err(|_| invalid())
    }
}

impl fmt::Display for BlockBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_and_hex_resolve_identically() {
        let dec: BlockBound = "1000000".parse().unwrap();
        let hex: BlockBound = "0xf4240".parse().unwrap();
        assert_eq!(dec, hex);
        assert_eq!(dec.to_hex(), "0xf4240");
        assert_eq!(hex.number(), 1_000_000);
    }

    #[test]
    fn test_native_integer() {
        let block = BlockBound::from(255u64);
        assert_eq!(block.to_hex(), "0xff");
        assert_eq!(block.to_string(), "255");
    }

    #[test]
    fn test_uppercase_hex_digits() {
        let block: BlockBound = "0xABC".parse().unwrap();
        assert_eq!(block.number(), 0xabc);
    }

    #[test]
    fn test_rejects_other_forms() {
        for bad in ["", "0x", "latest", "-1", "+5", "12a", "0xzz", "1.5", " 10"] {
            assert!(
                matches!(bad.parse::<BlockBound>(), Err(CollectError::InvalidBlock(_))),
                "accepted {:?}",
                bad
            );
        }
    }
}
