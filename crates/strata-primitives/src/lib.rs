//! # strata-primitives
//!
//! Primitive types shared by every Strata crate: addresses, 256-bit hashes
//! and the `U256` integer used for balances and values.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{HashError, H256};

// Re-export primitive-types for U256
pub use primitive_types::U256;

/// Block number type
pub type BlockNumber = u64;

/// Gas amount type
pub type Gas = u64;

/// Parse a `U256` from a `0x`-prefixed hex or a decimal string.
///
/// An empty string parses as zero.
pub fn parse_u256(s: &str) -> Result<U256, PrimitiveError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(U256::zero());
    }
    let invalid = || PrimitiveError::InvalidInteger(s.to_string());
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some("") => Ok(U256::zero()),
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|_| invalid()),
        None => U256::from_dec_str(s).map_err(|_| invalid()),
    }
}
