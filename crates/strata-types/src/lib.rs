//! # strata-types
//!
//! Core chain types for Strata.
//!
//! This crate provides:
//! - [`Transaction`] - Signed transactions with EIP-155 signing and RLP codec
//! - [`Block`] - Block with header and transactions
//! - [`Receipt`] - Transaction execution receipts and logs

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod error;
pub mod receipt;
pub mod transaction;

// Re-export commonly used types
pub use block::{Block, BlockHeader, Bloom};
pub use error::{TransactionError, TransactionResult};
pub use receipt::{Log, Receipt, TxStatus};
pub use transaction::{Transaction, TxSignature};
