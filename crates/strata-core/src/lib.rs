//! # strata-core
//!
//! Transaction and block execution for Strata.
//!
//! This crate ties the interpreter to the state:
//! - [`TransactionExecutor`]: validation, up-front charge, execution and
//!   settlement of one transaction
//! - [`BlockExecutor`]: ordered application of a block's transactions
//!   under the [`ProtocolSchedule`](strata_evm::ProtocolSchedule)
//! - [`ChainState`]: the committed head shared between readers and one writer
//! - [`ChainConfig`]: chain id, fork activations and genesis allocations

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod chain;
pub mod config;
pub mod error;
pub mod executor;

pub use block::{receipts_root, BlockExecutionResult, BlockExecutor};
pub use chain::ChainState;
pub use config::{ChainConfig, GenesisAccount, GenesisConfig};
pub use error::{
    ConfigError, ConfigResult, ExecutionError, ExecutionResult, ValidationError,
};
pub use executor::{Phase, TransactionExecutor, TransactionResult};
