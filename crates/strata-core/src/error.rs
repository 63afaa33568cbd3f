//! Transaction, block and configuration error types

use strata_evm::EvmError;
use strata_primitives::{H256, U256};
use strata_state::StateError;
use strata_types::TransactionError;
use thiserror::Error;

/// Reasons a transaction is rejected before any state mutation
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Unsigned transaction without an explicit sender
    #[error("transaction is not signed")]
    MissingSignature,

    /// Signature does not recover a sender
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] TransactionError),

    /// `s` above half the curve order once Homestead is active
    #[error("signature s value is not in the lower half of the curve order")]
    HighS,

    /// Chain-bound transaction before replay protection is active
    #[error("replay-protected transactions are not accepted yet")]
    ReplayProtectionInactive,

    /// Transaction bound to another chain
    #[error("chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch {
        /// Chain id of this chain
        expected: u64,
        /// Chain id in the transaction
        got: u64,
    },

    /// Nonce mismatch
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch {
        /// Account nonce
        expected: u64,
        /// Transaction nonce
        got: u64,
    },

    /// Sender nonce cannot be incremented
    #[error("sender nonce is at its maximum")]
    NonceOverflow,

    /// Gas limit below the intrinsic cost
    #[error("intrinsic gas too low: required {required}, limit {limit}")]
    IntrinsicGas {
        /// Intrinsic cost
        required: u64,
        /// Transaction gas limit
        limit: u64,
    },

    /// Gas limit above what the block has left
    #[error("block gas limit exceeded: requested {requested}, remaining {remaining}")]
    BlockGasExceeded {
        /// Transaction gas limit
        requested: u64,
        /// Gas left in the block
        remaining: u64,
    },

    /// Balance cannot cover `value + gas_limit * gas_price`
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Up-front cost
        required: U256,
        /// Sender balance
        available: U256,
    },

    /// Up-front cost overflows 256 bits
    #[error("transaction cost overflows")]
    CostOverflow,
}

/// Transaction and block execution errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Transaction rejected before execution
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Fatal interpreter error; the transaction's execution is discarded
    #[error("fatal execution error: {0}")]
    Fatal(EvmError),

    /// State backend failure
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Transaction phase called out of order
    #[error("transaction executor is in phase {actual:?}, expected {expected:?}")]
    Phase {
        /// Phase required by the call
        expected: crate::executor::Phase,
        /// Current phase
        actual: crate::executor::Phase,
    },

    /// A transaction of the block was rejected
    #[error("transaction {index} of block {number} rejected: {source}")]
    BlockRejected {
        /// Block number
        number: u64,
        /// Transaction index in the block
        index: usize,
        /// Rejection reason
        #[source]
        source: Box<ExecutionError>,
    },

    /// Block does not extend the current head
    #[error("block {number} does not extend head {head} ({head_hash})")]
    NotChild {
        /// Number of the offered block
        number: u64,
        /// Current head number
        head: u64,
        /// Current head hash
        head_hash: H256,
    },

    /// Invalid chain configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EvmError> for ExecutionError {
    fn from(error: EvmError) -> Self {
        match error {
            EvmError::State(e) => ExecutionError::State(e),
            other => ExecutionError::Fatal(other),
        }
    }
}

/// Result type for execution operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Chain configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed JSON
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Unreadable file
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Upgrades activate out of order
    #[error("fork activations are out of order")]
    UnorderedForks,

    /// Zero chain id
    #[error("chain id must be non-zero")]
    ZeroChainId,

    /// Bad genesis allocation
    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
