//! State error types

use strata_primitives::{Address, H256, U256};
use strata_trie::TrieError;
use thiserror::Error;

/// State repository errors
#[derive(Debug, Error)]
pub enum StateError {
    /// Trie or node store failure
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),

    /// A debit would drive a balance below zero
    #[error("insufficient balance for {address}: required {required}, available {available}")]
    InsufficientBalance {
        /// Debited account
        address: Address,
        /// Amount requested
        required: U256,
        /// Balance held
        available: U256,
    },

    /// Nonce would overflow u64
    #[error("nonce overflow for {0}")]
    NonceOverflow(Address),

    /// Stored account record could not be decoded
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Code referenced by an account is missing from the code store
    #[error("missing code {0}")]
    MissingCode(H256),

    /// RocksDB error
    #[cfg(feature = "rocksdb")]
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;
