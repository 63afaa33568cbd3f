//! Trie errors

use strata_primitives::H256;
use thiserror::Error;

/// Trie error
#[derive(Debug, Error)]
pub enum TrieError {
    /// A referenced node is not in the node store
    #[error("missing trie node {0}")]
    MissingNode(H256),

    /// Stored node bytes are not valid RLP
    #[error("rlp decoding failed: {0}")]
    Decode(#[from] rlp::DecoderError),

    /// Stored node has an impossible shape
    #[error("invalid trie node: {0}")]
    InvalidNode(String),

    /// Node store backend failure
    #[error("node store error: {0}")]
    Backend(String),
}

/// Result type for trie operations
pub type TrieResult<T> = Result<T, TrieError>;
