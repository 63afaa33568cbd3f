//! Transaction codec errors

use strata_crypto::CryptoError;
use thiserror::Error;

/// Errors from decoding or authenticating a transaction
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transaction carries no signature
    #[error("transaction is not signed")]
    MissingSignature,

    /// `v` is neither 27/28 nor an EIP-155 value
    #[error("invalid signature v value: {0}")]
    InvalidV(u64),

    /// Signature recovery failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Malformed RLP
    #[error("rlp decode error: {0}")]
    Decode(#[from] rlp::DecoderError),
}

/// Result type for transaction operations
pub type TransactionResult<T> = Result<T, TransactionError>;
