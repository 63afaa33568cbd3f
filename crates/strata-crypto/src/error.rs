//! Signature and key errors

use thiserror::Error;

/// Errors from signing and recovery
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The signer rejected the message hash
    #[error("cannot sign message: {0}")]
    SigningFailed(String),

    /// `r` or `s` is zero or not below the curve order
    #[error("malformed signature: {0}")]
    InvalidSignature(String),

    /// Recovery id outside 0..=3
    #[error("recovery id {0} out of range")]
    InvalidRecoveryId(u8),

    /// No public key matches the signature
    #[error("cannot recover public key: {0}")]
    RecoveryFailed(String),
}

/// Result type for signature operations
pub type CryptoResult<T> = Result<T, CryptoError>;
