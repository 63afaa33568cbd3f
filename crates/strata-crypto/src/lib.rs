//! # strata-crypto
//!
//! Cryptographic primitives for the Strata execution engine.
//!
//! - Keccak-256, SHA-256 and RIPEMD-160 hashing
//! - ECDSA signing/verification (secp256k1)
//! - Public key and address recovery

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod signature;

pub use error::{CryptoError, CryptoResult};
pub use hash::{keccak256, ripemd160, sha256, KECCAK_EMPTY};
pub use signature::{
    public_key_to_address, recover_address, recover_public_key, sign, verify, PrivateKey,
    PublicKey, Signature,
};
