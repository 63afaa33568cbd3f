//! ECDSA signature operations using secp256k1

use crate::{keccak256, CryptoError, CryptoResult};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use std::cmp::Ordering;
use strata_primitives::{Address, H256};

/// Half of the secp256k1 curve order (n/2)
const SECP256K1_N_DIV_2: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D,
    0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Full secp256k1 curve order (n)
const SECP256K1_N: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B,
    0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Recoverable ECDSA signature.
///
/// The recovery id is kept raw (0 or 1); mapping it to a transaction `v`
/// value is the transaction codec's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// r component (32 bytes)
    pub r: [u8; 32],
    /// s component (32 bytes)
    pub s: [u8; 32],
    /// recovery id (0 or 1)
    pub recovery_id: u8,
}

/// Public key (65 bytes uncompressed, or 33 bytes compressed)
pub type PublicKey = VerifyingKey;

/// Private key (32 bytes)
pub type PrivateKey = SigningKey;

impl Signature {
    /// Create signature from r, s and recovery id
    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Signature { r, s, recovery_id }
    }

    /// Check if signature has low-s value (EIP-2)
    pub fn is_low_s(&self) -> bool {
        self.s.cmp(&SECP256K1_N_DIV_2) != Ordering::Greater
    }

    /// Check that `r` and `s` lie in `[1, n)`
    pub fn has_valid_components(&self) -> bool {
        let in_range = |x: &[u8; 32]| *x != [0u8; 32] && x.cmp(&SECP256K1_N) == Ordering::Less;
        in_range(&self.r) && in_range(&self.s) && self.recovery_id <= 1
    }
}

/// n - s, used for s normalization
fn subtract_from_n(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: u16 = 0;

    for i in (0..32).rev() {
        let diff = (SECP256K1_N[i] as u16)
            .wrapping_sub(s[i] as u16)
            .wrapping_sub(borrow);
        result[i] = diff as u8;
        borrow = if diff > 255 { 1 } else { 0 };
    }

    result
}

/// Sign a message hash with a private key, normalizing to low-s
pub fn sign(message_hash: &H256, private_key: &PrivateKey) -> CryptoResult<Signature> {
    let (signature, mut recovery_id) = private_key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let r_bytes: [u8; 32] = signature.r().to_bytes().into();
    let mut s_bytes: [u8; 32] = signature.s().to_bytes().into();

    if s_bytes.cmp(&SECP256K1_N_DIV_2) == Ordering::Greater {
        s_bytes = subtract_from_n(&s_bytes);
        recovery_id = RecoveryId::try_from(recovery_id.to_byte() ^ 1)
            .map_err(|_| CryptoError::InvalidRecoveryId(recovery_id.to_byte() ^ 1))?;
    }

    Ok(Signature {
        r: r_bytes,
        s: s_bytes,
        recovery_id: recovery_id.to_byte(),
    })
}

/// Verify a low-s signature against a message hash and public key
pub fn verify(
    message_hash: &H256,
    signature: &Signature,
    public_key: &PublicKey,
) -> CryptoResult<bool> {
    if !signature.is_low_s() {
        return Ok(false);
    }

    let k256_sig = to_k256(signature)?;

    use k256::ecdsa::signature::hazmat::PrehashVerifier;
    Ok(public_key
        .verify_prehash(message_hash.as_bytes(), &k256_sig)
        .is_ok())
}

/// Recover public key from signature and message hash.
///
/// High-s signatures are accepted here; callers that must reject them check
/// [`Signature::is_low_s`] first.
pub fn recover_public_key(
    message_hash: &H256,
    signature: &Signature,
) -> CryptoResult<PublicKey> {
    if !signature.has_valid_components() {
        return Err(CryptoError::InvalidSignature("r or s out of range".into()));
    }
    let mut k256_sig = to_k256(signature)?;
    let mut recovery_byte = signature.recovery_id;
    // k256 only recovers from normalized signatures
    if let Some(normalized) = k256_sig.normalize_s() {
        k256_sig = normalized;
        recovery_byte ^= 1;
    }

    let recovery_id = RecoveryId::try_from(recovery_byte)
        .map_err(|_| CryptoError::InvalidRecoveryId(recovery_byte))?;

    VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &k256_sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Recover the signer's address from a signature and message hash
pub fn recover_address(message_hash: &H256, signature: &Signature) -> CryptoResult<Address> {
    recover_public_key(message_hash, signature).map(|key| public_key_to_address(&key))
}

/// Derive the account address of a public key
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    // Uncompressed point: 0x04 || x || y
    let encoded = public_key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_word(hash.as_bytes())
}

fn to_k256(signature: &Signature) -> CryptoResult<K256Signature> {
    let r: k256::FieldBytes = signature.r.into();
    let s: k256::FieldBytes = signature.s.into();
    K256Signature::from_scalars(r, s).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
}
