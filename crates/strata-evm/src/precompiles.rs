//! Precompiled contracts at addresses 1 through 4

use strata_crypto::{recover_address, ripemd160, sha256, Signature};
use strata_primitives::{Address, H256};

/// Precompiled contracts available through Istanbul
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precompile {
    /// 0x01: secp256k1 public key recovery
    EcRecover,
    /// 0x02: SHA-256
    Sha256,
    /// 0x03: RIPEMD-160
    Ripemd160,
    /// 0x04: identity
    Identity,
}

fn words(len: usize) -> u64 {
    len.div_ceil(32) as u64
}

impl Precompile {
    /// Precompile living at `address`
    pub fn from_address(address: &Address) -> Option<Self> {
        let bytes = address.as_bytes();
        if bytes[..19].iter().any(|b| *b != 0) {
            return None;
        }
        match bytes[19] {
            1 => Some(Precompile::EcRecover),
            2 => Some(Precompile::Sha256),
            3 => Some(Precompile::Ripemd160),
            4 => Some(Precompile::Identity),
            _ => None,
        }
    }

    /// Address of this precompile
    pub fn address(self) -> Address {
        let index = match self {
            Precompile::EcRecover => 1,
            Precompile::Sha256 => 2,
            Precompile::Ripemd160 => 3,
            Precompile::Identity => 4,
        };
        Address::from_low_u64_be(index)
    }

    /// Gas for `input`
    pub fn cost(self, input: &[u8]) -> u64 {
        match self {
            Precompile::EcRecover => 3000,
            Precompile::Sha256 => 60 + 12 * words(input.len()),
            Precompile::Ripemd160 => 600 + 120 * words(input.len()),
            Precompile::Identity => 15 + 3 * words(input.len()),
        }
    }

    /// Output for `input`
    pub fn execute(self, input: &[u8]) -> Vec<u8> {
        match self {
            Precompile::EcRecover => ecrecover(input),
            Precompile::Sha256 => sha256(input).to_vec(),
            Precompile::Ripemd160 => {
                let mut out = vec![0u8; 32];
                out[12..].copy_from_slice(&ripemd160(input));
                out
            }
            Precompile::Identity => input.to_vec(),
        }
    }
}

/// Input is `hash ‖ v ‖ r ‖ s`, right-padded to 128 bytes. Any invalid
/// input yields empty output.
fn ecrecover(input: &[u8]) -> Vec<u8> {
    let mut padded = [0u8; 128];
    let len = input.len().min(128);
    padded[..len].copy_from_slice(&input[..len]);

    let v = &padded[32..64];
    if v[..31].iter().any(|b| *b != 0) || !(v[31] == 27 || v[31] == 28) {
        return Vec::new();
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&padded[..32]);
    let mut r = [0u8; 32];
    r.copy_from_slice(&padded[64..96]);
    let mut s = [0u8; 32];
    s.copy_from_slice(&padded[96..128]);

    let signature = Signature::new(r, s, v[31] - 27);
    if !signature.has_valid_components() {
        return Vec::new();
    }
    match recover_address(&H256::from_bytes(hash), &signature) {
        Ok(address) => address.to_word().to_vec(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_crypto::{keccak256, public_key_to_address, sign, PrivateKey};

    #[test]
    fn test_addresses() {
        for precompile in [
            Precompile::EcRecover,
            Precompile::Sha256,
            Precompile::Ripemd160,
            Precompile::Identity,
        ] {
            assert_eq!(Precompile::from_address(&precompile.address()), Some(precompile));
        }
        assert_eq!(Precompile::from_address(&Address::ZERO), None);
        assert_eq!(Precompile::from_address(&Address::from_low_u64_be(5)), None);
        assert_eq!(Precompile::from_address(&Address::from_low_u64_be(0x0101)), None);
    }

    #[test]
    fn test_costs() {
        assert_eq!(Precompile::EcRecover.cost(&[0u8; 200]), 3000);
        assert_eq!(Precompile::Sha256.cost(&[]), 60);
        assert_eq!(Precompile::Sha256.cost(&[0u8; 33]), 84);
        assert_eq!(Precompile::Ripemd160.cost(&[0u8; 32]), 720);
        assert_eq!(Precompile::Identity.cost(&[0u8; 64]), 21);
    }

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            hex::encode(Precompile::Sha256.execute(&[])),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_ripemd160_is_left_padded() {
        let out = Precompile::Ripemd160.execute(&[]);
        assert_eq!(out.len(), 32);
        assert_eq!(&out[..12], &[0u8; 12]);
        assert_eq!(hex::encode(&out[12..]), "9c1185a5c5e9fc54612808977ee8f548b2258d31");
    }

    #[test]
    fn test_identity() {
        assert_eq!(Precompile::Identity.execute(b"strata"), b"strata".to_vec());
    }

    #[test]
    fn test_ecrecover_roundtrip() {
        let key = PrivateKey::from_slice(&[0x42; 32]).unwrap();
        let expected = public_key_to_address(key.verifying_key());
        let hash = keccak256(b"message");
        let signature = sign(&hash, &key).unwrap();

        let mut input = Vec::with_capacity(128);
        input.extend_from_slice(hash.as_bytes());
        let mut v = [0u8; 32];
        v[31] = 27 + signature.recovery_id;
        input.extend_from_slice(&v);
        input.extend_from_slice(&signature.r);
        input.extend_from_slice(&signature.s);

        let out = Precompile::EcRecover.execute(&input);
        assert_eq!(out, expected.to_word().to_vec());
    }

    #[test]
    fn test_ecrecover_rejects_bad_v() {
        let mut input = [0u8; 128];
        input[63] = 29;
        assert!(Precompile::EcRecover.execute(&input).is_empty());
        input[63] = 27;
        // r = s = 0
        assert!(Precompile::EcRecover.execute(&input).is_empty());
        assert!(Precompile::EcRecover.execute(&[]).is_empty());
    }
}
