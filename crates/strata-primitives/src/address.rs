//! Account address type (20 bytes)

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address parsing error
#[derive(Debug, Error)]
pub enum AddressError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid address length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Size of address in bytes
    pub const LEN: usize = 20;

    /// Zero address (0x0000...0000)
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create address from bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Create address from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, AddressError> {
        if slice.len() != Self::LEN {
            return Err(AddressError::InvalidLength(slice.len()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(slice);
        Ok(Address(bytes))
    }

    /// Take the low-order 20 bytes of a 32-byte big-endian word
    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Address(bytes)
    }

    /// Address whose low 8 bytes hold `value` big-endian.
    ///
    /// Precompiled contracts live at `from_low_u64_be(1..=4)`.
    pub fn from_low_u64_be(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Address(bytes)
    }

    /// Parse address from hex string (with or without 0x prefix)
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get as byte array
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-pad to a 32-byte big-endian word
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "rlp")]
mod rlp_impl {
    use super::*;
    use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

    impl Encodable for Address {
        fn rlp_append(&self, s: &mut RlpStream) {
            s.encoder().encode_value(&self.0);
        }
    }

    impl Decodable for Address {
        fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
            rlp.decoder().decode_value(|bytes| {
                if bytes.len() != Address::LEN {
                    return Err(DecoderError::RlpInvalidLength);
                }
                let mut arr = [0u8; 20];
                arr.copy_from_slice(bytes);
                Ok(Address(arr))
            })
        }
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for Address {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_hex())
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Address::from_hex(&s).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_hex() {
        let addr = Address::from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        assert!(!addr.is_zero());

        let addr2 = Address::from_hex("742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        assert_eq!(addr, addr2);
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert_eq!(Address::ZERO.to_hex(), "0x0000000000000000000000000000000000000000");
    }

    #[test]
    fn test_address_display_is_lowercase() {
        let addr: Address = "0x742D35CC6634C0532925A3B844BC9E7595F0AB3D".parse().unwrap();
        assert_eq!(format!("{}", addr), "0x742d35cc6634c0532925a3b844bc9e7595f0ab3d");
        assert_eq!(
            format!("{:?}", addr),
            "Address(0x742d35cc6634c0532925a3b844bc9e7595f0ab3d)"
        );
    }

    #[test]
    fn test_address_from_hex_rejects_bad_input() {
        assert!(matches!(
            Address::from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aGGG"),
            Err(AddressError::InvalidHex(_))
        ));
        assert!(matches!(Address::from_hex("0x1234"), Err(AddressError::InvalidLength(2))));
        assert!(Address::from_hex("").is_err());
        assert!(Address::from_hex("0x123").is_err());
    }

    #[test]
    fn test_address_from_slice_length() {
        assert!(Address::from_slice(&[0u8; 19]).is_err());
        assert!(Address::from_slice(&[0u8; 21]).is_err());
        assert_eq!(Address::from_slice(&[0xab; 20]).unwrap(), Address::from([0xab; 20]));
    }

    #[test]
    fn test_word_conversions() {
        let addr = Address::from_low_u64_be(0x0102);
        let word = addr.to_word();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(word[30], 0x01);
        assert_eq!(word[31], 0x02);
        assert_eq!(Address::from_word(&word), addr);

        let mut dirty = [0xffu8; 32];
        dirty[12..].copy_from_slice(addr.as_bytes());
        assert_eq!(Address::from_word(&dirty), addr);
    }

    #[test]
    fn test_precompile_addresses() {
        assert_eq!(
            Address::from_low_u64_be(1).to_hex(),
            "0x0000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_address_ordering() {
        assert!(Address::from_low_u64_be(1) < Address::from_low_u64_be(2));
    }

    #[cfg(feature = "rlp")]
    #[test]
    fn test_address_rlp_roundtrip() {
        let addr = Address::from([0x11; 20]);
        let encoded = rlp::encode(&addr);
        assert_eq!(encoded[0], 0x80 + 20);
        let decoded: Address = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, addr);
    }
}
