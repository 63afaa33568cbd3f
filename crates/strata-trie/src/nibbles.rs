//! Nibble paths and hex-prefix ("compact") encoding

/// A sequence of 4-bit values, one per byte.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Nibbles(Vec<u8>);

impl Nibbles {
    /// Split each byte of `key` into its high and low nibble
    pub fn from_key(key: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(key.len() * 2);
        for byte in key {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        Nibbles(nibbles)
    }

    /// Wrap raw nibble values (each must be < 16)
    pub fn from_raw(nibbles: Vec<u8>) -> Self {
        debug_assert!(nibbles.iter().all(|n| *n < 16));
        Nibbles(nibbles)
    }

    /// Number of nibbles
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no nibbles
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Pack back into bytes. Returns `None` for an odd number of nibbles.
    pub fn to_key(&self) -> Option<Vec<u8>> {
        if self.0.len() % 2 != 0 {
            return None;
        }
        Some(self.0.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
    }

    /// Hex-prefix encode with the leaf flag
    pub fn encode_hex_prefix(&self, is_leaf: bool) -> Vec<u8> {
        encode_hex_prefix(&self.0, is_leaf)
    }

    /// Decode a hex-prefix path, returning the nibbles and the leaf flag
    pub fn decode_hex_prefix(bytes: &[u8]) -> Option<(Self, bool)> {
        let first = *bytes.first()?;
        let flag = first >> 4;
        if flag > 3 {
            return None;
        }
        let is_leaf = flag & 0b10 != 0;
        let is_odd = flag & 0b01 != 0;

        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        if is_odd {
            nibbles.push(first & 0x0f);
        } else if first & 0x0f != 0 {
            return None;
        }
        for byte in &bytes[1..] {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        Some((Nibbles(nibbles), is_leaf))
    }
}

impl From<&[u8]> for Nibbles {
    fn from(raw: &[u8]) -> Self {
        Nibbles::from_raw(raw.to_vec())
    }
}

/// Length of the shared prefix of two nibble slices
pub(crate) fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Concatenate nibble slices
pub(crate) fn concat(parts: &[&[u8]]) -> Nibbles {
    Nibbles(parts.concat())
}

pub(crate) fn encode_hex_prefix(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let is_odd = nibbles.len() % 2 == 1;
    let flag = ((is_leaf as u8) << 1) | is_odd as u8;

    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let rest = if is_odd {
        out.push((flag << 4) | nibbles[0]);
        &nibbles[1..]
    } else {
        out.push(flag << 4);
        nibbles
    };
    out.extend(rest.chunks(2).map(|pair| (pair[0] << 4) | pair[1]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key() {
        let nibbles = Nibbles::from_key(&[0x12, 0xab]);
        assert_eq!(nibbles.as_slice(), &[1, 2, 0xa, 0xb]);
        assert_eq!(nibbles.to_key().unwrap(), vec![0x12, 0xab]);
    }

    #[test]
    fn test_hex_prefix_encoding() {
        // Vectors from the Yellow Paper appendix C
        assert_eq!(encode_hex_prefix(&[1, 2, 3, 4, 5], false), vec![0x11, 0x23, 0x45]);
        assert_eq!(encode_hex_prefix(&[0, 1, 2, 3, 4, 5], false), vec![0x00, 0x01, 0x23, 0x45]);
        assert_eq!(encode_hex_prefix(&[0, 0xf, 1, 0xc, 0xb, 8], true), vec![0x20, 0x0f, 0x1c, 0xb8]);
        assert_eq!(encode_hex_prefix(&[0xf, 1, 0xc, 0xb, 8], true), vec![0x3f, 0x1c, 0xb8]);
        assert_eq!(encode_hex_prefix(&[], true), vec![0x20]);
    }

    #[test]
    fn test_hex_prefix_decoding() {
        let (nibbles, leaf) = Nibbles::decode_hex_prefix(&[0x3f, 0x1c, 0xb8]).unwrap();
        assert!(leaf);
        assert_eq!(nibbles.as_slice(), &[0xf, 1, 0xc, 0xb, 8]);

        let (nibbles, leaf) = Nibbles::decode_hex_prefix(&[0x00, 0x01, 0x23, 0x45]).unwrap();
        assert!(!leaf);
        assert_eq!(nibbles.as_slice(), &[0, 1, 2, 3, 4, 5]);

        assert!(Nibbles::decode_hex_prefix(&[]).is_none());
        assert!(Nibbles::decode_hex_prefix(&[0x41]).is_none());
        assert!(Nibbles::decode_hex_prefix(&[0x05]).is_none());
    }

    #[test]
    fn test_odd_length_has_no_key() {
        assert!(Nibbles::from_raw(vec![1, 2, 3]).to_key().is_none());
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(common_prefix_len(&[1, 2, 3], &[1, 2, 4]), 2);
        assert_eq!(common_prefix_len(&[1, 2], &[1, 2, 4]), 2);
        assert_eq!(common_prefix_len(&[], &[1]), 0);
    }
}
