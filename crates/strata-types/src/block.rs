//! Block types

use bytes::Bytes;
use rlp::{Encodable, RlpStream};
use strata_crypto::keccak256;
use strata_primitives::{Address, H256, U256};

use crate::transaction::Transaction;

/// Block header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Parent block hash
    pub parent_hash: H256,
    /// Block producer receiving transaction fees
    pub coinbase: Address,
    /// State root after executing the block
    pub state_root: H256,
    /// Receipts trie root
    pub receipts_root: H256,
    /// Logs bloom filter
    pub logs_bloom: Bloom,
    /// Difficulty
    pub difficulty: U256,
    /// Block number (height)
    pub number: u64,
    /// Gas limit for the block
    pub gas_limit: u64,
    /// Gas used by all transactions
    pub gas_used: u64,
    /// Block timestamp (Unix seconds)
    pub timestamp: u64,
    /// Extra data
    pub extra_data: Bytes,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            parent_hash: H256::ZERO,
            coinbase: Address::ZERO,
            state_root: strata_trie::EMPTY_ROOT,
            receipts_root: strata_trie::EMPTY_ROOT,
            logs_bloom: Bloom::ZERO,
            difficulty: U256::zero(),
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
        }
    }
}

impl BlockHeader {
    /// Check if this is the genesis header
    pub fn is_genesis(&self) -> bool {
        self.number == 0 && self.parent_hash.is_zero()
    }

    /// Header hash: keccak of the RLP encoding
    pub fn hash(&self) -> H256 {
        keccak256(&rlp::encode(self))
    }
}

impl Encodable for BlockHeader {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(11);
        s.append(&self.parent_hash);
        s.append(&self.coinbase);
        s.append(&self.state_root);
        s.append(&self.receipts_root);
        s.append(&self.logs_bloom);
        s.append(&self.difficulty);
        s.append(&self.number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.timestamp);
        s.append(&self.extra_data.to_vec());
    }
}

/// Complete block
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// Transactions in execution order
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a block
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Block number
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Number of transactions
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

/// Logs bloom filter (2048 bits = 256 bytes)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bloom(pub [u8; 256]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; 256])
    }
}

impl Bloom {
    /// Empty bloom filter
    pub const ZERO: Bloom = Bloom([0u8; 256]);

    /// Create bloom from bytes
    pub fn from_bytes(bytes: [u8; 256]) -> Self {
        Self(bytes)
    }

    /// Check if bloom filter is empty
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Bit positions (byte index, mask) selected by `input`
    fn positions(input: &[u8]) -> [(usize, u8); 3] {
        let hash = keccak256(input);
        let hash_bytes = hash.as_bytes();
        let mut positions = [(0usize, 0u8); 3];
        for (i, position) in positions.iter_mut().enumerate() {
            let bit_index =
                ((hash_bytes[i * 2] as usize) << 8 | hash_bytes[i * 2 + 1] as usize) & 0x7FF;
            *position = (255 - bit_index / 8, 1 << (bit_index % 8));
        }
        positions
    }

    /// Add data to bloom filter
    pub fn accrue(&mut self, input: &[u8]) {
        for (byte_index, mask) in Self::positions(input) {
            self.0[byte_index] |= mask;
        }
    }

    /// Check if bloom might contain the input
    pub fn contains(&self, input: &[u8]) -> bool {
        Self::positions(input)
            .iter()
            .all(|&(byte_index, mask)| self.0[byte_index] & mask != 0)
    }

    /// Combine with another bloom filter (OR)
    pub fn accrue_bloom(&mut self, other: &Bloom) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0.iter()) {
            *mine |= theirs;
        }
    }
}

impl Encodable for Bloom {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_empty() {
        let bloom = Bloom::default();
        assert!(bloom.is_empty());
        assert_eq!(bloom, Bloom::ZERO);
    }

    #[test]
    fn test_bloom_accrue_and_contains() {
        let mut bloom = Bloom::default();
        bloom.accrue(b"hello");
        assert!(!bloom.is_empty());
        assert!(bloom.contains(b"hello"));
        assert!(!bloom.contains(b"definitely not there"));
    }

    #[test]
    fn test_bloom_sets_at_most_three_bits() {
        let mut bloom = Bloom::default();
        bloom.accrue(Address::from_bytes([0x42; 20]).as_bytes());
        let bits: u32 = bloom.0.iter().map(|b| b.count_ones()).sum();
        assert!((1..=3).contains(&bits));
    }

    #[test]
    fn test_bloom_combine() {
        let mut a = Bloom::default();
        a.accrue(b"a");
        let mut b = Bloom::default();
        b.accrue(b"b");

        a.accrue_bloom(&b);
        assert!(a.contains(b"a"));
        assert!(a.contains(b"b"));
    }

    #[test]
    fn test_genesis_header() {
        let header = BlockHeader::default();
        assert!(header.is_genesis());
        let child = BlockHeader {
            number: 1,
            parent_hash: header.hash(),
            ..Default::default()
        };
        assert!(!child.is_genesis());
    }

    #[test]
    fn test_header_hash_changes_with_fields() {
        let a = BlockHeader::default();
        let b = BlockHeader {
            gas_used: 21000,
            ..Default::default()
        };
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), BlockHeader::default().hash());
    }

    #[test]
    fn test_block_accessors() {
        let block = Block::new(
            BlockHeader {
                number: 7,
                ..Default::default()
            },
            vec![Transaction::default()],
        );
        assert_eq!(block.number(), 7);
        assert_eq!(block.tx_count(), 1);
    }
}
