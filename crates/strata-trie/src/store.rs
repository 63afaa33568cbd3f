//! Content-addressed node storage

use crate::error::TrieResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use strata_primitives::H256;

/// Content-addressed store for encoded trie nodes and contract code.
///
/// Values are always stored under the keccak256 hash of their bytes.
pub trait NodeStore: Send + Sync {
    /// Fetch the bytes stored under `hash`
    fn get(&self, hash: &H256) -> TrieResult<Option<Vec<u8>>>;

    /// Store `bytes` under `hash`
    fn put(&self, hash: H256, bytes: Vec<u8>) -> TrieResult<()>;
}

/// In-memory node store
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    nodes: RwLock<HashMap<H256, Vec<u8>>>,
}

impl MemoryNodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// True if nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl NodeStore for MemoryNodeStore {
    fn get(&self, hash: &H256) -> TrieResult<Option<Vec<u8>>> {
        Ok(self.nodes.read().get(hash).cloned())
    }

    fn put(&self, hash: H256, bytes: Vec<u8>) -> TrieResult<()> {
        self.nodes.write().insert(hash, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryNodeStore::new();
        assert!(store.is_empty());

        let hash = H256::from_low_u64_be(42);
        store.put(hash, vec![1, 2, 3]).unwrap();
        assert_eq!(store.get(&hash).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.get(&H256::ZERO).unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}
