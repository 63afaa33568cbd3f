//! Trie keyed by the keccak256 hash of each key

use crate::error::TrieResult;
use crate::store::NodeStore;
use crate::trie::Trie;
use strata_crypto::keccak256;
use strata_primitives::H256;

/// Merkle Patricia trie whose paths are `keccak256(key)`.
///
/// Used for the account trie (keyed by address) and storage tries (keyed by
/// slot). Fixed-length hashed paths keep the trie balanced regardless of how
/// keys are chosen.
#[derive(Clone, Debug, Default)]
pub struct SecureTrie {
    inner: Trie,
}

impl SecureTrie {
    /// Create an empty secure trie
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the trie holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Root hash
    pub fn root_hash(&self) -> H256 {
        self.inner.root_hash()
    }

    /// Look up a key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.inner.get(keccak256(key).as_bytes())
    }

    /// Look up by an already hashed key
    pub fn get_hashed(&self, hashed_key: &H256) -> Option<&[u8]> {
        self.inner.get(hashed_key.as_bytes())
    }

    /// Insert a value; an empty value removes the key
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        self.inner.insert(keccak256(key).as_bytes(), value);
    }

    /// Remove a key
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.inner.remove(keccak256(key).as_bytes())
    }

    /// All `(hashed key, value)` pairs
    pub fn entries(&self) -> Vec<(H256, Vec<u8>)> {
        self.inner
            .entries()
            .into_iter()
            .filter_map(|(key, value)| H256::from_slice(&key).ok().map(|key| (key, value)))
            .collect()
    }

    /// Write all nodes to `store`
    pub fn persist(&self, store: &dyn NodeStore) -> TrieResult<H256> {
        self.inner.persist(store)
    }

    /// Rebuild from persisted nodes
    pub fn load(store: &dyn NodeStore, root: H256) -> TrieResult<Self> {
        Trie::load(store, root).map(|inner| Self { inner })
    }
}
