//! Trie-backed root state database

use crate::account::{Account, EMPTY_STORAGE_ROOT};
use crate::error::{StateError, StateResult};
use crate::repository::Repository;
use std::collections::HashMap;
use std::sync::Arc;
use strata_crypto::keccak256;
use strata_primitives::{Address, H256, U256};
use strata_trie::{NodeStore, SecureTrie};
use tracing::debug;

/// Root of the repository stack.
///
/// Accounts live in a secure trie keyed by address; each account with
/// storage owns a secure storage trie keyed by slot. Cloning shares all
/// trie nodes and code, so a clone is a cheap snapshot of the state.
#[derive(Clone, Default)]
pub struct StateDb {
    accounts: SecureTrie,
    /// Storage tries keyed by keccak(address)
    storage: HashMap<H256, SecureTrie>,
    code: HashMap<H256, Arc<[u8]>>,
}

fn encode_slot_value(value: &H256) -> Vec<u8> {
    rlp::encode(&U256::from_big_endian(value.as_bytes())).to_vec()
}

fn decode_slot_value(bytes: &[u8]) -> StateResult<H256> {
    let value: U256 =
        rlp::decode(bytes).map_err(|e| StateError::Deserialization(e.to_string()))?;
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    Ok(H256::from_bytes(word))
}

impl StateDb {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Merkle root over all accounts
    pub fn root_hash(&self) -> H256 {
        self.accounts.root_hash()
    }

    /// Number of accounts holding at least one storage slot
    pub fn storage_trie_count(&self) -> usize {
        self.storage.values().filter(|trie| !trie.is_empty()).count()
    }

    /// All accounts, keyed by hashed address
    pub fn accounts(&self) -> StateResult<Vec<(H256, Account)>> {
        self.accounts
            .entries()
            .into_iter()
            .map(|(key, bytes)| Ok((key, Account::from_rlp(&bytes)?)))
            .collect()
    }

    /// Write every trie node and code blob to `store`, returning the root
    pub fn persist(&self, store: &dyn NodeStore) -> StateResult<H256> {
        for trie in self.storage.values() {
            trie.persist(store)?;
        }
        for (code_hash, code) in &self.code {
            store.put(*code_hash, code.to_vec())?;
        }
        let root = self.accounts.persist(store)?;
        debug!(
            root = %root,
            storage_tries = self.storage.len(),
            code_blobs = self.code.len(),
            "persisted state"
        );
        Ok(root)
    }

    /// Rebuild the state rooted at `root` from `store`
    pub fn load(store: &dyn NodeStore, root: H256) -> StateResult<Self> {
        let accounts = SecureTrie::load(store, root)?;
        let mut storage = HashMap::new();
        let mut code = HashMap::new();
        for (hashed_address, bytes) in accounts.entries() {
            let account = Account::from_rlp(&bytes)?;
            if account.storage_root != EMPTY_STORAGE_ROOT {
                storage.insert(hashed_address, SecureTrie::load(store, account.storage_root)?);
            }
            if account.has_code() && !code.contains_key(&account.code_hash) {
                let blob = store
                    .get(&account.code_hash)?
                    .ok_or(StateError::MissingCode(account.code_hash))?;
                code.insert(account.code_hash, Arc::from(blob));
            }
        }
        Ok(Self {
            accounts,
            storage,
            code,
        })
    }

    fn storage_root_of(&self, hashed_address: &H256) -> H256 {
        self.storage
            .get(hashed_address)
            .map_or(EMPTY_STORAGE_ROOT, |trie| trie.root_hash())
    }
}

impl Repository for StateDb {
    fn account(&self, address: &Address) -> StateResult<Option<Account>> {
        self.accounts
            .get(address.as_bytes())
            .map(Account::from_rlp)
            .transpose()
    }

    fn storage(&self, address: &Address, key: &H256) -> StateResult<H256> {
        let value = self
            .storage
            .get(&keccak256(address.as_bytes()))
            .and_then(|trie| trie.get(key.as_bytes()));
        match value {
            Some(bytes) => decode_slot_value(bytes),
            None => Ok(H256::ZERO),
        }
    }

    fn committed_storage(&self, address: &Address, key: &H256) -> StateResult<H256> {
        self.storage(address, key)
    }

    fn code(&self, code_hash: &H256) -> StateResult<Option<Vec<u8>>> {
        Ok(self.code.get(code_hash).map(|code| code.to_vec()))
    }

    fn put_account(&mut self, address: Address, mut account: Account) -> StateResult<()> {
        account.storage_root = self.storage_root_of(&keccak256(address.as_bytes()));
        self.accounts.insert(address.as_bytes(), account.rlp_bytes());
        Ok(())
    }

    fn delete_account(&mut self, address: &Address) -> StateResult<()> {
        self.accounts.remove(address.as_bytes());
        self.storage.remove(&keccak256(address.as_bytes()));
        Ok(())
    }

    fn put_storage(&mut self, address: Address, key: H256, value: H256) -> StateResult<()> {
        let hashed_address = keccak256(address.as_bytes());
        let trie = self.storage.entry(hashed_address).or_default();
        if value.is_zero() {
            trie.remove(key.as_bytes());
        } else {
            trie.insert(key.as_bytes(), encode_slot_value(&value));
        }
        let root = trie.root_hash();
        if let Some(mut account) = self.account(&address)? {
            account.storage_root = root;
            self.accounts.insert(address.as_bytes(), account.rlp_bytes());
        }
        Ok(())
    }

    fn put_code(&mut self, code_hash: H256, code: Vec<u8>) -> StateResult<()> {
        self.code.insert(code_hash, Arc::from(code));
        Ok(())
    }
}

impl std::fmt::Debug for StateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDb")
            .field("root", &self.root_hash())
            .field("code_blobs", &self.code.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::EMPTY_CODE_HASH;
    use strata_trie::{MemoryNodeStore, EMPTY_ROOT};

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    #[test]
    fn test_empty_state_root() {
        assert_eq!(StateDb::new().root_hash(), EMPTY_ROOT);
    }

    #[test]
    fn test_account_roundtrip() {
        let mut state = StateDb::new();
        assert!(state.account(&addr(1)).unwrap().is_none());

        state.add_balance(&addr(1), U256::from(1000u64)).unwrap();
        state.increase_nonce(&addr(1)).unwrap();

        let account = state.account(&addr(1)).unwrap().unwrap();
        assert_eq!(account.nonce, 1);
        assert_eq!(account.balance, U256::from(1000u64));
        assert_eq!(account.code_hash, EMPTY_CODE_HASH);
    }

    #[test]
    fn test_storage_zero_is_absent() {
        let mut state = StateDb::new();
        let slot = H256::from_low_u64_be(1);
        state.add_storage_row(&addr(1), slot, H256::from_low_u64_be(42)).unwrap();
        let with_slot = state.root_hash();

        state.add_storage_row(&addr(1), slot, H256::ZERO).unwrap();
        assert_eq!(state.get_storage_value(&addr(1), &slot).unwrap(), H256::ZERO);
        assert_ne!(state.root_hash(), with_slot);
        assert_eq!(state.get_account(&addr(1)).unwrap().storage_root, EMPTY_STORAGE_ROOT);
    }

    #[test]
    fn test_root_independent_of_write_order() {
        let mut a = StateDb::new();
        a.add_balance(&addr(1), U256::one()).unwrap();
        a.add_balance(&addr(2), U256::from(2u64)).unwrap();
        a.add_storage_row(&addr(2), H256::from_low_u64_be(7), H256::from_low_u64_be(8)).unwrap();

        let mut b = StateDb::new();
        b.add_storage_row(&addr(2), H256::from_low_u64_be(7), H256::from_low_u64_be(8)).unwrap();
        b.add_balance(&addr(2), U256::from(2u64)).unwrap();
        b.add_balance(&addr(1), U256::one()).unwrap();

        assert_eq!(a.root_hash(), b.root_hash());
    }

    #[test]
    fn test_delete_drops_storage() {
        let mut state = StateDb::new();
        let slot = H256::from_low_u64_be(3);
        state.add_storage_row(&addr(1), slot, H256::from_low_u64_be(3)).unwrap();
        state.delete(&addr(1)).unwrap();

        assert!(!state.is_exist(&addr(1)).unwrap());
        assert_eq!(state.get_storage_value(&addr(1), &slot).unwrap(), H256::ZERO);
        assert_eq!(state.root_hash(), EMPTY_ROOT);
    }

    #[test]
    fn test_code_lookup() {
        let mut state = StateDb::new();
        let code = vec![0x60, 0x00, 0x60, 0x00, 0xf3];
        state.save_code(&addr(9), code.clone()).unwrap();

        assert_eq!(state.get_code(&addr(9)).unwrap(), code);
        assert_eq!(state.get_code_hash(&addr(9)).unwrap(), keccak256(&code));
        assert!(state.get_code(&addr(8)).unwrap().is_empty());
    }

    #[test]
    fn test_persist_and_load() {
        let mut state = StateDb::new();
        state.add_balance(&addr(1), U256::from(5u64)).unwrap();
        state.save_code(&addr(2), vec![0x00]).unwrap();
        state
            .add_storage_row(&addr(2), H256::from_low_u64_be(1), H256::from_low_u64_be(2))
            .unwrap();

        let store = MemoryNodeStore::new();
        let root = state.persist(&store).unwrap();
        assert_eq!(root, state.root_hash());

        let loaded = StateDb::load(&store, root).unwrap();
        assert_eq!(loaded.root_hash(), root);
        assert_eq!(loaded.get_code(&addr(2)).unwrap(), vec![0x00]);
        assert_eq!(
            loaded.get_storage_value(&addr(2), &H256::from_low_u64_be(1)).unwrap(),
            H256::from_low_u64_be(2)
        );
        assert_eq!(loaded.accounts().unwrap().len(), 2);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut state = StateDb::new();
        state.add_balance(&addr(1), U256::one()).unwrap();
        let snapshot = state.clone();

        state.add_balance(&addr(1), U256::one()).unwrap();
        assert_eq!(snapshot.get_balance(&addr(1)).unwrap(), U256::one());
        assert_ne!(snapshot.root_hash(), state.root_hash());
    }
}
