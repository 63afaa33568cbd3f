//! Order-independence and persistence properties of the trie

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use strata_trie::{MemoryNodeStore, SecureTrie, Trie};

fn entries() -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    btree_map(vec(any::<u8>(), 1..8), vec(any::<u8>(), 1..40), 0..40)
        .prop_map(|map| map.into_iter().collect())
}

proptest! {
    #[test]
    fn root_independent_of_insertion_order(entries in entries(), seed in any::<u64>()) {
        let mut forward = Trie::new();
        for (k, v) in &entries {
            forward.insert(k, v.clone());
        }

        let mut shuffled = entries.clone();
        let len = shuffled.len().max(1);
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();

        let mut backward = Trie::new();
        for (k, v) in &shuffled {
            backward.insert(k, v.clone());
        }

        prop_assert_eq!(forward.root_hash(), backward.root_hash());
    }

    #[test]
    fn removing_inserted_keys_restores_root(base in entries(), extra in entries()) {
        let mut trie = Trie::new();
        for (k, v) in &base {
            trie.insert(k, v.clone());
        }
        let before = trie.root_hash();

        let fresh: Vec<_> = extra
            .into_iter()
            .filter(|(k, _)| !base.iter().any(|(b, _)| b == k))
            .collect();
        for (k, v) in &fresh {
            trie.insert(k, v.clone());
        }
        for (k, _) in &fresh {
            prop_assert!(trie.remove(k));
        }

        prop_assert_eq!(trie.root_hash(), before);
    }

    #[test]
    fn every_inserted_key_is_readable(entries in entries()) {
        let mut trie = SecureTrie::new();
        for (k, v) in &entries {
            trie.insert(k, v.clone());
        }
        for (k, v) in &entries {
            prop_assert_eq!(trie.get(k), Some(v.as_slice()));
        }
    }

    #[test]
    fn persisted_trie_reloads(entries in entries()) {
        let store = MemoryNodeStore::new();
        let mut trie = Trie::new();
        for (k, v) in &entries {
            trie.insert(k, v.clone());
        }
        let root = trie.persist(&store).unwrap();
        let loaded = Trie::load(&store, root).unwrap();
        prop_assert_eq!(loaded.root_hash(), root);
        prop_assert_eq!(loaded.entries(), trie.entries());
    }
}
