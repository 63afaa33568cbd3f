//! # strata-trie
//!
//! Merkle Patricia trie used for state commitments.
//!
//! - [`Trie`]: persistent trie with cached node hashes
//! - [`SecureTrie`]: the same trie keyed by `keccak256(key)`
//! - [`NodeStore`]: content-addressed storage for persisted nodes
//!
//! Nodes whose RLP encoding is shorter than 32 bytes are embedded in their
//! parent; larger nodes are referenced by hash.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod nibbles;
mod node;
mod secure;
mod store;
mod trie;

pub use error::{TrieError, TrieResult};
pub use nibbles::Nibbles;
pub use secure::SecureTrie;
pub use store::{MemoryNodeStore, NodeStore};
pub use trie::Trie;

use strata_primitives::H256;

/// Root hash of an empty trie, keccak256(rlp(""))
pub const EMPTY_ROOT: H256 = H256::from_bytes([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
]);
