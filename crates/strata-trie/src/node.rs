//! Trie nodes and their RLP encoding

use crate::error::{TrieError, TrieResult};
use crate::nibbles::Nibbles;
use crate::store::NodeStore;
use rlp::{Rlp, RlpStream};
use std::sync::{Arc, OnceLock};
use strata_crypto::keccak256;
use strata_primitives::H256;

/// Shared, immutable node handle
pub(crate) type NodeRef = Arc<TrieNode>;

/// How a node is referenced from its parent
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum EncodedNode {
    /// RLP shorter than 32 bytes, embedded in the parent
    Raw(Vec<u8>),
    /// keccak256 of the node RLP
    Hashed(H256),
}

/// Node contents
#[derive(Clone, Debug)]
pub(crate) enum Node {
    Leaf {
        path: Nibbles,
        value: Vec<u8>,
    },
    Extension {
        path: Nibbles,
        child: NodeRef,
    },
    Branch {
        children: Box<[Option<NodeRef>; 16]>,
        value: Option<Vec<u8>>,
    },
}

/// A node plus its lazily computed reference encoding.
///
/// Nodes are never mutated after construction, so the cache stays valid.
#[derive(Debug)]
pub(crate) struct TrieNode {
    pub(crate) node: Node,
    encoded: OnceLock<EncodedNode>,
}

impl TrieNode {
    pub(crate) fn new(node: Node) -> NodeRef {
        Arc::new(TrieNode {
            node,
            encoded: OnceLock::new(),
        })
    }

    pub(crate) fn leaf(path: Nibbles, value: Vec<u8>) -> NodeRef {
        Self::new(Node::Leaf { path, value })
    }

    pub(crate) fn extension(path: Nibbles, child: NodeRef) -> NodeRef {
        Self::new(Node::Extension { path, child })
    }

    pub(crate) fn branch(children: Box<[Option<NodeRef>; 16]>, value: Option<Vec<u8>>) -> NodeRef {
        Self::new(Node::Branch { children, value })
    }

    /// Full RLP of this node
    pub(crate) fn rlp(&self) -> Vec<u8> {
        match &self.node {
            Node::Leaf { path, value } => {
                let mut stream = RlpStream::new_list(2);
                stream.append(&path.encode_hex_prefix(true));
                stream.append(value);
                stream.out().to_vec()
            }
            Node::Extension { path, child } => {
                let mut stream = RlpStream::new_list(2);
                stream.append(&path.encode_hex_prefix(false));
                append_reference(&mut stream, child.reference());
                stream.out().to_vec()
            }
            Node::Branch { children, value } => {
                let mut stream = RlpStream::new_list(17);
                for child in children.iter() {
                    match child {
                        Some(child) => append_reference(&mut stream, child.reference()),
                        None => {
                            stream.append_empty_data();
                        }
                    }
                }
                match value {
                    Some(value) => stream.append(value),
                    None => stream.append_empty_data(),
                };
                stream.out().to_vec()
            }
        }
    }

    /// Reference used by the parent, cached
    pub(crate) fn reference(&self) -> &EncodedNode {
        self.encoded.get_or_init(|| {
            let rlp = self.rlp();
            if rlp.len() >= 32 {
                EncodedNode::Hashed(keccak256(&rlp))
            } else {
                EncodedNode::Raw(rlp)
            }
        })
    }

    /// Hash of this node when used as a root
    pub(crate) fn hash(&self) -> H256 {
        match self.reference() {
            EncodedNode::Hashed(hash) => *hash,
            EncodedNode::Raw(rlp) => keccak256(rlp),
        }
    }

    /// Write every hash-referenced node below and including this one
    pub(crate) fn persist(&self, store: &dyn NodeStore, is_root: bool) -> TrieResult<()> {
        if is_root || matches!(self.reference(), EncodedNode::Hashed(_)) {
            store.put(self.hash(), self.rlp())?;
        }
        match &self.node {
            Node::Leaf { .. } => Ok(()),
            Node::Extension { child, .. } => child.persist(store, false),
            Node::Branch { children, .. } => children
                .iter()
                .flatten()
                .try_for_each(|child| child.persist(store, false)),
        }
    }

    /// Rebuild a node from its RLP, fetching hashed children from `store`
    pub(crate) fn decode(rlp: &Rlp, store: &dyn NodeStore) -> TrieResult<NodeRef> {
        match rlp.item_count()? {
            2 => {
                let (path, is_leaf) = Nibbles::decode_hex_prefix(rlp.at(0)?.data()?)
                    .ok_or_else(|| TrieError::InvalidNode("bad hex-prefix path".into()))?;
                if is_leaf {
                    Ok(Self::leaf(path, rlp.at(1)?.data()?.to_vec()))
                } else {
                    let child = Self::decode_reference(&rlp.at(1)?, store)?
                        .ok_or_else(|| TrieError::InvalidNode("extension without child".into()))?;
                    Ok(Self::extension(path, child))
                }
            }
            17 => {
                let mut children: Box<[Option<NodeRef>; 16]> = Box::default();
                for (i, slot) in children.iter_mut().enumerate() {
                    *slot = Self::decode_reference(&rlp.at(i)?, store)?;
                }
                let value = rlp.at(16)?.data()?;
                let value = (!value.is_empty()).then(|| value.to_vec());
                Ok(Self::branch(children, value))
            }
            n => Err(TrieError::InvalidNode(format!("unexpected item count {}", n))),
        }
    }

    fn decode_reference(item: &Rlp, store: &dyn NodeStore) -> TrieResult<Option<NodeRef>> {
        if item.is_list() {
            return Self::decode(item, store).map(Some);
        }
        let data = item.data()?;
        match data.len() {
            0 => Ok(None),
            32 => {
                let hash = H256::from_slice(data)
                    .map_err(|e| TrieError::InvalidNode(e.to_string()))?;
                let bytes = store.get(&hash)?.ok_or(TrieError::MissingNode(hash))?;
                Self::decode(&Rlp::new(&bytes), store).map(Some)
            }
            n => Err(TrieError::InvalidNode(format!("child reference of {} bytes", n))),
        }
    }
}

fn append_reference(stream: &mut RlpStream, reference: &EncodedNode) {
    match reference {
        EncodedNode::Raw(rlp) => {
            stream.append_raw(rlp, 1);
        }
        EncodedNode::Hashed(hash) => {
            stream.append(hash);
        }
    }
}
