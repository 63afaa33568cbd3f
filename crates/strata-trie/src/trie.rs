//! Persistent Merkle Patricia trie

use crate::error::TrieResult;
use crate::nibbles::{common_prefix_len, concat, Nibbles};
use crate::node::{Node, NodeRef, TrieNode};
use crate::store::NodeStore;
use crate::EMPTY_ROOT;
use rlp::Rlp;
use strata_primitives::H256;

/// Merkle Patricia trie over byte keys.
///
/// Updates copy the path from the root to the touched leaf and share every
/// other node, so cloning a trie is O(1) and clones never observe each
/// other's updates.
#[derive(Clone, Debug, Default)]
pub struct Trie {
    root: Option<NodeRef>,
}

impl Trie {
    /// Create an empty trie
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the trie holds no entries
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Root hash. The empty trie hashes to [`EMPTY_ROOT`].
    pub fn root_hash(&self) -> H256 {
        self.root.as_ref().map_or(EMPTY_ROOT, |root| root.hash())
    }

    /// Look up a key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let path = Nibbles::from_key(key);
        let mut node = self.root.as_ref()?;
        let mut rest = path.as_slice();

        loop {
            match &node.node {
                Node::Leaf { path, value } => {
                    return (path.as_slice() == rest).then_some(value.as_slice());
                }
                Node::Extension { path, child } => {
                    rest = rest.strip_prefix(path.as_slice())?;
                    node = child;
                }
                Node::Branch { children, value } => match rest.split_first() {
                    None => return value.as_deref(),
                    Some((index, tail)) => {
                        node = children[*index as usize].as_ref()?;
                        rest = tail;
                    }
                },
            }
        }
    }

    /// Insert or replace a value. An empty value removes the key.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        if value.is_empty() {
            self.remove(key);
            return;
        }
        let path = Nibbles::from_key(key);
        self.root = Some(insert_at(self.root.as_ref(), path.as_slice(), value));
    }

    /// Remove a key, returning true if it was present
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let path = Nibbles::from_key(key);
        let Some(root) = self.root.as_ref() else {
            return false;
        };
        match remove_at(root, path.as_slice()) {
            Some(new_root) => {
                self.root = new_root;
                true
            }
            None => false,
        }
    }

    /// All `(key, value)` pairs in key order
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            collect(root, &mut Vec::new(), &mut out);
        }
        out
    }

    /// Write all nodes to `store`, returning the root hash
    pub fn persist(&self, store: &dyn NodeStore) -> TrieResult<H256> {
        if let Some(root) = &self.root {
            root.persist(store, true)?;
        }
        Ok(self.root_hash())
    }

    /// Rebuild a trie from nodes previously written with [`Trie::persist`]
    pub fn load(store: &dyn NodeStore, root: H256) -> TrieResult<Self> {
        if root == EMPTY_ROOT {
            return Ok(Self::new());
        }
        let bytes = store
            .get(&root)?
            .ok_or(crate::TrieError::MissingNode(root))?;
        let node = TrieNode::decode(&Rlp::new(&bytes), store)?;
        Ok(Self { root: Some(node) })
    }
}

fn insert_at(node: Option<&NodeRef>, path: &[u8], value: Vec<u8>) -> NodeRef {
    let Some(node) = node else {
        return TrieNode::leaf(path.into(), value);
    };

    match &node.node {
        Node::Leaf {
            path: leaf_path,
            value: leaf_value,
        } => {
            let leaf_path = leaf_path.as_slice();
            if leaf_path == path {
                return TrieNode::leaf(path.into(), value);
            }
            let common = common_prefix_len(leaf_path, path);
            let mut children: Box<[Option<NodeRef>; 16]> = Box::default();
            let mut branch_value = None;

            place(&mut children, &mut branch_value, &leaf_path[common..], leaf_value.clone());
            place(&mut children, &mut branch_value, &path[common..], value);

            wrap_extension(&path[..common], TrieNode::branch(children, branch_value))
        }
        Node::Extension {
            path: ext_path,
            child,
        } => {
            let ext_path = ext_path.as_slice();
            let common = common_prefix_len(ext_path, path);
            if common == ext_path.len() {
                let child = insert_at(Some(child), &path[common..], value);
                return TrieNode::extension(ext_path.into(), child);
            }

            let mut children: Box<[Option<NodeRef>; 16]> = Box::default();
            let mut branch_value = None;

            // remainder of the old extension below the new branch
            let ext_rest = &ext_path[common + 1..];
            children[ext_path[common] as usize] = Some(if ext_rest.is_empty() {
                child.clone()
            } else {
                TrieNode::extension(ext_rest.into(), child.clone())
            });
            place(&mut children, &mut branch_value, &path[common..], value);

            wrap_extension(&path[..common], TrieNode::branch(children, branch_value))
        }
        Node::Branch {
            children,
            value: branch_value,
        } => {
            let mut children = children.clone();
            match path.split_first() {
                None => TrieNode::branch(children, Some(value)),
                Some((index, rest)) => {
                    let slot = &mut children[*index as usize];
                    *slot = Some(insert_at(slot.as_ref(), rest, value));
                    TrieNode::branch(children, branch_value.clone())
                }
            }
        }
    }
}

/// Put a value into a fresh branch at `path` (relative to the branch)
fn place(
    children: &mut [Option<NodeRef>; 16],
    branch_value: &mut Option<Vec<u8>>,
    path: &[u8],
    value: Vec<u8>,
) {
    match path.split_first() {
        None => *branch_value = Some(value),
        Some((index, rest)) => {
            children[*index as usize] = Some(TrieNode::leaf(rest.into(), value));
        }
    }
}

fn wrap_extension(prefix: &[u8], node: NodeRef) -> NodeRef {
    if prefix.is_empty() {
        node
    } else {
        TrieNode::extension(prefix.into(), node)
    }
}

/// Returns `None` when the key is absent, otherwise the replacement subtree
fn remove_at(node: &NodeRef, path: &[u8]) -> Option<Option<NodeRef>> {
    match &node.node {
        Node::Leaf {
            path: leaf_path, ..
        } => (leaf_path.as_slice() == path).then_some(None),
        Node::Extension {
            path: ext_path,
            child,
        } => {
            let rest = path.strip_prefix(ext_path.as_slice())?;
            let new_child = remove_at(child, rest)?;
            Some(new_child.map(|child| merge_into_prefix(ext_path.as_slice(), child)))
        }
        Node::Branch { children, value } => {
            let mut children = children.clone();
            let mut value = value.clone();
            match path.split_first() {
                None => {
                    value.take()?;
                }
                Some((index, rest)) => {
                    let slot = &mut children[*index as usize];
                    let child = slot.as_ref()?;
                    *slot = remove_at(child, rest)?;
                }
            }
            Some(normalize_branch(children, value))
        }
    }
}

/// Collapse a branch left with a single child and no value
fn normalize_branch(
    children: Box<[Option<NodeRef>; 16]>,
    value: Option<Vec<u8>>,
) -> Option<NodeRef> {
    let occupied: Vec<usize> = children
        .iter()
        .enumerate()
        .filter_map(|(i, child)| child.as_ref().map(|_| i))
        .collect();

    match (occupied.as_slice(), value) {
        ([], None) => None,
        ([], Some(value)) => Some(TrieNode::leaf(Nibbles::default(), value)),
        ([index], None) => {
            let child = children[*index].clone()?;
            Some(merge_into_prefix(&[*index as u8], child))
        }
        (_, value) => Some(TrieNode::branch(children, value)),
    }
}

/// Prepend `prefix` to `child`, merging with leaf and extension paths
fn merge_into_prefix(prefix: &[u8], child: NodeRef) -> NodeRef {
    match &child.node {
        Node::Leaf { path, value } => {
            TrieNode::leaf(concat(&[prefix, path.as_slice()]), value.clone())
        }
        Node::Extension { path, child } => {
            TrieNode::extension(concat(&[prefix, path.as_slice()]), child.clone())
        }
        Node::Branch { .. } => TrieNode::extension(prefix.into(), NodeRef::clone(&child)),
    }
}

fn collect(node: &NodeRef, prefix: &mut Vec<u8>, out: &mut Vec<(Vec<u8>, Vec<u8>)>) {
    match &node.node {
        Node::Leaf { path, value } => {
            let len = prefix.len();
            prefix.extend_from_slice(path.as_slice());
            push_entry(prefix, value, out);
            prefix.truncate(len);
        }
        Node::Extension { path, child } => {
            let len = prefix.len();
            prefix.extend_from_slice(path.as_slice());
            collect(child, prefix, out);
            prefix.truncate(len);
        }
        Node::Branch { children, value } => {
            if let Some(value) = value {
                push_entry(prefix, value, out);
            }
            for (i, child) in children.iter().enumerate() {
                if let Some(child) = child {
                    prefix.push(i as u8);
                    collect(child, prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}

fn push_entry(path: &[u8], value: &[u8], out: &mut Vec<(Vec<u8>, Vec<u8>)>) {
    if let Some(key) = Nibbles::from(path).to_key() {
        out.push((key, value.to_vec()));
    }
}
