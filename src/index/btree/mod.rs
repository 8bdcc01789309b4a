//! Disk-backed B+Tree: node layout, key-domain hashing, and the tree
//! itself.

mod key;
mod node;
mod tree;

pub use key::{indexed_key_for, HashableKey, KeyHasher, StandardKeyHasher};
pub use node::{BPlusTreeNode, NodeValues};
pub use tree::{BPlusTree, LeafValue};
