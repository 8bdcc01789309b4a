//! Disk-backed B+Tree keyed by a 32-bit integer key domain.
//!
//! One tree occupies one `IndexId`'s worth of pages in the shared buffer
//! pool. The root always lives at `BTREE_ROOT_PAGE_ID` (page 0); splitting
//! the root relocates its old contents to a fresh page and rebuilds page
//! 0 as a new internal node, so callers never need to track where the
//! root "really" is.

use std::rc::Rc;

use crate::buffer::BufferPoolManager;
use crate::common::config::{BTREE_ROOT_PAGE_ID, MAX_CHILDREN, MIN_CHILDREN};
use crate::common::{Error, IndexId, PageId, PageKey, Result};
use crate::storage::page::{PageHeader, PageType};

use super::node::{BPlusTreeNode, NodeValues};

/// Maximum resting key count before a node splits.
const OVERFLOW_AT: usize = MAX_CHILDREN - 1;
/// Minimum resting key count before a non-root node is rebalanced.
const UNDERFLOW_BELOW: usize = MIN_CHILDREN - 1;

/// The value stored alongside a key at a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    Int(i32),
    Bytes(Vec<u8>),
}

struct DeleteOutcome {
    found: bool,
    underflow: bool,
}

/// A B+Tree backed by one index's pages in the shared buffer pool.
pub struct BPlusTree {
    index_id: IndexId,
    pool: Rc<BufferPoolManager>,
    leaf_values_are_bytes: bool,
}

impl BPlusTree {
    /// Open the tree for `index_id`, bootstrapping an empty root if this
    /// is the first time the index has been touched.
    pub fn open(pool: Rc<BufferPoolManager>, index_id: IndexId, leaf_values_are_bytes: bool) -> Result<Self> {
        let root_key = PageKey::new(index_id, PageId::new(BTREE_ROOT_PAGE_ID));
        let tree = Self {
            index_id,
            pool,
            leaf_values_are_bytes,
        };

        if !tree.pool.is_allocated(root_key)? {
            let root = BPlusTreeNode::new_leaf(leaf_values_are_bytes);
            let page_id = tree.allocate_node_page(&root)?;
            debug_assert_eq!(page_id.0, BTREE_ROOT_PAGE_ID);
        }

        Ok(tree)
    }

    // ========================================================================
    // Public API
    // ========================================================================

    /// First matching leaf value for `key`, if any.
    pub fn search(&self, key: i32) -> Result<Option<LeafValue>> {
        let leaf = self.find_leaf(key)?;
        Ok(Self::leaf_lookup(&leaf, key))
    }

    /// Every `(key, value)` pair with `lo <= key <= hi`, in key order.
    pub fn range_search(&self, lo: i32, hi: i32) -> Result<Vec<(i32, LeafValue)>> {
        let mut results = Vec::new();
        let mut page_id = self.find_leaf_page_id(lo)?;

        'pages: loop {
            let node = self.read_node(page_id)?;
            for (i, &k) in node.keys.iter().enumerate() {
                if k > hi {
                    break 'pages;
                }
                if k >= lo {
                    results.push((k, Self::value_at(&node.values, i)));
                }
            }
            if !node.next_leaf_page_id.is_valid() {
                break;
            }
            page_id = node.next_leaf_page_id;
        }

        Ok(results)
    }

    /// Every `(key, value)` pair in the tree, in key order.
    pub fn get_all(&self) -> Result<Vec<(i32, LeafValue)>> {
        self.range_search(i32::MIN, i32::MAX)
    }

    /// Insert `(key, value)`. Duplicate keys are permitted and ordered by
    /// insertion among equal keys.
    pub fn insert(&self, key: i32, value: LeafValue) -> Result<()> {
        let root_id = PageId::new(BTREE_ROOT_PAGE_ID);
        if let Some((split_key, right_id)) = self.insert_rec(root_id, key, value)? {
            self.split_root(split_key, right_id)?;
        }
        Ok(())
    }

    /// Delete the first entry matching `key`. Returns whether a match was
    /// found and removed.
    pub fn delete(&self, key: i32) -> Result<bool> {
        let root_id = PageId::new(BTREE_ROOT_PAGE_ID);
        let outcome = self.delete_rec(root_id, key)?;
        if outcome.found {
            self.collapse_root_if_needed()?;
        }
        Ok(outcome.found)
    }

    // ========================================================================
    // Search helpers
    // ========================================================================

    fn find_leaf(&self, key: i32) -> Result<BPlusTreeNode> {
        let page_id = self.find_leaf_page_id(key)?;
        self.read_node(page_id)
    }

    fn find_leaf_page_id(&self, key: i32) -> Result<PageId> {
        let mut page_id = PageId::new(BTREE_ROOT_PAGE_ID);
        loop {
            let node = self.read_node(page_id)?;
            if node.is_leaf {
                return Ok(page_id);
            }
            let idx = Self::child_index(&node.keys, key);
            page_id = node.children[idx];
        }
    }

    /// Index of the child whose range covers `key`: `children[i]` covers
    /// `[keys[i-1], keys[i])`, with the first and last children open-ended.
    fn child_index(keys: &[i32], key: i32) -> usize {
        keys.partition_point(|&k| k <= key)
    }

    fn leaf_lookup(node: &BPlusTreeNode, key: i32) -> Option<LeafValue> {
        let pos = node.keys.iter().position(|&k| k == key)?;
        Some(Self::value_at(&node.values, pos))
    }

    fn value_at(values: &NodeValues, index: usize) -> LeafValue {
        match values {
            NodeValues::Ints(v) => LeafValue::Int(v[index]),
            NodeValues::Records(v) => LeafValue::Bytes(v[index].clone()),
        }
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert into the subtree rooted at `page_id`. Returns `Some((split_key,
    /// new_right_page_id))` if `page_id`'s node had to split.
    fn insert_rec(&self, page_id: PageId, key: i32, value: LeafValue) -> Result<Option<(i32, PageId)>> {
        let mut node = self.read_node(page_id)?;

        if node.is_leaf {
            let pos = node.keys.partition_point(|&k| k <= key);
            node.keys.insert(pos, key);
            match (&mut node.values, value) {
                (NodeValues::Ints(v), LeafValue::Int(i)) => v.insert(pos, i),
                (NodeValues::Records(v), LeafValue::Bytes(b)) => v.insert(pos, b),
                _ => return Err(Error::InvalidState("leaf value representation mismatch".into())),
            }

            if node.keys.len() < OVERFLOW_AT {
                self.write_node(page_id, &node)?;
                return Ok(None);
            }
            return Ok(Some(self.split_leaf(page_id, node)?));
        }

        let idx = Self::child_index(&node.keys, key);
        let split = self.insert_rec(node.children[idx], key, value)?;

        let Some((split_key, right_id)) = split else {
            return Ok(None);
        };

        node.keys.insert(idx, split_key);
        node.children.insert(idx + 1, right_id);

        if node.keys.len() < OVERFLOW_AT {
            self.write_node(page_id, &node)?;
            return Ok(None);
        }
        Ok(Some(self.split_internal(page_id, node)?))
    }

    fn split_leaf(&self, page_id: PageId, mut node: BPlusTreeNode) -> Result<(i32, PageId)> {
        let mid = node.keys.len() / 2;

        let right_keys = node.keys.split_off(mid);
        let right_values = match &mut node.values {
            NodeValues::Ints(v) => NodeValues::Ints(v.split_off(mid)),
            NodeValues::Records(v) => NodeValues::Records(v.split_off(mid)),
        };

        let mut right = BPlusTreeNode::new_leaf(self.leaf_values_are_bytes);
        right.keys = right_keys;
        right.values = right_values;
        right.next_leaf_page_id = node.next_leaf_page_id;

        let split_key = right.keys[0];
        let right_id = self.allocate_node_page(&right)?;
        node.next_leaf_page_id = right_id;
        self.write_node(page_id, &node)?;

        Ok((split_key, right_id))
    }

    fn split_internal(&self, page_id: PageId, mut node: BPlusTreeNode) -> Result<(i32, PageId)> {
        let mid = node.keys.len() / 2;

        let promoted = node.keys[mid];
        let right_keys = node.keys.split_off(mid + 1);
        node.keys.pop(); // drop the promoted key from the left half
        let right_children = node.children.split_off(mid + 1);

        let mut right = BPlusTreeNode::new_internal();
        right.keys = right_keys;
        right.children = right_children;

        let right_id = self.allocate_node_page(&right)?;
        self.write_node(page_id, &node)?;

        Ok((promoted, right_id))
    }

    fn split_root(&self, split_key: i32, right_id: PageId) -> Result<()> {
        let root_id = PageId::new(BTREE_ROOT_PAGE_ID);
        let old_root = self.read_node(root_id)?;
        let new_left_id = self.allocate_node_page(&old_root)?;

        let mut new_root = BPlusTreeNode::new_internal();
        new_root.keys = vec![split_key];
        new_root.children = vec![new_left_id, right_id];
        self.write_node(root_id, &new_root)?;

        Ok(())
    }

    // ========================================================================
    // Delete
    // ========================================================================

    fn delete_rec(&self, page_id: PageId, key: i32) -> Result<DeleteOutcome> {
        let mut node = self.read_node(page_id)?;

        if node.is_leaf {
            let Some(pos) = node.keys.iter().position(|&k| k == key) else {
                return Ok(DeleteOutcome {
                    found: false,
                    underflow: false,
                });
            };

            node.keys.remove(pos);
            match &mut node.values {
                NodeValues::Ints(v) => {
                    v.remove(pos);
                }
                NodeValues::Records(v) => {
                    v.remove(pos);
                }
            }
            let underflow = node.keys.len() < UNDERFLOW_BELOW;
            self.write_node(page_id, &node)?;
            return Ok(DeleteOutcome { found: true, underflow });
        }

        let idx = Self::child_index(&node.keys, key);
        let child_outcome = self.delete_rec(node.children[idx], key)?;

        if !child_outcome.found {
            return Ok(DeleteOutcome {
                found: false,
                underflow: false,
            });
        }

        if child_outcome.underflow {
            self.rebalance_child(&mut node, idx)?;
        }

        let underflow = node.keys.len() < UNDERFLOW_BELOW;
        self.write_node(page_id, &node)?;
        Ok(DeleteOutcome { found: true, underflow })
    }

    /// Fix up `parent.children[idx]`, which has underflowed: borrow from a
    /// sibling if one has spare entries (left sibling preferred), else
    /// merge with a sibling (left preferred).
    fn rebalance_child(&self, parent: &mut BPlusTreeNode, idx: usize) -> Result<()> {
        let has_left = idx > 0;
        let has_right = idx + 1 < parent.children.len();

        if has_left {
            let left = self.read_node(parent.children[idx - 1])?;
            if left.keys.len() > UNDERFLOW_BELOW {
                return self.borrow_from_left(parent, idx, left);
            }
        }
        if has_right {
            let right = self.read_node(parent.children[idx + 1])?;
            if right.keys.len() > UNDERFLOW_BELOW {
                return self.borrow_from_right(parent, idx, right);
            }
        }
        if has_left {
            return self.merge_with_left(parent, idx);
        }
        self.merge_with_right(parent, idx)
    }

    fn borrow_from_left(&self, parent: &mut BPlusTreeNode, idx: usize, mut left: BPlusTreeNode) -> Result<()> {
        let mut node = self.read_node(parent.children[idx])?;

        if node.is_leaf {
            let key = left.keys.pop().unwrap();
            let value = match &mut left.values {
                NodeValues::Ints(v) => LeafValue::Int(v.pop().unwrap()),
                NodeValues::Records(v) => LeafValue::Bytes(v.pop().unwrap()),
            };
            node.keys.insert(0, key);
            match (&mut node.values, value) {
                (NodeValues::Ints(v), LeafValue::Int(i)) => v.insert(0, i),
                (NodeValues::Records(v), LeafValue::Bytes(b)) => v.insert(0, b),
                _ => unreachable!("leaf representation is fixed per tree"),
            }
            parent.keys[idx - 1] = node.keys[0];
        } else {
            let borrowed_child = left.children.pop().unwrap();
            let left_key = left.keys.pop().unwrap();
            node.children.insert(0, borrowed_child);
            node.keys.insert(0, parent.keys[idx - 1]);
            parent.keys[idx - 1] = left_key;
        }

        self.write_node(parent.children[idx - 1], &left)?;
        self.write_node(parent.children[idx], &node)?;
        Ok(())
    }

    fn borrow_from_right(&self, parent: &mut BPlusTreeNode, idx: usize, mut right: BPlusTreeNode) -> Result<()> {
        let mut node = self.read_node(parent.children[idx])?;

        if node.is_leaf {
            let key = right.keys.remove(0);
            let value = match &mut right.values {
                NodeValues::Ints(v) => LeafValue::Int(v.remove(0)),
                NodeValues::Records(v) => LeafValue::Bytes(v.remove(0)),
            };
            node.keys.push(key);
            match (&mut node.values, value) {
                (NodeValues::Ints(v), LeafValue::Int(i)) => v.push(i),
                (NodeValues::Records(v), LeafValue::Bytes(b)) => v.push(b),
                _ => unreachable!("leaf representation is fixed per tree"),
            }
            parent.keys[idx] = right.keys[0];
        } else {
            let borrowed_child = right.children.remove(0);
            let right_key = right.keys.remove(0);
            node.children.push(borrowed_child);
            node.keys.push(parent.keys[idx]);
            parent.keys[idx] = right_key;
        }

        self.write_node(parent.children[idx], &node)?;
        self.write_node(parent.children[idx + 1], &right)?;
        Ok(())
    }

    fn merge_with_left(&self, parent: &mut BPlusTreeNode, idx: usize) -> Result<()> {
        let mut left = self.read_node(parent.children[idx - 1])?;
        let node = self.read_node(parent.children[idx])?;
        let node_page_id = parent.children[idx];

        if node.is_leaf {
            left.keys.extend(node.keys);
            match (&mut left.values, node.values) {
                (NodeValues::Ints(lv), NodeValues::Ints(rv)) => lv.extend(rv),
                (NodeValues::Records(lv), NodeValues::Records(rv)) => lv.extend(rv),
                _ => return Err(Error::InvalidState("leaf value representation mismatch on merge".into())),
            }
            left.next_leaf_page_id = node.next_leaf_page_id;
        } else {
            left.keys.push(parent.keys[idx - 1]);
            left.keys.extend(node.keys);
            left.children.extend(node.children);
        }

        self.write_node(parent.children[idx - 1], &left)?;
        self.pool.delete_page(PageKey::new(self.index_id, node_page_id))?;

        parent.keys.remove(idx - 1);
        parent.children.remove(idx);
        Ok(())
    }

    fn merge_with_right(&self, parent: &mut BPlusTreeNode, idx: usize) -> Result<()> {
        let mut node = self.read_node(parent.children[idx])?;
        let right = self.read_node(parent.children[idx + 1])?;
        let right_page_id = parent.children[idx + 1];

        if node.is_leaf {
            node.keys.extend(right.keys);
            match (&mut node.values, right.values) {
                (NodeValues::Ints(lv), NodeValues::Ints(rv)) => lv.extend(rv),
                (NodeValues::Records(lv), NodeValues::Records(rv)) => lv.extend(rv),
                _ => return Err(Error::InvalidState("leaf value representation mismatch on merge".into())),
            }
            node.next_leaf_page_id = right.next_leaf_page_id;
        } else {
            node.keys.push(parent.keys[idx]);
            node.keys.extend(right.keys);
            node.children.extend(right.children);
        }

        self.write_node(parent.children[idx], &node)?;
        self.pool.delete_page(PageKey::new(self.index_id, right_page_id))?;

        parent.keys.remove(idx);
        parent.children.remove(idx + 1);
        Ok(())
    }

    fn collapse_root_if_needed(&self) -> Result<()> {
        let root_id = PageId::new(BTREE_ROOT_PAGE_ID);
        let root = self.read_node(root_id)?;

        if root.is_leaf || !root.keys.is_empty() {
            return Ok(());
        }

        // Root is internal with zero keys: its single remaining child
        // becomes the new root.
        let only_child_id = root.children[0];
        let child = self.read_node(only_child_id)?;
        self.write_node(root_id, &child)?;
        self.pool.delete_page(PageKey::new(self.index_id, only_child_id))?;
        Ok(())
    }

    // ========================================================================
    // Page I/O
    // ========================================================================

    fn read_node(&self, page_id: PageId) -> Result<BPlusTreeNode> {
        let guard = self.pool.fetch_page_read(PageKey::new(self.index_id, page_id))?;
        BPlusTreeNode::from_bytes(guard.payload())
    }

    fn write_node(&self, page_id: PageId, node: &BPlusTreeNode) -> Result<()> {
        let mut guard = self.pool.fetch_page_write(PageKey::new(self.index_id, page_id))?;
        guard.set_header(&PageHeader::new(PageType::Index, page_id.0));
        let bytes = node.to_bytes()?;
        guard.payload_mut()[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    fn allocate_node_page(&self, node: &BPlusTreeNode) -> Result<PageId> {
        let mut guard = self.pool.new_page(self.index_id)?;
        let page_id = guard.page_key().page_id;
        guard.set_header(&PageHeader::new(PageType::Index, page_id.0));
        let bytes = node.to_bytes()?;
        guard.payload_mut()[..bytes.len()].copy_from_slice(&bytes);
        Ok(page_id)
    }
}
