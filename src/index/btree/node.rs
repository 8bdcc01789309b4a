//! On-disk representation of one B+Tree node.
//!
//! A node occupies the payload of a single `PageType::Index` page.
//!
//! # Layout (within the page payload)
//! ```text
//! Offset  Size              Field
//! ------  ----              -----
//! 0       4                 magic (0x4254504E)
//! 4       1                 version
//! 5       1                 flags (bit0 leaf, bit1 leaf-value-is-bytes)
//! 6       4                 key_count (u32 LE)
//! 10      4                 next_leaf_page_id (i32 LE, -1 sentinel)
//! 14      key_count*4       keys (i32 LE each)
//! ...     body              children (internal) or leaf values
//! ```
//!
//! Internal-node body is `key_count + 1` page ids (u32 LE each).
//! Leaf-node body is either `key_count` i32s (`LeafPayload::Int`) or
//! `key_count` length-prefixed byte blobs (`LeafPayload::Bytes`).

use crate::common::config::{BTREE_NODE_MAGIC, PAGE_PAYLOAD_SIZE};
use crate::common::{Error, PageId, Result};

const NODE_VERSION: u8 = 1;
const FLAG_LEAF: u8 = 0b0000_0001;
const FLAG_LEAF_VALUE_IS_BYTES: u8 = 0b0000_0010;

const HEADER_SIZE: usize = 4 + 1 + 1 + 4 + 4;

/// The leaf value representation a `BPlusTree` stores.
///
/// Secondary indexes store the hashed primary-key value directly
/// (`Int`); clustered indexes store the full serialized row (`Bytes`).
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValues {
    Ints(Vec<i32>),
    Records(Vec<Vec<u8>>),
}

impl NodeValues {
    pub fn len(&self) -> usize {
        match self {
            NodeValues::Ints(v) => v.len(),
            NodeValues::Records(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One B+Tree node: either an internal node (keys + child page ids) or a
/// leaf node (keys + values + a link to the next leaf).
#[derive(Debug, Clone, PartialEq)]
pub struct BPlusTreeNode {
    pub is_leaf: bool,
    pub keys: Vec<i32>,
    /// `key_count + 1` child page ids. Empty for leaf nodes.
    pub children: Vec<PageId>,
    /// `key_count` leaf values. Empty (`NodeValues::Ints(vec![])`) for
    /// internal nodes.
    pub values: NodeValues,
    /// Next leaf in key order, or `PageId::INVALID` for the last leaf or
    /// any internal node.
    pub next_leaf_page_id: PageId,
}

impl BPlusTreeNode {
    /// A new empty leaf node with no next link.
    pub fn new_leaf(values_are_bytes: bool) -> Self {
        Self {
            is_leaf: true,
            keys: Vec::new(),
            children: Vec::new(),
            values: if values_are_bytes {
                NodeValues::Records(Vec::new())
            } else {
                NodeValues::Ints(Vec::new())
            },
            next_leaf_page_id: PageId::INVALID,
        }
    }

    /// A new empty internal node.
    pub fn new_internal() -> Self {
        Self {
            is_leaf: false,
            keys: Vec::new(),
            children: Vec::new(),
            values: NodeValues::Ints(Vec::new()),
            next_leaf_page_id: PageId::INVALID,
        }
    }

    fn leaf_value_is_bytes(&self) -> bool {
        matches!(self.values, NodeValues::Records(_))
    }

    /// Serialize into a page payload-sized buffer (caller truncates/pads
    /// via `Page::payload_mut`).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut flags = 0u8;
        if self.is_leaf {
            flags |= FLAG_LEAF;
        }
        if self.leaf_value_is_bytes() {
            flags |= FLAG_LEAF_VALUE_IS_BYTES;
        }

        let mut buf = Vec::with_capacity(HEADER_SIZE + self.keys.len() * 4 + 64);
        buf.extend_from_slice(&BTREE_NODE_MAGIC.to_le_bytes());
        buf.push(NODE_VERSION);
        buf.push(flags);
        buf.extend_from_slice(&(self.keys.len() as u32).to_le_bytes());
        let next = if self.is_leaf && self.next_leaf_page_id.is_valid() {
            self.next_leaf_page_id.0 as i32
        } else {
            -1
        };
        buf.extend_from_slice(&next.to_le_bytes());

        for k in &self.keys {
            buf.extend_from_slice(&k.to_le_bytes());
        }

        if self.is_leaf {
            match &self.values {
                NodeValues::Ints(ints) => {
                    for v in ints {
                        buf.extend_from_slice(&v.to_le_bytes());
                    }
                }
                NodeValues::Records(records) => {
                    for r in records {
                        buf.extend_from_slice(&(r.len() as u32).to_le_bytes());
                        buf.extend_from_slice(r);
                    }
                }
            }
        } else {
            for child in &self.children {
                buf.extend_from_slice(&child.0.to_le_bytes());
            }
        }

        if buf.len() > PAGE_PAYLOAD_SIZE {
            return Err(Error::IndexCorrupt(format!(
                "serialized node of {} bytes exceeds page payload of {} bytes",
                buf.len(),
                PAGE_PAYLOAD_SIZE
            )));
        }

        Ok(buf)
    }

    /// Deserialize a node from a page payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::IndexCorrupt("node payload shorter than header".into()));
        }

        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        if magic != BTREE_NODE_MAGIC {
            return Err(Error::IndexCorrupt(format!("bad node magic: {magic:#x}")));
        }

        let _version = bytes[4];
        let flags = bytes[5];
        let is_leaf = flags & FLAG_LEAF != 0;
        let values_are_bytes = flags & FLAG_LEAF_VALUE_IS_BYTES != 0;

        let key_count = u32::from_le_bytes(bytes[6..10].try_into().unwrap()) as usize;
        let next_raw = i32::from_le_bytes(bytes[10..14].try_into().unwrap());
        let next_leaf_page_id = if next_raw < 0 {
            PageId::INVALID
        } else {
            PageId::new(next_raw as u32)
        };

        let mut offset = HEADER_SIZE;
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            let k = read_i32(bytes, &mut offset)?;
            keys.push(k);
        }

        let (children, values) = if is_leaf {
            let values = if values_are_bytes {
                let mut records = Vec::with_capacity(key_count);
                for _ in 0..key_count {
                    let len = read_u32(bytes, &mut offset)? as usize;
                    if offset + len > bytes.len() {
                        return Err(Error::IndexCorrupt("leaf record truncated".into()));
                    }
                    records.push(bytes[offset..offset + len].to_vec());
                    offset += len;
                }
                NodeValues::Records(records)
            } else {
                let mut ints = Vec::with_capacity(key_count);
                for _ in 0..key_count {
                    ints.push(read_i32(bytes, &mut offset)?);
                }
                NodeValues::Ints(ints)
            };
            (Vec::new(), values)
        } else {
            let mut children = Vec::with_capacity(key_count + 1);
            for _ in 0..key_count + 1 {
                children.push(PageId::new(read_u32(bytes, &mut offset)?));
            }
            (children, NodeValues::Ints(Vec::new()))
        };

        Ok(Self {
            is_leaf,
            keys,
            children,
            values,
            next_leaf_page_id,
        })
    }
}

fn read_i32(bytes: &[u8], offset: &mut usize) -> Result<i32> {
    if *offset + 4 > bytes.len() {
        return Err(Error::IndexCorrupt("node payload truncated reading i32".into()));
    }
    let v = i32::from_le_bytes(bytes[*offset..*offset + 4].try_into().unwrap());
    *offset += 4;
    Ok(v)
}

fn read_u32(bytes: &[u8], offset: &mut usize) -> Result<u32> {
    if *offset + 4 > bytes.len() {
        return Err(Error::IndexCorrupt("node payload truncated reading u32".into()));
    }
    let v = u32::from_le_bytes(bytes[*offset..*offset + 4].try_into().unwrap());
    *offset += 4;
    Ok(v)
}
