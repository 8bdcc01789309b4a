//! A secondary index: a B+Tree whose leaves carry the hashed primary-key
//! value. Looking up a row by a secondary index is a two-step "back-table
//! read": find the primary key here, then fetch the row from the
//! clustered index.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::buffer::BufferPoolManager;
use crate::common::{Error, IndexId, Result};
use crate::table::TableInner;
use crate::types::Value;

use super::btree::{indexed_key_for, BPlusTree, LeafValue};

pub struct SecondaryIndex {
    tree: BPlusTree,
    column_name: String,
    unique: bool,
    table: Weak<RefCell<TableInner>>,
}

impl SecondaryIndex {
    pub fn open(
        pool: Rc<BufferPoolManager>,
        index_id: IndexId,
        column_name: String,
        unique: bool,
        table: Weak<RefCell<TableInner>>,
    ) -> Result<Self> {
        Ok(Self {
            tree: BPlusTree::open(pool, index_id, false)?,
            column_name,
            unique,
            table,
        })
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    fn ensure_table_alive(&self) -> Result<()> {
        self.table
            .upgrade()
            .ok_or_else(|| Error::InvalidState("table dropped while secondary index outlived it".into()))?;
        Ok(())
    }

    /// Insert `(indexValue, pkValue)`. NULL index values are silently
    /// skipped — NULLs are not indexed. A unique index rejects a key that
    /// is already present.
    pub fn insert_entry(&self, index_value: &Value, pk_value: &Value) -> Result<()> {
        self.ensure_table_alive()?;
        if index_value.is_null() {
            return Ok(());
        }

        let key = indexed_key_for(index_value)?;
        if self.unique && self.tree.search(key)?.is_some() {
            return Err(Error::DuplicateKey(format!(
                "duplicate value for unique index on column {}",
                self.column_name
            )));
        }

        let pk_hash = indexed_key_for(pk_value)?;
        self.tree.insert(key, LeafValue::Int(pk_hash))
    }

    /// The hashed primary-key value for a matching entry, if any.
    pub fn find_primary_key_hash(&self, index_value: &Value) -> Result<Option<i32>> {
        self.ensure_table_alive()?;
        if index_value.is_null() {
            return Ok(None);
        }

        let key = indexed_key_for(index_value)?;
        match self.tree.search(key)? {
            Some(LeafValue::Int(pk_hash)) => Ok(Some(pk_hash)),
            Some(LeafValue::Bytes(_)) => Err(Error::InvalidState("secondary leaf held a byte record".into())),
            None => Ok(None),
        }
    }

    /// Remove the entry for `index_value`. A NULL value was never
    /// indexed, so this is a no-op success.
    pub fn delete_entry(&self, index_value: &Value) -> Result<bool> {
        self.ensure_table_alive()?;
        if index_value.is_null() {
            return Ok(true);
        }
        let key = indexed_key_for(index_value)?;
        self.tree.delete(key)
    }
}
