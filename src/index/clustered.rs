//! The clustered index: a B+Tree whose leaves carry full row records.
//!
//! Every table has exactly one; it is the table's primary storage, keyed
//! by the hashed primary-key value (column 0, by convention).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::buffer::BufferPoolManager;
use crate::common::{Error, IndexId, Result};
use crate::storage::record;
use crate::table::TableInner;
use crate::types::{Row, Value};

use super::btree::{indexed_key_for, BPlusTree, LeafValue};

pub struct ClusteredIndex {
    tree: BPlusTree,
    table: Weak<RefCell<TableInner>>,
}

impl ClusteredIndex {
    pub fn open(pool: Rc<BufferPoolManager>, index_id: IndexId, table: Weak<RefCell<TableInner>>) -> Result<Self> {
        Ok(Self {
            tree: BPlusTree::open(pool, index_id, true)?,
            table,
        })
    }

    fn columns(&self) -> Result<Vec<crate::types::Column>> {
        let inner = self
            .table
            .upgrade()
            .ok_or_else(|| Error::InvalidState("table dropped while clustered index outlived it".into()))?;
        let columns = inner.borrow().columns.clone();
        Ok(columns)
    }

    /// Extract, serialize, and insert `row` keyed by its primary key
    /// (column 0). The primary key must not be null.
    pub fn insert_row(&self, row: &Row) -> Result<()> {
        let columns = self.columns()?;
        let pk = row
            .get(0)
            .ok_or_else(|| Error::InvalidArgument("row has no primary-key column".into()))?;
        if pk.is_null() {
            return Err(Error::InvalidArgument("primary key must not be null".into()));
        }

        let key = indexed_key_for(pk)?;
        let bytes = record::serialize(row, &columns)?;
        self.tree.insert(key, LeafValue::Bytes(bytes))
    }

    pub fn select_by_primary_key(&self, pk: &Value) -> Result<Option<Row>> {
        let columns = self.columns()?;
        let key = indexed_key_for(pk)?;
        match self.tree.search(key)? {
            Some(LeafValue::Bytes(bytes)) => Ok(Some(record::deserialize(&bytes, &columns)?)),
            Some(LeafValue::Int(_)) => Err(Error::InvalidState("clustered leaf held an int value".into())),
            None => Ok(None),
        }
    }

    pub fn range_select(&self, start: &Value, end: &Value) -> Result<Vec<Row>> {
        let columns = self.columns()?;
        let lo = indexed_key_for(start)?;
        let hi = indexed_key_for(end)?;
        self.tree
            .range_search(lo, hi)?
            .into_iter()
            .map(|(_, v)| Self::row_from(v, &columns))
            .collect()
    }

    pub fn get_all_rows(&self) -> Result<Vec<Row>> {
        let columns = self.columns()?;
        self.tree
            .get_all()?
            .into_iter()
            .map(|(_, v)| Self::row_from(v, &columns))
            .collect()
    }

    pub fn delete_row(&self, pk: &Value) -> Result<bool> {
        let key = indexed_key_for(pk)?;
        self.tree.delete(key)
    }

    fn row_from(value: LeafValue, columns: &[crate::types::Column]) -> Result<Row> {
        match value {
            LeafValue::Bytes(bytes) => record::deserialize(&bytes, columns),
            LeafValue::Int(_) => Err(Error::InvalidState("clustered leaf held an int value".into())),
        }
    }
}
