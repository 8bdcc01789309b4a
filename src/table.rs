//! A table: immutable column schema, one clustered index, and zero or
//! more secondary indexes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, IndexId, Result, TableId};
use crate::index::{ClusteredIndex, SecondaryIndex};
use crate::types::{check_unique_column_names, Column, Row, Value};

/// The primary key is always column 0, by convention.
const PRIMARY_KEY_COLUMN: usize = 0;

pub struct TableInner {
    pub(crate) table_id: TableId,
    pub(crate) table_name: String,
    pub(crate) columns: Vec<Column>,
    clustered: Option<ClusteredIndex>,
    secondary: HashMap<String, SecondaryIndex>,
}

/// A table, cheaply cloneable — every clone shares the same underlying
/// state. Indexes hold a `Weak` back-reference into this same state.
#[derive(Clone)]
pub struct Table(Rc<RefCell<TableInner>>);

impl Table {
    /// Open a table with a fresh clustered index on column 0. Used both
    /// for newly created tables and for reattaching to existing files.
    pub fn open(
        pool: Rc<BufferPoolManager>,
        table_id: TableId,
        table_name: impl Into<String>,
        columns: Vec<Column>,
    ) -> Result<Self> {
        check_unique_column_names(&columns)?;
        if columns.is_empty() {
            return Err(Error::InvalidArgument("table must have at least one column".into()));
        }

        let inner = Rc::new(RefCell::new(TableInner {
            table_id,
            table_name: table_name.into(),
            columns,
            clustered: None,
            secondary: HashMap::new(),
        }));

        let clustered = ClusteredIndex::open(pool, IndexId::clustered(table_id), Rc::downgrade(&inner))?;
        inner.borrow_mut().clustered = Some(clustered);

        Ok(Table(inner))
    }

    pub fn table_id(&self) -> TableId {
        self.0.borrow().table_id
    }

    pub fn table_name(&self) -> String {
        self.0.borrow().table_name.clone()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.0.borrow().columns.clone()
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.0
            .borrow()
            .columns
            .iter()
            .position(|c| c.name_eq(name))
            .ok_or_else(|| Error::NotFound(format!("no such column: {name}")))
    }

    /// Attach a secondary index on `column_name`, stored under
    /// `IndexId::secondary(table_id, k)`.
    pub fn create_secondary_index(
        &self,
        pool: Rc<BufferPoolManager>,
        index_name: impl Into<String>,
        column_name: &str,
        unique: bool,
        k: i32,
    ) -> Result<()> {
        self.column_index(column_name)?;
        let table_id = self.table_id();
        let weak = Rc::downgrade(&self.0);
        let index = SecondaryIndex::open(
            pool,
            IndexId::secondary(table_id, k),
            column_name.to_string(),
            unique,
            weak,
        )?;
        self.0.borrow_mut().secondary.insert(index_name.into(), index);
        Ok(())
    }

    fn with_clustered<T>(&self, f: impl FnOnce(&ClusteredIndex) -> Result<T>) -> Result<T> {
        let inner = self.0.borrow();
        let clustered = inner
            .clustered
            .as_ref()
            .ok_or_else(|| Error::InvalidState("table has no clustered index".into()))?;
        f(clustered)
    }

    /// Validate `row`'s shape and types, insert it into the clustered
    /// index, then into every secondary index. A type-validation failure
    /// happens before any index is touched; a secondary-index failure
    /// after the clustered insert is not rolled back (no transactions).
    pub fn insert_row(&self, row: &Row) -> Result<()> {
        let columns = self.columns();
        row.validate(&columns)?;

        self.with_clustered(|c| c.insert_row(row))?;

        let secondary_names: Vec<String> = self.0.borrow().secondary.keys().cloned().collect();
        for name in secondary_names {
            let col_name = self.0.borrow().secondary[&name].column_name().to_string();
            let col_idx = self.column_index(&col_name)?;
            let index_value = row.get(col_idx).cloned().unwrap_or(Value::Null);
            let pk_value = row.get(PRIMARY_KEY_COLUMN).cloned().unwrap_or(Value::Null);

            self.0.borrow().secondary[&name].insert_entry(&index_value, &pk_value)?;
        }

        Ok(())
    }

    pub fn select_by_primary_key(&self, pk: &Value) -> Result<Option<Row>> {
        self.with_clustered(|c| c.select_by_primary_key(pk))
    }

    pub fn select_by_secondary_index(&self, index_name: &str, value: &Value) -> Result<Option<Row>> {
        let pk_hash = {
            let inner = self.0.borrow();
            let idx = inner
                .secondary
                .get(index_name)
                .ok_or_else(|| Error::NotFound(format!("no such secondary index: {index_name}")))?;
            idx.find_primary_key_hash(value)?
        };
        let Some(pk_hash) = pk_hash else {
            return Ok(None);
        };
        self.with_clustered(|c| {
            c.range_select(&Value::Int(pk_hash), &Value::Int(pk_hash))
                .map(|rows| rows.into_iter().next())
        })
    }

    pub fn range_select(&self, start: &Value, end: &Value) -> Result<Vec<Row>> {
        self.with_clustered(|c| c.range_select(start, end))
    }

    pub fn full_table_scan(&self) -> Result<Vec<Row>> {
        self.with_clustered(|c| c.get_all_rows())
    }

    /// Delete-then-insert. Returns `0` if `pk` does not exist, else `1`.
    /// Not atomic: a crash between the delete and the insert loses the
    /// row (no transactions, no write-ahead log).
    pub fn update_row(&self, pk: &Value, new_row: &Row) -> Result<usize> {
        if self.select_by_primary_key(pk)?.is_none() {
            return Ok(0);
        }
        self.delete_row(pk)?;
        self.insert_row(new_row)?;
        Ok(1)
    }

    /// Remove the row for `pk` from every secondary index (unsupported
    /// deletes are swallowed) and then from the clustered index. Returns
    /// `0` if `pk` does not exist, else `1`.
    pub fn delete_row(&self, pk: &Value) -> Result<usize> {
        let Some(row) = self.select_by_primary_key(pk)? else {
            return Ok(0);
        };

        let secondary_names: Vec<String> = self.0.borrow().secondary.keys().cloned().collect();
        for name in secondary_names {
            let col_name = self.0.borrow().secondary[&name].column_name().to_string();
            let Ok(col_idx) = self.column_index(&col_name) else {
                continue;
            };
            let index_value = row.get(col_idx).cloned().unwrap_or(Value::Null);

            // Deletion of a secondary-index entry is best-effort: a
            // failure here must not block removing the row itself.
            let _ = self.0.borrow().secondary[&name].delete_entry(&index_value);
        }

        self.with_clustered(|c| c.delete_row(pk))?;
        Ok(1)
    }
}
