//! The schema catalog: table/column metadata persisted as rows in two
//! system tables, `SYS_TABLES` and `SYS_COLUMNS`.
//!
//! Both system tables are ordinary [`Table`]s over the clustered-index
//! storage, at the canonical index ids `-100` and `-200`. Opening a
//! `Table` already bootstraps an empty clustered index if none exists
//! and reattaches to an existing one otherwise, so there is no separate
//! bootstrap-vs-reattach code path here: `initialize` always just opens
//! them.

use std::collections::HashMap;
use std::rc::Rc;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, IndexId, Result, TableId};
use crate::table::Table;
use crate::types::{Column, ColumnType, Row, Value};

const SYS_TABLES_NAME: &str = "SYS_TABLES";
const SYS_COLUMNS_NAME: &str = "SYS_COLUMNS";

/// Cached in-memory description of a user table, replayed from
/// `SYS_TABLES`/`SYS_COLUMNS` at startup.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    pub table_id: TableId,
    pub table_name: String,
    pub columns: Vec<Column>,
}

pub struct SchemaManager {
    pool: Rc<BufferPoolManager>,
    sys_tables: Option<Table>,
    sys_columns: Option<Table>,
    cache: HashMap<String, TableMetadata>,
    next_table_id: i32,
}

impl SchemaManager {
    pub fn new(pool: Rc<BufferPoolManager>) -> Self {
        Self {
            pool,
            sys_tables: None,
            sys_columns: None,
            cache: HashMap::new(),
            next_table_id: 1,
        }
    }

    fn sys_tables_schema() -> Vec<Column> {
        vec![
            Column::new("table_id", ColumnType::Int, 0, false).unwrap(),
            Column::new("table_name", ColumnType::Varchar, 128, false).unwrap(),
        ]
    }

    fn sys_columns_schema() -> Vec<Column> {
        vec![
            Column::new("table_id", ColumnType::Int, 0, false).unwrap(),
            Column::new("column_name", ColumnType::Varchar, 128, false).unwrap(),
            Column::new("column_type", ColumnType::Varchar, 32, false).unwrap(),
            Column::new("column_length", ColumnType::Int, 0, false).unwrap(),
            Column::new("nullable", ColumnType::Boolean, 0, false).unwrap(),
            Column::new("column_position", ColumnType::Int, 0, false).unwrap(),
        ]
    }

    /// Open (bootstrapping if needed) the two system tables and replay
    /// their rows into the in-memory metadata cache.
    pub fn initialize(&mut self) -> Result<()> {
        let sys_tables = Table::open(
            self.pool.clone(),
            TableId::SYS_TABLES,
            SYS_TABLES_NAME,
            Self::sys_tables_schema(),
        )?;
        let sys_columns = Table::open(
            self.pool.clone(),
            TableId::SYS_COLUMNS,
            SYS_COLUMNS_NAME,
            Self::sys_columns_schema(),
        )?;

        let mut names_by_id: HashMap<i32, String> = HashMap::new();
        let mut max_table_id = 0i32;
        let mut cache = HashMap::new();

        for row in sys_tables.full_table_scan()? {
            let (Some(Value::Int(table_id)), Some(Value::Varchar(name))) = (row.get(0), row.get(1)) else {
                return Err(Error::MetadataCorrupt("malformed SYS_TABLES row".into()));
            };
            names_by_id.insert(*table_id, name.clone());
            max_table_id = max_table_id.max(*table_id);
        }

        let mut columns_by_table: HashMap<i32, Vec<(i32, Column)>> = HashMap::new();
        for row in sys_columns.full_table_scan()? {
            let values = &row.values;
            let (
                Some(Value::Int(table_id)),
                Some(Value::Varchar(column_name)),
                Some(Value::Varchar(column_type)),
                Some(Value::Int(column_length)),
                Some(Value::Boolean(nullable)),
                Some(Value::Int(column_position)),
            ) = (
                values.first(),
                values.get(1),
                values.get(2),
                values.get(3),
                values.get(4),
                values.get(5),
            )
            else {
                return Err(Error::MetadataCorrupt("malformed SYS_COLUMNS row".into()));
            };

            let col_type = parse_column_type(column_type)?;
            let column = Column::new(column_name.clone(), col_type, *column_length as u16, *nullable)?;
            columns_by_table
                .entry(*table_id)
                .or_default()
                .push((*column_position, column));
        }

        for (table_id, name) in &names_by_id {
            let mut positioned = columns_by_table.remove(table_id).unwrap_or_default();
            positioned.sort_by_key(|(pos, _)| *pos);
            let columns = positioned.into_iter().map(|(_, c)| c).collect();
            cache.insert(
                name.clone(),
                TableMetadata {
                    table_id: TableId::new(*table_id),
                    table_name: name.clone(),
                    columns,
                },
            );
        }

        self.sys_tables = Some(sys_tables);
        self.sys_columns = Some(sys_columns);
        self.cache = cache;
        self.next_table_id = 1 + max_table_id.max(0);
        Ok(())
    }

    pub fn sys_tables_table(&self) -> Option<&Table> {
        self.sys_tables.as_ref()
    }

    pub fn sys_columns_table(&self) -> Option<&Table> {
        self.sys_columns.as_ref()
    }

    pub fn table_metadata(&self, name: &str) -> Option<&TableMetadata> {
        self.cache.get(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }

    /// Assign a fresh `TableId`, persist one `SYS_TABLES` row and one
    /// `SYS_COLUMNS` row per column, and update the cache.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<TableId> {
        if self.cache.contains_key(name) {
            return Err(Error::AlreadyExists(format!("table already exists: {name}")));
        }

        let (sys_tables, sys_columns) = self.system_tables()?;
        let table_id = TableId::new(self.next_table_id);

        sys_tables.insert_row(&Row::new(vec![Value::Int(table_id.0), Value::Varchar(name.to_string())]))?;

        for (position, column) in columns.iter().enumerate() {
            sys_columns.insert_row(&Row::new(vec![
                Value::Int(table_id.0),
                Value::Varchar(column.name.clone()),
                Value::Varchar(column_type_name(column.col_type).to_string()),
                Value::Int(column.length as i32),
                Value::Boolean(column.nullable),
                Value::Int(position as i32),
            ]))?;
        }

        self.next_table_id += 1;
        self.cache.insert(
            name.to_string(),
            TableMetadata {
                table_id,
                table_name: name.to_string(),
                columns,
            },
        );

        self.pool.flush_table_pages(IndexId::clustered(TableId::SYS_TABLES))?;
        self.pool.flush_table_pages(IndexId::clustered(TableId::SYS_COLUMNS))?;

        Ok(table_id)
    }

    /// Remove the `SYS_TABLES` row for `name`. The matching `SYS_COLUMNS`
    /// rows are left orphaned — composite-key delete isn't wired up, a
    /// documented limitation carried from the source this was distilled
    /// from.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let metadata = self.cache.get(name).ok_or_else(|| Error::NotFound(format!("no such table: {name}")))?;
        let table_id = metadata.table_id;

        let (sys_tables, _sys_columns) = self.system_tables()?;
        sys_tables.delete_row(&Value::Int(table_id.0))?;
        self.cache.remove(name);

        self.pool.flush_table_pages(IndexId::clustered(TableId::SYS_TABLES))?;
        Ok(())
    }

    /// Reconstruct a `Table` for every cached metadata entry, attaching a
    /// clustered index on column 0. Secondary index definitions are not
    /// persisted in this catalog and so do not survive a reopen.
    pub fn load_all_tables(&self) -> Result<Vec<Table>> {
        self.cache
            .values()
            .map(|meta| Table::open(self.pool.clone(), meta.table_id, meta.table_name.clone(), meta.columns.clone()))
            .collect()
    }

    fn system_tables(&self) -> Result<(&Table, &Table)> {
        let sys_tables = self
            .sys_tables
            .as_ref()
            .ok_or_else(|| Error::InvalidState("SchemaManager used before initialize()".into()))?;
        let sys_columns = self
            .sys_columns
            .as_ref()
            .ok_or_else(|| Error::InvalidState("SchemaManager used before initialize()".into()))?;
        Ok((sys_tables, sys_columns))
    }
}

fn column_type_name(col_type: ColumnType) -> &'static str {
    match col_type {
        ColumnType::Int => "INT",
        ColumnType::BigInt => "BIGINT",
        ColumnType::Double => "DOUBLE",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Varchar => "VARCHAR",
        ColumnType::Date => "DATE",
        ColumnType::Timestamp => "TIMESTAMP",
    }
}

fn parse_column_type(name: &str) -> Result<ColumnType> {
    match name {
        "INT" => Ok(ColumnType::Int),
        "BIGINT" => Ok(ColumnType::BigInt),
        "DOUBLE" => Ok(ColumnType::Double),
        "BOOLEAN" => Ok(ColumnType::Boolean),
        "VARCHAR" => Ok(ColumnType::Varchar),
        "DATE" => Ok(ColumnType::Date),
        "TIMESTAMP" => Ok(ColumnType::Timestamp),
        other => Err(Error::MetadataCorrupt(format!("unknown column type in catalog: {other}"))),
    }
}
