//! The storage engine façade: the buffer pool, the schema catalog, and
//! every open table, tied together behind one entry point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::buffer::BufferPoolManager;
use crate::catalog::SchemaManager;
use crate::common::{Error, Result, TableId};
use crate::table::Table;
use crate::types::Column;

const DEFAULT_POOL_SIZE: usize = 256;

/// Owns the buffer pool, the schema catalog, and the id/name → `Table`
/// maps. This is the entry point callers construct and drive.
pub struct StorageEngine {
    pool: Rc<BufferPoolManager>,
    data_dir: PathBuf,
    schema: SchemaManager,
    tables_by_id: HashMap<TableId, Table>,
    tables_by_name: HashMap<String, Table>,
}

impl StorageEngine {
    /// Open the engine over `data_dir`, creating it if needed, and load
    /// the catalog plus every table it describes.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_pool_size(data_dir, DEFAULT_POOL_SIZE)
    }

    pub fn open_with_pool_size(data_dir: impl Into<PathBuf>, pool_size: usize) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;

        let pool = Rc::new(BufferPoolManager::new(pool_size, data_dir.clone()));
        let mut schema = SchemaManager::new(pool.clone());
        schema.initialize()?;

        let mut engine = Self {
            pool,
            data_dir,
            schema,
            tables_by_id: HashMap::new(),
            tables_by_name: HashMap::new(),
        };

        if let Some(sys_tables) = engine.schema.sys_tables_table().cloned() {
            engine.register_system_table(sys_tables);
        }
        if let Some(sys_columns) = engine.schema.sys_columns_table().cloned() {
            engine.register_system_table(sys_columns);
        }

        for table in engine.schema.load_all_tables()? {
            engine.register_table(table);
        }

        Ok(engine)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn get_buffer_pool(&self) -> Rc<BufferPoolManager> {
        self.pool.clone()
    }

    /// Create and register a user table. System-table names are
    /// reserved: use the engine's bootstrap path for those instead.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<Table> {
        if is_system_table_name(name) {
            return Err(Error::InvalidArgument(format!("{name} is a reserved system table name")));
        }

        let table_id = self.schema.create_table(name, columns.clone())?;
        let table = Table::open(self.pool.clone(), table_id, name, columns)?;
        self.register_table(table.clone());
        Ok(table)
    }

    /// Drop a user table: remove its catalog row and unregister it.
    /// Clustered-index pages are not reclaimed — there is no page-level
    /// garbage collector in this engine.
    pub fn drop_table(&mut self, name: &str) -> Result<bool> {
        if is_system_table_name(name) {
            return Err(Error::InvalidArgument(format!("{name} is a reserved system table name")));
        }
        if !self.tables_by_name.contains_key(name) {
            return Ok(false);
        }

        self.schema.drop_table(name)?;
        if let Some(table) = self.tables_by_name.remove(name) {
            self.tables_by_id.remove(&table.table_id());
        }
        Ok(true)
    }

    pub fn get_table(&self, name: &str) -> Option<Table> {
        self.tables_by_name.get(name).cloned()
    }

    pub fn get_table_by_id(&self, table_id: TableId) -> Option<Table> {
        self.tables_by_id.get(&table_id).cloned()
    }

    pub fn get_all_table_names(&self) -> Vec<String> {
        self.tables_by_name
            .keys()
            .filter(|name| !is_system_table_name(name))
            .cloned()
            .collect()
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables_by_name.contains_key(name)
    }

    /// Register an already-open ordinary table (used after `create_table`
    /// and when replaying the catalog at startup).
    pub fn register_table(&mut self, table: Table) {
        self.tables_by_id.insert(table.table_id(), table.clone());
        self.tables_by_name.insert(table.table_name(), table);
    }

    /// Register `SYS_TABLES`/`SYS_COLUMNS`, bypassing the reserved-name
    /// check `create_table` enforces for user tables.
    pub fn register_system_table(&mut self, table: Table) {
        self.tables_by_id.insert(table.table_id(), table.clone());
        self.tables_by_name.insert(table.table_name(), table);
    }

    /// Flush every dirty page and drop all table handles. The engine is
    /// unusable afterward.
    pub fn close(mut self) -> Result<()> {
        self.pool.flush_all_pages()?;
        self.tables_by_id.clear();
        self.tables_by_name.clear();
        Ok(())
    }
}

fn is_system_table_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("SYS_TABLES") || name.eq_ignore_ascii_case("SYS_COLUMNS")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnType, Row, Value};
    use tempfile::tempdir;

    fn user_columns() -> Vec<Column> {
        vec![
            Column::new("id", ColumnType::Int, 0, false).unwrap(),
            Column::new("name", ColumnType::Varchar, 32, true).unwrap(),
        ]
    }

    #[test]
    fn create_table_registers_it_for_lookup_by_name_and_id() {
        let dir = tempdir().unwrap();
        let mut engine = StorageEngine::open(dir.path()).unwrap();

        let table = engine.create_table("users", user_columns()).unwrap();
        assert!(engine.table_exists("users"));
        assert_eq!(engine.get_table("users").unwrap().table_id(), table.table_id());
        assert_eq!(engine.get_table_by_id(table.table_id()).unwrap().table_name(), "users");
    }

    #[test]
    fn system_table_names_are_reserved() {
        let dir = tempdir().unwrap();
        let mut engine = StorageEngine::open(dir.path()).unwrap();
        assert!(engine.create_table("SYS_TABLES", user_columns()).is_err());
        assert!(engine.drop_table("SYS_COLUMNS").is_err());
    }

    #[test]
    fn drop_table_unregisters_it() {
        let dir = tempdir().unwrap();
        let mut engine = StorageEngine::open(dir.path()).unwrap();
        engine.create_table("users", user_columns()).unwrap();

        assert!(engine.drop_table("users").unwrap());
        assert!(!engine.table_exists("users"));
        assert!(!engine.drop_table("users").unwrap());
    }

    #[test]
    fn reopening_the_engine_restores_tables_and_rows() {
        let dir = tempdir().unwrap();
        {
            let mut engine = StorageEngine::open(dir.path()).unwrap();
            let table = engine.create_table("users", user_columns()).unwrap();
            table
                .insert_row(&Row::new(vec![Value::Int(1), Value::Varchar("alice".into())]))
                .unwrap();
            engine.close().unwrap();
        }

        let engine = StorageEngine::open(dir.path()).unwrap();
        assert!(engine.table_exists("users"));
        let table = engine.get_table("users").unwrap();
        let row = table.select_by_primary_key(&Value::Int(1)).unwrap();
        assert_eq!(row, Some(Row::new(vec![Value::Int(1), Value::Varchar("alice".into())])));
    }

    #[test]
    fn get_all_table_names_lists_every_user_table() {
        let dir = tempdir().unwrap();
        let mut engine = StorageEngine::open(dir.path()).unwrap();
        engine.create_table("users", user_columns()).unwrap();
        engine.create_table("posts", user_columns()).unwrap();

        let mut names = engine.get_all_table_names();
        names.sort();
        assert_eq!(names, vec!["posts".to_string(), "users".to_string()]);
    }
}
