//! Volcano-model operators.
//!
//! `Scan`/`Filter`/`Project` expose the iterator contract (`has_next`/
//! `next`); DDL/DML operators expose a distinct one-shot `execute`
//! contract, per the "operator is an iterator, except when it isn't"
//! resolution — calling the wrong one on the wrong kind is a type error,
//! not a runtime one.

use crate::common::{Error, Result};
use crate::engine::StorageEngine;
use crate::table::Table;
use crate::types::{Column, Row, Value};

use super::ast::{Assignment, Expr};
use super::expr::evaluate;

/// The iterator contract for `Scan`/`Filter`/`Project`.
pub trait Operator {
    fn has_next(&mut self) -> Result<bool>;
    fn next(&mut self) -> Result<Row>;
}

/// What a one-shot DDL/DML operator produced.
pub enum ExecuteResult {
    RowCount(usize),
    Table(Table),
    Success(bool),
}

/// The one-shot contract for DDL/DML operators.
pub trait Executable {
    fn execute(&mut self, engine: &mut StorageEngine) -> Result<ExecuteResult>;
}

// ============================================================================
// Iterator operators
// ============================================================================

pub struct ScanOperator {
    rows: std::vec::IntoIter<Row>,
    peeked: Option<Row>,
}

impl ScanOperator {
    pub fn new(table: &Table) -> Result<Self> {
        Ok(Self {
            rows: table.full_table_scan()?.into_iter(),
            peeked: None,
        })
    }
}

impl Operator for ScanOperator {
    fn has_next(&mut self) -> Result<bool> {
        if self.peeked.is_none() {
            self.peeked = self.rows.next();
        }
        Ok(self.peeked.is_some())
    }

    fn next(&mut self) -> Result<Row> {
        if !self.has_next()? {
            return Err(Error::InvalidState("next() called with no rows remaining".into()));
        }
        Ok(self.peeked.take().expect("has_next confirmed a row is buffered"))
    }
}

pub struct FilterOperator {
    child: Box<dyn Operator>,
    predicate: Expr,
    columns: Vec<Column>,
    peeked: Option<Row>,
}

impl FilterOperator {
    pub fn new(child: Box<dyn Operator>, predicate: Expr, columns: Vec<Column>) -> Self {
        Self {
            child,
            predicate,
            columns,
            peeked: None,
        }
    }

    fn advance(&mut self) -> Result<()> {
        while self.peeked.is_none() && self.child.has_next()? {
            let row = self.child.next()?;
            match evaluate(&self.predicate, &row, &self.columns)? {
                Value::Boolean(true) => self.peeked = Some(row),
                Value::Boolean(false) => {}
                _ => return Err(Error::PredicateNotBoolean),
            }
        }
        Ok(())
    }
}

impl Operator for FilterOperator {
    fn has_next(&mut self) -> Result<bool> {
        self.advance()?;
        Ok(self.peeked.is_some())
    }

    fn next(&mut self) -> Result<Row> {
        self.advance()?;
        self.peeked
            .take()
            .ok_or_else(|| Error::InvalidState("next() called with no rows remaining".into()))
    }
}

pub struct ProjectOperator {
    child: Box<dyn Operator>,
    select_items: Vec<String>,
    columns: Vec<Column>,
}

impl ProjectOperator {
    /// An empty `select_items` means `*` — rows pass through unchanged.
    pub fn new(child: Box<dyn Operator>, select_items: Vec<String>, columns: Vec<Column>) -> Self {
        Self {
            child,
            select_items,
            columns,
        }
    }
}

impl Operator for ProjectOperator {
    fn has_next(&mut self) -> Result<bool> {
        self.child.has_next()
    }

    fn next(&mut self) -> Result<Row> {
        let row = self.child.next()?;
        if self.select_items.is_empty() {
            return Ok(row);
        }

        let mut values = Vec::with_capacity(self.select_items.len());
        for name in &self.select_items {
            let value = row
                .get_by_name(&self.columns, name)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("no such column: {name}")))?;
            values.push(value);
        }
        Ok(Row::new(values))
    }
}

// ============================================================================
// One-shot DDL/DML operators
// ============================================================================

pub struct InsertOperator {
    table: Table,
    column_names: Vec<String>,
    value_rows: Vec<Vec<Expr>>,
    executed: bool,
}

impl InsertOperator {
    pub fn new(table: Table, column_names: Vec<String>, value_rows: Vec<Vec<Expr>>) -> Self {
        Self {
            table,
            column_names,
            value_rows,
            executed: false,
        }
    }
}

impl Executable for InsertOperator {
    fn execute(&mut self, _engine: &mut StorageEngine) -> Result<ExecuteResult> {
        if self.executed {
            return Err(Error::InvalidState("already-executed".into()));
        }
        self.executed = true;

        let columns = self.table.columns();
        let mut inserted = 0;

        for value_exprs in &self.value_rows {
            let mut raw = Vec::with_capacity(value_exprs.len());
            for expr in value_exprs {
                let Expr::Literal(value) = expr else {
                    return Err(Error::InvalidArgument("insert values must be literals".into()));
                };
                raw.push(value.clone());
            }

            let row = if self.column_names.is_empty() {
                if raw.len() != columns.len() {
                    return Err(Error::InvalidArgument(format!(
                        "row has {} values but table has {} columns",
                        raw.len(),
                        columns.len()
                    )));
                }
                let values = raw
                    .into_iter()
                    .zip(&columns)
                    .map(|(v, c)| coerce_to_column(v, c))
                    .collect::<Result<Vec<_>>>()?;
                Row::new(values)
            } else {
                let mut values = vec![Value::Null; columns.len()];
                for (name, value) in self.column_names.iter().zip(raw) {
                    let idx = columns
                        .iter()
                        .position(|c| c.name_eq(name))
                        .ok_or_else(|| Error::NotFound(format!("no such column: {name}")))?;
                    values[idx] = coerce_to_column(value, &columns[idx])?;
                }
                Row::new(values)
            };

            self.table.insert_row(&row)?;
            inserted += 1;
        }

        Ok(ExecuteResult::RowCount(inserted))
    }
}

/// Narrow literal-to-column-type coercion: numeric sources truncate to
/// `INT` via their integer value, string sources parse to `INT`, and any
/// source converts to `VARCHAR` via its display form. Anything else must
/// already match the column's type exactly.
fn coerce_to_column(value: Value, column: &Column) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    use crate::types::ColumnType;
    match column.col_type {
        ColumnType::Int => match value {
            Value::Int(v) => Ok(Value::Int(v)),
            Value::BigInt(v) => Ok(Value::Int(v as i32)),
            Value::Double(v) => Ok(Value::Int(v as i32)),
            Value::Varchar(s) => s
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|_| Error::TypeMismatch(format!("cannot parse \"{s}\" as INT"))),
            other => Err(Error::TypeMismatch(format!("cannot coerce {} to INT", other.type_name()))),
        },
        ColumnType::Varchar => Ok(Value::Varchar(display_value(&value))),
        _ => {
            let matches = matches!(
                (&value, column.col_type),
                (Value::BigInt(_), ColumnType::BigInt)
                    | (Value::Double(_), ColumnType::Double)
                    | (Value::Boolean(_), ColumnType::Boolean)
                    | (Value::Date(_), ColumnType::Date)
                    | (Value::Timestamp(_), ColumnType::Timestamp)
            );
            if matches {
                Ok(value)
            } else {
                Err(Error::TypeMismatch(format!(
                    "cannot coerce {} to {:?}",
                    value.type_name(),
                    column.col_type
                )))
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Boolean(v) => v.to_string(),
        Value::Varchar(s) => s.clone(),
        Value::Date(v) | Value::Timestamp(v) => v.to_string(),
    }
}

pub struct UpdateOperator {
    table: Table,
    assignments: Vec<Assignment>,
    where_clause: Option<Expr>,
    executed: bool,
}

impl UpdateOperator {
    pub fn new(table: Table, assignments: Vec<Assignment>, where_clause: Option<Expr>) -> Self {
        Self {
            table,
            assignments,
            where_clause,
            executed: false,
        }
    }
}

impl Executable for UpdateOperator {
    fn execute(&mut self, _engine: &mut StorageEngine) -> Result<ExecuteResult> {
        if self.executed {
            return Err(Error::InvalidState("already-executed".into()));
        }
        self.executed = true;

        let columns = self.table.columns();
        let pk_column = &columns[0].name.clone();
        for assignment in &self.assignments {
            if assignment.column.eq_ignore_ascii_case(pk_column) {
                return Err(Error::InvalidArgument("cannot update the primary-key column".into()));
            }
        }

        let mut updated = 0;
        for row in self.table.full_table_scan()? {
            if !row_matches(&self.where_clause, &row, &columns)? {
                continue;
            }

            let mut values = row.values.clone();
            for assignment in &self.assignments {
                let idx = columns
                    .iter()
                    .position(|c| c.name_eq(&assignment.column))
                    .ok_or_else(|| Error::NotFound(format!("no such column: {}", assignment.column)))?;
                values[idx] = evaluate(&assignment.value, &row, &columns)?;
            }

            let pk = row.get(0).cloned().unwrap_or(Value::Null);
            updated += self.table.update_row(&pk, &Row::new(values))?;
        }

        Ok(ExecuteResult::RowCount(updated))
    }
}

pub struct DeleteOperator {
    table: Table,
    where_clause: Option<Expr>,
    executed: bool,
}

impl DeleteOperator {
    pub fn new(table: Table, where_clause: Option<Expr>) -> Self {
        Self {
            table,
            where_clause,
            executed: false,
        }
    }
}

impl Executable for DeleteOperator {
    fn execute(&mut self, _engine: &mut StorageEngine) -> Result<ExecuteResult> {
        if self.executed {
            return Err(Error::InvalidState("already-executed".into()));
        }
        self.executed = true;

        let columns = self.table.columns();

        // Two-pass: collect matching primary keys first to avoid
        // invalidating the scan by deleting mid-iteration.
        let mut matching_pks = Vec::new();
        for row in self.table.full_table_scan()? {
            if row_matches(&self.where_clause, &row, &columns)? {
                matching_pks.push(row.get(0).cloned().unwrap_or(Value::Null));
            }
        }

        let mut deleted = 0;
        for pk in matching_pks {
            deleted += self.table.delete_row(&pk)?;
        }

        Ok(ExecuteResult::RowCount(deleted))
    }
}

fn row_matches(where_clause: &Option<Expr>, row: &Row, columns: &[Column]) -> Result<bool> {
    let Some(predicate) = where_clause else {
        return Ok(true);
    };
    match evaluate(predicate, row, columns)? {
        Value::Boolean(b) => Ok(b),
        _ => Err(Error::PredicateNotBoolean),
    }
}

pub struct CreateTableOperator {
    name: String,
    columns: Vec<Column>,
    executed: bool,
}

impl CreateTableOperator {
    pub fn new(name: String, columns: Vec<Column>) -> Self {
        Self {
            name,
            columns,
            executed: false,
        }
    }
}

impl Executable for CreateTableOperator {
    fn execute(&mut self, engine: &mut StorageEngine) -> Result<ExecuteResult> {
        if self.executed {
            return Err(Error::InvalidState("already-executed".into()));
        }
        self.executed = true;
        let table = engine.create_table(&self.name, self.columns.clone())?;
        Ok(ExecuteResult::Table(table))
    }
}

pub struct DropTableOperator {
    name: String,
    executed: bool,
}

impl DropTableOperator {
    pub fn new(name: String) -> Self {
        Self { name, executed: false }
    }
}

impl Executable for DropTableOperator {
    fn execute(&mut self, engine: &mut StorageEngine) -> Result<ExecuteResult> {
        if self.executed {
            return Err(Error::InvalidState("already-executed".into()));
        }
        self.executed = true;
        let dropped = engine.drop_table(&self.name)?;
        Ok(ExecuteResult::Success(dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ast::BinOp;
    use crate::types::ColumnType;
    use tempfile::tempdir;

    fn engine_with_users() -> (StorageEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut engine = StorageEngine::open(dir.path()).unwrap();
        engine
            .create_table(
                "users",
                vec![
                    Column::new("id", ColumnType::Int, 0, false).unwrap(),
                    Column::new("name", ColumnType::Varchar, 32, true).unwrap(),
                ],
            )
            .unwrap();
        (engine, dir)
    }

    #[test]
    fn scan_yields_every_row() {
        let (mut engine, _dir) = engine_with_users();
        let table = engine.get_table("users").unwrap();
        table
            .insert_row(&Row::new(vec![Value::Int(1), Value::Varchar("a".into())]))
            .unwrap();
        table
            .insert_row(&Row::new(vec![Value::Int(2), Value::Varchar("b".into())]))
            .unwrap();

        let mut scan = ScanOperator::new(&table).unwrap();
        let mut count = 0;
        while scan.has_next().unwrap() {
            scan.next().unwrap();
            count += 1;
        }
        assert_eq!(count, 2);
        let _ = &mut engine;
    }

    #[test]
    fn filter_only_yields_matching_rows() {
        let (engine, _dir) = engine_with_users();
        let table = engine.get_table("users").unwrap();
        table
            .insert_row(&Row::new(vec![Value::Int(1), Value::Varchar("a".into())]))
            .unwrap();
        table
            .insert_row(&Row::new(vec![Value::Int(2), Value::Varchar("b".into())]))
            .unwrap();

        let scan = ScanOperator::new(&table).unwrap();
        let predicate = Expr::Binary(
            Box::new(Expr::Column("id".into())),
            BinOp::Eq,
            Box::new(Expr::Literal(Value::Int(2))),
        );
        let mut filter = FilterOperator::new(Box::new(scan), predicate, table.columns());

        assert!(filter.has_next().unwrap());
        let row = filter.next().unwrap();
        assert_eq!(row.get(0), Some(&Value::Int(2)));
        assert!(!filter.has_next().unwrap());
    }

    #[test]
    fn project_selects_named_columns_in_order() {
        let (engine, _dir) = engine_with_users();
        let table = engine.get_table("users").unwrap();
        table
            .insert_row(&Row::new(vec![Value::Int(1), Value::Varchar("a".into())]))
            .unwrap();

        let scan = ScanOperator::new(&table).unwrap();
        let mut project = ProjectOperator::new(Box::new(scan), vec!["name".into()], table.columns());

        assert!(project.has_next().unwrap());
        let row = project.next().unwrap();
        assert_eq!(row.values, vec![Value::Varchar("a".into())]);
    }

    #[test]
    fn insert_operator_runs_once() {
        let (mut engine, _dir) = engine_with_users();
        let table = engine.get_table("users").unwrap();
        let mut insert = InsertOperator::new(
            table,
            vec![],
            vec![vec![Expr::Literal(Value::Int(1)), Expr::Literal(Value::Varchar("a".into()))]],
        );

        let result = insert.execute(&mut engine).unwrap();
        assert!(matches!(result, ExecuteResult::RowCount(1)));
        assert!(matches!(insert.execute(&mut engine), Err(Error::InvalidState(_))));
    }

    #[test]
    fn insert_operator_coerces_string_to_int() {
        let (mut engine, _dir) = engine_with_users();
        let table = engine.get_table("users").unwrap();
        let mut insert = InsertOperator::new(
            table.clone(),
            vec![],
            vec![vec![
                Expr::Literal(Value::Varchar("7".into())),
                Expr::Literal(Value::Varchar("a".into())),
            ]],
        );
        insert.execute(&mut engine).unwrap();

        assert_eq!(table.select_by_primary_key(&Value::Int(7)).unwrap().is_some(), true);
    }

    #[test]
    fn update_operator_forbids_primary_key_assignment() {
        let (mut engine, _dir) = engine_with_users();
        let table = engine.get_table("users").unwrap();
        table
            .insert_row(&Row::new(vec![Value::Int(1), Value::Varchar("a".into())]))
            .unwrap();

        let mut update = UpdateOperator::new(
            table,
            vec![Assignment {
                column: "id".into(),
                value: Expr::Literal(Value::Int(2)),
            }],
            None,
        );
        assert!(update.execute(&mut engine).is_err());
    }

    #[test]
    fn delete_operator_is_two_pass_and_returns_count() {
        let (mut engine, _dir) = engine_with_users();
        let table = engine.get_table("users").unwrap();
        for i in 1..=3 {
            table
                .insert_row(&Row::new(vec![Value::Int(i), Value::Varchar("a".into())]))
                .unwrap();
        }

        let mut delete = DeleteOperator::new(table.clone(), None);
        let result = delete.execute(&mut engine).unwrap();
        assert!(matches!(result, ExecuteResult::RowCount(3)));
        assert_eq!(table.full_table_scan().unwrap().len(), 0);
    }

    #[test]
    fn create_and_drop_table_operators_delegate_to_the_engine() {
        let dir = tempdir().unwrap();
        let mut engine = StorageEngine::open(dir.path()).unwrap();

        let mut create = CreateTableOperator::new(
            "posts".into(),
            vec![Column::new("id", ColumnType::Int, 0, false).unwrap()],
        );
        let result = create.execute(&mut engine).unwrap();
        assert!(matches!(result, ExecuteResult::Table(_)));
        assert!(engine.table_exists("posts"));

        let mut drop = DropTableOperator::new("posts".into());
        let result = drop.execute(&mut engine).unwrap();
        assert!(matches!(result, ExecuteResult::Success(true)));
        assert!(!engine.table_exists("posts"));
    }
}
