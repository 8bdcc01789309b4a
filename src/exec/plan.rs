//! Turns a `Statement` into something runnable: either an operator tree
//! to iterate, or a one-shot command to execute. Resolving a table or
//! column that does not exist, or an empty table/column name, fails as
//! `invalid-plan` — folded into `Error::InvalidState` rather than a
//! dedicated variant.

use crate::common::{Error, Result};
use crate::engine::StorageEngine;
use crate::table::Table;
use crate::types::Column;

use super::ast::{CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, SelectStatement, Statement, UpdateStatement};
use super::operator::{
    CreateTableOperator, DeleteOperator, DropTableOperator, Executable, FilterOperator, InsertOperator, Operator,
    ProjectOperator, ScanOperator, UpdateOperator,
};

/// Either an iterator tree (`SELECT`) or a one-shot command (everything
/// else) — a statement is one or the other, never both.
pub enum PlanHandle {
    Query(Box<dyn Operator>),
    Command(Box<dyn Executable>),
}

pub fn build(statement: &Statement, engine: &StorageEngine) -> Result<PlanHandle> {
    match statement {
        Statement::Select(s) => build_select(s, engine).map(PlanHandle::Query),
        Statement::Insert(s) => build_insert(s, engine).map(PlanHandle::Command),
        Statement::Update(s) => build_update(s, engine).map(PlanHandle::Command),
        Statement::Delete(s) => build_delete(s, engine).map(PlanHandle::Command),
        Statement::CreateTable(s) => build_create_table(s).map(PlanHandle::Command),
        Statement::DropTable(s) => build_drop_table(s, engine).map(PlanHandle::Command),
    }
}

fn invalid_plan(message: impl Into<String>) -> Error {
    Error::InvalidState(format!("invalid-plan: {}", message.into()))
}

fn resolve_table(name: &str, engine: &StorageEngine) -> Result<Table> {
    if name.is_empty() {
        return Err(invalid_plan("table name must not be empty"));
    }
    engine
        .get_table(name)
        .ok_or_else(|| invalid_plan(format!("unknown table: {name}")))
}

fn check_column_exists(name: &str, columns: &[Column]) -> Result<()> {
    if name.is_empty() {
        return Err(invalid_plan("column name must not be empty"));
    }
    if columns.iter().any(|c| c.name_eq(name)) {
        Ok(())
    } else {
        Err(invalid_plan(format!("unknown column: {name}")))
    }
}

fn build_select(stmt: &SelectStatement, engine: &StorageEngine) -> Result<Box<dyn Operator>> {
    let table = resolve_table(&stmt.from, engine)?;
    let columns = table.columns();

    let mut child: Box<dyn Operator> = Box::new(ScanOperator::new(&table)?);

    if let Some(predicate) = &stmt.where_clause {
        child = Box::new(FilterOperator::new(child, predicate.clone(), columns.clone()));
    }

    if !stmt.select.is_empty() {
        for name in &stmt.select {
            check_column_exists(name, &columns)?;
        }
        child = Box::new(ProjectOperator::new(child, stmt.select.clone(), columns));
    }

    Ok(child)
}

fn build_insert(stmt: &InsertStatement, engine: &StorageEngine) -> Result<Box<dyn Executable>> {
    let table = resolve_table(&stmt.table, engine)?;
    let columns = table.columns();

    for name in &stmt.columns {
        check_column_exists(name, &columns)?;
    }

    Ok(Box::new(InsertOperator::new(table, stmt.columns.clone(), stmt.rows.clone())))
}

fn build_update(stmt: &UpdateStatement, engine: &StorageEngine) -> Result<Box<dyn Executable>> {
    let table = resolve_table(&stmt.table, engine)?;
    let columns = table.columns();

    for assignment in &stmt.assignments {
        check_column_exists(&assignment.column, &columns)?;
    }

    Ok(Box::new(UpdateOperator::new(
        table,
        stmt.assignments.clone(),
        stmt.where_clause.clone(),
    )))
}

fn build_delete(stmt: &DeleteStatement, engine: &StorageEngine) -> Result<Box<dyn Executable>> {
    let table = resolve_table(&stmt.table, engine)?;
    Ok(Box::new(DeleteOperator::new(table, stmt.where_clause.clone())))
}

fn build_create_table(stmt: &CreateTableStatement) -> Result<Box<dyn Executable>> {
    if stmt.name.is_empty() {
        return Err(invalid_plan("table name must not be empty"));
    }
    if stmt.columns.is_empty() {
        return Err(invalid_plan("table must have at least one column"));
    }

    let columns = stmt
        .columns
        .iter()
        .map(|def| Column::new(def.name.clone(), def.col_type, def.length, def.nullable))
        .collect::<Result<Vec<_>>>()?;

    Ok(Box::new(CreateTableOperator::new(stmt.name.clone(), columns)))
}

fn build_drop_table(stmt: &DropTableStatement, engine: &StorageEngine) -> Result<Box<dyn Executable>> {
    resolve_table(&stmt.name, engine)?;
    Ok(Box::new(DropTableOperator::new(stmt.name.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ast::{BinOp, Expr};
    use crate::types::{ColumnType, Row, Value};
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
        let table = engine.get_table("users").unwrap();
        table
            .insert_row(&Row::new(vec![Value::Int(1), Value::Varchar("alice".into())]))
            .unwrap();
        (engine, dir)
    }

    #[test]
    fn select_star_builds_a_bare_scan() {
        let (engine, _dir) = engine_with_users();
        let stmt = Statement::Select(SelectStatement {
            select: vec![],
            from: "users".into(),
            where_clause: None,
        });

        let PlanHandle::Query(mut op) = build(&stmt, &engine).unwrap() else {
            panic!("expected a query plan");
        };
        assert!(op.has_next().unwrap());
        let row = op.next().unwrap();
        assert_eq!(row.get(0), Some(&Value::Int(1)));
    }

    #[test]
    fn select_unknown_table_is_invalid_plan() {
        let (engine, _dir) = engine_with_users();
        let stmt = Statement::Select(SelectStatement {
            select: vec![],
            from: "missing".into(),
            where_clause: None,
        });
        assert!(matches!(build(&stmt, &engine), Err(Error::InvalidState(_))));
    }

    #[test]
    fn select_unknown_projected_column_is_invalid_plan() {
        let (engine, _dir) = engine_with_users();
        let stmt = Statement::Select(SelectStatement {
            select: vec!["nope".into()],
            from: "users".into(),
            where_clause: None,
        });
        assert!(matches!(build(&stmt, &engine), Err(Error::InvalidState(_))));
    }

    #[test]
    fn insert_plan_runs_through_execute() {
        let (mut engine, _dir) = engine_with_users();
        let stmt = Statement::Insert(InsertStatement {
            table: "users".into(),
            columns: vec![],
            rows: vec![vec![Expr::Literal(Value::Int(2)), Expr::Literal(Value::Varchar("bob".into()))]],
        });

        let PlanHandle::Command(mut cmd) = build(&stmt, &engine).unwrap() else {
            panic!("expected a command plan");
        };
        cmd.execute(&mut engine).unwrap();
        assert_eq!(
            engine
                .get_table("users")
                .unwrap()
                .select_by_primary_key(&Value::Int(2))
                .unwrap()
                .unwrap()
                .get(1),
            Some(&Value::Varchar("bob".into()))
        );
    }

    #[test]
    fn delete_plan_resolves_where_and_executes() {
        let (mut engine, _dir) = engine_with_users();
        let stmt = Statement::Delete(DeleteStatement {
            table: "users".into(),
            where_clause: Some(Expr::Binary(
                Box::new(Expr::Column("id".into())),
                BinOp::Eq,
                Box::new(Expr::Literal(Value::Int(1))),
            )),
        });

        let PlanHandle::Command(mut cmd) = build(&stmt, &engine).unwrap() else {
            panic!("expected a command plan");
        };
        cmd.execute(&mut engine).unwrap();
        assert!(engine
            .get_table("users")
            .unwrap()
            .select_by_primary_key(&Value::Int(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn drop_table_plan_rejects_unknown_table() {
        let (engine, _dir) = engine_with_users();
        let stmt = Statement::DropTable(DropTableStatement { name: "missing".into() });
        assert!(matches!(build(&stmt, &engine), Err(Error::InvalidState(_))));
    }

    #[test]
    fn create_table_plan_executes_against_the_engine() {
        let (mut engine, _dir) = engine_with_users();
        let stmt = Statement::CreateTable(CreateTableStatement {
            name: "posts".into(),
            columns: vec![super::super::ast::ColumnDefinition {
                name: "id".into(),
                col_type: ColumnType::Int,
                length: 0,
                nullable: false,
            }],
        });

        let PlanHandle::Command(mut cmd) = build(&stmt, &engine).unwrap() else {
            panic!("expected a command plan");
        };
        cmd.execute(&mut engine).unwrap();
        assert!(engine.table_exists("posts"));
    }
}
