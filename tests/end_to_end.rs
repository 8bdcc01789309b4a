//! End-to-end scenarios spanning the engine, the catalog, and the
//! Volcano-model executor.

use kvrelay::engine::StorageEngine;
use kvrelay::exec::{Assignment, BinOp, DeleteStatement, Expr, PlanHandle, SelectStatement, Statement, UpdateStatement};
use kvrelay::storage::record;
use kvrelay::types::{Column, ColumnType, Row, Value};
use kvrelay::Error;
use tempfile::tempdir;

fn users_columns() -> Vec<Column> {
    vec![
        Column::new("id", ColumnType::Int, 0, false).unwrap(),
        Column::new("name", ColumnType::Varchar, 100, false).unwrap(),
        Column::new("age", ColumnType::Int, 0, false).unwrap(),
    ]
}

fn seed_users(engine: &mut StorageEngine) {
    engine.create_table("users", users_columns()).unwrap();
    let table = engine.get_table("users").unwrap();
    for (id, name, age) in [(1, "Alice", 25), (2, "Bob", 30), (3, "Charlie", 35)] {
        table
            .insert_row(&Row::new(vec![Value::Int(id), Value::Varchar(name.into()), Value::Int(age)]))
            .unwrap();
    }
}

/// S1: insert three rows, look one up by primary key, and confirm a
/// full scan sees all three.
#[test]
fn s1_insert_and_lookup() {
    let dir = tempdir().unwrap();
    let mut engine = StorageEngine::open(dir.path()).unwrap();
    seed_users(&mut engine);

    let table = engine.get_table("users").unwrap();
    let bob = table.select_by_primary_key(&Value::Int(2)).unwrap().unwrap();
    assert_eq!(bob, Row::new(vec![Value::Int(2), Value::Varchar("Bob".into()), Value::Int(30)]));

    let mut ids: Vec<i32> = table
        .full_table_scan()
        .unwrap()
        .iter()
        .map(|r| match r.get(0) {
            Some(Value::Int(id)) => *id,
            _ => panic!("expected an int id"),
        })
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3]);
}

/// S2: `SELECT name FROM users WHERE age > 25` yields Bob then Charlie,
/// in ascending primary-key order.
#[test]
fn s2_filter_and_project() {
    let dir = tempdir().unwrap();
    let mut engine = StorageEngine::open(dir.path()).unwrap();
    seed_users(&mut engine);

    let stmt = Statement::Select(SelectStatement {
        select: vec!["name".into()],
        from: "users".into(),
        where_clause: Some(Expr::Binary(
            Box::new(Expr::Column("age".into())),
            BinOp::Gt,
            Box::new(Expr::Literal(Value::Int(25))),
        )),
    });

    let PlanHandle::Query(mut plan) = kvrelay::exec::build(&stmt, &engine).unwrap() else {
        panic!("expected a query plan");
    };

    let mut names = Vec::new();
    while plan.has_next().unwrap() {
        let row = plan.next().unwrap();
        names.push(row.values);
    }

    assert_eq!(
        names,
        vec![vec![Value::Varchar("Bob".into())], vec![Value::Varchar("Charlie".into())]]
    );
}

/// S3: `DELETE FROM users WHERE id = 2` leaves rows 1 and 3 behind.
#[test]
fn s3_delete() {
    let dir = tempdir().unwrap();
    let mut engine = StorageEngine::open(dir.path()).unwrap();
    seed_users(&mut engine);

    let stmt = Statement::Delete(DeleteStatement {
        table: "users".into(),
        where_clause: Some(Expr::Binary(
            Box::new(Expr::Column("id".into())),
            BinOp::Eq,
            Box::new(Expr::Literal(Value::Int(2))),
        )),
    });
    let PlanHandle::Command(mut cmd) = kvrelay::exec::build(&stmt, &engine).unwrap() else {
        panic!("expected a command plan");
    };
    cmd.execute(&mut engine).unwrap();

    let table = engine.get_table("users").unwrap();
    let mut ids: Vec<i32> = table
        .full_table_scan()
        .unwrap()
        .iter()
        .map(|r| match r.get(0) {
            Some(Value::Int(id)) => *id,
            _ => panic!("expected an int id"),
        })
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 3]);
    assert!(table.select_by_primary_key(&Value::Int(2)).unwrap().is_none());
}

/// S4: `UPDATE users SET age = 26 WHERE id = 1` changes only that row;
/// attempting to update the primary-key column fails.
#[test]
fn s4_update() {
    let dir = tempdir().unwrap();
    let mut engine = StorageEngine::open(dir.path()).unwrap();
    seed_users(&mut engine);

    let stmt = Statement::Update(UpdateStatement {
        table: "users".into(),
        assignments: vec![Assignment {
            column: "age".into(),
            value: Expr::Literal(Value::Int(26)),
        }],
        where_clause: Some(Expr::Binary(
            Box::new(Expr::Column("id".into())),
            BinOp::Eq,
            Box::new(Expr::Literal(Value::Int(1))),
        )),
    });
    let PlanHandle::Command(mut cmd) = kvrelay::exec::build(&stmt, &engine).unwrap() else {
        panic!("expected a command plan");
    };
    cmd.execute(&mut engine).unwrap();

    let table = engine.get_table("users").unwrap();
    let alice = table.select_by_primary_key(&Value::Int(1)).unwrap().unwrap();
    assert_eq!(alice.get(2), Some(&Value::Int(26)));

    let reject_pk_update = Statement::Update(UpdateStatement {
        table: "users".into(),
        assignments: vec![Assignment {
            column: "id".into(),
            value: Expr::Literal(Value::Int(99)),
        }],
        where_clause: None,
    });
    let PlanHandle::Command(mut cmd) = kvrelay::exec::build(&reject_pk_update, &engine).unwrap() else {
        panic!("expected a command plan");
    };
    assert!(matches!(cmd.execute(&mut engine), Err(Error::InvalidArgument(_))));
}

/// S5: a NULL VARCHAR round-trips through the clustered index, and the
/// serialized record carries an empty variable-length list with the
/// NULL bitmap's bit 1 set.
#[test]
fn s5_null_varchar_round_trips() {
    let dir = tempdir().unwrap();
    let mut engine = StorageEngine::open(dir.path()).unwrap();
    engine
        .create_table(
            "users",
            vec![
                Column::new("id", ColumnType::Int, 0, false).unwrap(),
                Column::new("name", ColumnType::Varchar, 100, true).unwrap(),
                Column::new("age", ColumnType::Int, 0, false).unwrap(),
            ],
        )
        .unwrap();

    let table = engine.get_table("users").unwrap();
    let row = Row::new(vec![Value::Int(1), Value::Null, Value::Int(25)]);
    table.insert_row(&row).unwrap();

    let scanned = table.full_table_scan().unwrap();
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].get(1), Some(&Value::Null));

    let bytes = record::serialize(&row, &table.columns()).unwrap();
    // 3 columns fit in one bitmap byte; bit 1 (name) is set, bits 0 and
    // 2 are not.
    assert_eq!(bytes[0] & 0b0000_0111, 0b0000_0010);
    // No variable-length entries follow the bitmap: id and age are
    // fixed-width, and name is null.
    assert_eq!(bytes.len(), 1 + 4 + 4);
}

/// S6: a table created before a restart is still present and its row
/// is still readable after reopening the engine over the same
/// directory.
#[test]
fn s6_restart_persistence() {
    let dir = tempdir().unwrap();
    {
        let mut engine = StorageEngine::open(dir.path()).unwrap();
        let table = engine
            .create_table(
                "products",
                vec![
                    Column::new("id", ColumnType::Int, 0, false).unwrap(),
                    Column::new("title", ColumnType::Varchar, 200, false).unwrap(),
                ],
            )
            .unwrap();
        table
            .insert_row(&Row::new(vec![Value::Int(1), Value::Varchar("Widget".into())]))
            .unwrap();
        engine.close().unwrap();
    }

    let engine = StorageEngine::open(dir.path()).unwrap();
    assert!(engine.table_exists("products"));
    let table = engine.get_table("products").unwrap();
    let rows = table.full_table_scan().unwrap();
    assert_eq!(rows, vec![Row::new(vec![Value::Int(1), Value::Varchar("Widget".into())])]);
}
