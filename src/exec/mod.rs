//! Statement execution: a minimal statement/expression tree, the
//! expression evaluator, Volcano-model operators, and the plan builder
//! that ties a `Statement` to a `StorageEngine`.

pub mod ast;
pub mod expr;
pub mod operator;
pub mod plan;

pub use ast::{
    Assignment, BinOp, ColumnDefinition, CreateTableStatement, DeleteStatement, DropTableStatement, Expr,
    InsertStatement, SelectStatement, Statement, UpdateStatement,
};
pub use expr::evaluate;
pub use operator::{
    CreateTableOperator, DeleteOperator, DropTableOperator, ExecuteResult, Executable, FilterOperator,
    InsertOperator, Operator, ProjectOperator, ScanOperator, UpdateOperator,
};
pub use plan::{build, PlanHandle};
