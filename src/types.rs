//! Scalar types, column descriptors, and rows.
//!
//! These are the logical building blocks the record serializer, B+Tree
//! leaves, and executor all operate on.

use crate::common::{Error, Result};

/// The scalar types a column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    BigInt,
    Double,
    Boolean,
    /// UTF-8 text up to `length` bytes. `length` lives on `Column`, not
    /// here, so this variant carries no payload.
    Varchar,
    /// Milliseconds since the Unix epoch.
    Date,
    /// Milliseconds since the Unix epoch.
    Timestamp,
}

impl ColumnType {
    /// Fixed on-disk width, or `None` for variable-length types.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            ColumnType::Int => Some(4),
            ColumnType::BigInt => Some(8),
            ColumnType::Double => Some(8),
            ColumnType::Boolean => Some(1),
            ColumnType::Date => Some(8),
            ColumnType::Timestamp => Some(8),
            ColumnType::Varchar => None,
        }
    }

    pub fn is_varchar(&self) -> bool {
        matches!(self, ColumnType::Varchar)
    }
}

/// An immutable column descriptor.
///
/// Invariant: `type == Varchar` iff `length > 0`; `length` is `0` for
/// every other type.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub col_type: ColumnType,
    pub length: u16,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, col_type: ColumnType, length: u16, nullable: bool) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("column name must not be empty".into()));
        }

        match col_type {
            ColumnType::Varchar if length == 0 => {
                return Err(Error::InvalidArgument(format!(
                    "column {name}: VARCHAR requires length > 0"
                )))
            }
            ColumnType::Varchar => {}
            _ if length != 0 => {
                return Err(Error::InvalidArgument(format!(
                    "column {name}: non-VARCHAR columns must have length 0"
                )))
            }
            _ => {}
        }

        Ok(Self {
            name,
            col_type,
            length,
            nullable,
        })
    }

    /// Case-insensitive name comparison, matching the spec's
    /// case-insensitive-unique column-name rule.
    pub fn name_eq(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

/// Validate that `columns` has no two entries whose names collide
/// case-insensitively.
pub fn check_unique_column_names(columns: &[Column]) -> Result<()> {
    for (i, a) in columns.iter().enumerate() {
        for b in &columns[i + 1..] {
            if a.name_eq(&b.name) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate column name: {}",
                    a.name
                )));
            }
        }
    }
    Ok(())
}

/// A single scalar value, or SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    BigInt(i64),
    Double(f64),
    Boolean(bool),
    Varchar(String),
    Date(i64),
    Timestamp(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce this value to a boolean the way `BINARY logical` operators do:
    /// `null -> false`, numeric `-> != 0`, string `-> non-empty`, boolean
    /// `-> itself`.
    pub fn coerce_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(v) => *v != 0,
            Value::BigInt(v) => *v != 0,
            Value::Double(v) => *v != 0.0,
            Value::Boolean(v) => *v,
            Value::Varchar(s) => !s.is_empty(),
            Value::Date(v) | Value::Timestamp(v) => *v != 0,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "INT",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Boolean(_) => "BOOLEAN",
            Value::Varchar(_) => "VARCHAR",
            Value::Date(_) => "DATE",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }
}

/// An ordered sequence of values aligned positionally to a `Column` list.
/// Rows carry no schema of their own — structure belongs to the table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Look up a value by case-insensitive column name.
    pub fn get_by_name<'a>(&'a self, columns: &[Column], name: &str) -> Option<&'a Value> {
        columns
            .iter()
            .position(|c| c.name_eq(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Validate shape, per-column type, and nullability against `columns`.
    pub fn validate(&self, columns: &[Column]) -> Result<()> {
        if self.values.len() != columns.len() {
            return Err(Error::InvalidArgument(format!(
                "row has {} values but table has {} columns",
                self.values.len(),
                columns.len()
            )));
        }

        for (value, column) in self.values.iter().zip(columns) {
            if value.is_null() {
                if !column.nullable {
                    return Err(Error::InvalidArgument(format!(
                        "column {} is not nullable",
                        column.name
                    )));
                }
                continue;
            }

            let matches_type = matches!(
                (value, column.col_type),
                (Value::Int(_), ColumnType::Int)
                    | (Value::BigInt(_), ColumnType::BigInt)
                    | (Value::Double(_), ColumnType::Double)
                    | (Value::Boolean(_), ColumnType::Boolean)
                    | (Value::Varchar(_), ColumnType::Varchar)
                    | (Value::Date(_), ColumnType::Date)
                    | (Value::Timestamp(_), ColumnType::Timestamp)
            );
            if !matches_type {
                return Err(Error::InvalidArgument(format!(
                    "column {} expected {:?}, got {}",
                    column.name,
                    column.col_type,
                    value.type_name()
                )));
            }

            if let (Value::Varchar(s), ColumnType::Varchar) = (value, column.col_type) {
                if s.len() > column.length as usize {
                    return Err(Error::InvalidArgument(format!(
                        "column {}: value length {} exceeds declared length {}",
                        column.name,
                        s.len(),
                        column.length
                    )));
                }
            }
        }

        Ok(())
    }
}
