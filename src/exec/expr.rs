//! Expression evaluation over `(&Row, &[Column])`.
//!
//! Pure: evaluating the same expression against the same row and schema
//! always yields the same value or the same error.

use crate::common::{Error, Result};
use crate::types::{Column, Row, Value};

use super::ast::{BinOp, Expr};

pub fn evaluate(expr: &Expr, row: &Row, columns: &[Column]) -> Result<Value> {
    match expr {
        Expr::Column(name) => row
            .get_by_name(columns, name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no such column: {name}"))),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Not(inner) => Ok(Value::Boolean(!evaluate(inner, row, columns)?.coerce_bool())),
        Expr::Binary(left, op, right) => {
            let l = evaluate(left, row, columns)?;
            let r = evaluate(right, row, columns)?;
            eval_binary(&l, *op, &r)
        }
    }
}

fn eval_binary(l: &Value, op: BinOp, r: &Value) -> Result<Value> {
    match op {
        BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            Ok(Value::Boolean(eval_comparison(l, op, r)?))
        }
        BinOp::And => Ok(Value::Boolean(l.coerce_bool() && r.coerce_bool())),
        BinOp::Or => Ok(Value::Boolean(l.coerce_bool() || r.coerce_bool())),
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => eval_arithmetic(l, op, r),
    }
}

/// Null on either side collapses a comparison to `false` — a documented
/// departure from three-valued SQL logic. Otherwise both sides must be
/// the same concrete type.
fn eval_comparison(l: &Value, op: BinOp, r: &Value) -> Result<bool> {
    if l.is_null() || r.is_null() {
        return Ok(false);
    }

    use std::cmp::Ordering;
    let ordering = match (l, r) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b).ok_or_else(|| {
            Error::TypeMismatch("cannot compare NaN values".into())
        })?,
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (Value::Varchar(a), Value::Varchar(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        _ => {
            return Err(Error::TypeMismatch(format!(
                "cannot compare {} with {}",
                l.type_name(),
                r.type_name()
            )))
        }
    };

    Ok(match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::NotEq => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!("eval_comparison only called for comparison operators"),
    })
}

/// Both sides must be the same numeric type; the result is that type.
/// Division and modulo by zero fail with `ArithmeticError`.
fn eval_arithmetic(l: &Value, op: BinOp, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_arith(*a, op, *b)?)),
        (Value::BigInt(a), Value::BigInt(b)) => Ok(Value::BigInt(bigint_arith(*a, op, *b)?)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(double_arith(*a, op, *b)?)),
        _ => Err(Error::TypeMismatch(format!(
            "cannot apply {op:?} to {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn int_arith(a: i32, op: BinOp, b: i32) -> Result<i32> {
    match op {
        BinOp::Add => a.checked_add(b).ok_or_else(|| Error::ArithmeticError("integer overflow".into())),
        BinOp::Sub => a.checked_sub(b).ok_or_else(|| Error::ArithmeticError("integer overflow".into())),
        BinOp::Mul => a.checked_mul(b).ok_or_else(|| Error::ArithmeticError("integer overflow".into())),
        BinOp::Div => {
            if b == 0 {
                Err(Error::ArithmeticError("division by zero".into()))
            } else {
                Ok(a / b)
            }
        }
        BinOp::Mod => {
            if b == 0 {
                Err(Error::ArithmeticError("modulo by zero".into()))
            } else {
                Ok(a % b)
            }
        }
        _ => unreachable!("int_arith only called for arithmetic operators"),
    }
}

fn bigint_arith(a: i64, op: BinOp, b: i64) -> Result<i64> {
    match op {
        BinOp::Add => a.checked_add(b).ok_or_else(|| Error::ArithmeticError("integer overflow".into())),
        BinOp::Sub => a.checked_sub(b).ok_or_else(|| Error::ArithmeticError("integer overflow".into())),
        BinOp::Mul => a.checked_mul(b).ok_or_else(|| Error::ArithmeticError("integer overflow".into())),
        BinOp::Div => {
            if b == 0 {
                Err(Error::ArithmeticError("division by zero".into()))
            } else {
                Ok(a / b)
            }
        }
        BinOp::Mod => {
            if b == 0 {
                Err(Error::ArithmeticError("modulo by zero".into()))
            } else {
                Ok(a % b)
            }
        }
        _ => unreachable!("bigint_arith only called for arithmetic operators"),
    }
}

fn double_arith(a: f64, op: BinOp, b: f64) -> Result<f64> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(Error::ArithmeticError("division by zero".into()));
            }
            a / b
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(Error::ArithmeticError("modulo by zero".into()));
            }
            a % b
        }
        _ => unreachable!("double_arith only called for arithmetic operators"),
    };

    if result.is_finite() {
        Ok(result)
    } else {
        Err(Error::ArithmeticError("floating-point overflow".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", ColumnType::Int, 0, false).unwrap(),
            Column::new("name", ColumnType::Varchar, 32, true).unwrap(),
        ]
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let row = Row::new(vec![Value::Int(1), Value::Varchar("alice".into())]);
        let value = evaluate(&Expr::Column("ID".into()), &row, &columns()).unwrap();
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn unknown_column_is_not_found() {
        let row = Row::new(vec![Value::Int(1), Value::Null]);
        assert!(evaluate(&Expr::Column("missing".into()), &row, &columns()).is_err());
    }

    #[test]
    fn null_comparison_is_always_false() {
        let row = Row::new(vec![Value::Int(1), Value::Null]);
        let expr = Expr::Binary(
            Box::new(Expr::Column("name".into())),
            BinOp::Eq,
            Box::new(Expr::Literal(Value::Varchar("alice".into()))),
        );
        assert_eq!(evaluate(&expr, &row, &columns()).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn mixed_type_comparison_is_type_mismatch() {
        let row = Row::new(vec![Value::Int(1), Value::Null]);
        let expr = Expr::Binary(
            Box::new(Expr::Column("id".into())),
            BinOp::Eq,
            Box::new(Expr::Literal(Value::Varchar("1".into()))),
        );
        assert!(matches!(evaluate(&expr, &row, &columns()), Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn arithmetic_divides_and_rejects_zero() {
        let ten_div_two = Expr::Binary(
            Box::new(Expr::Literal(Value::Int(10))),
            BinOp::Div,
            Box::new(Expr::Literal(Value::Int(2))),
        );
        let row = Row::new(vec![Value::Int(1), Value::Null]);
        assert_eq!(evaluate(&ten_div_two, &row, &columns()).unwrap(), Value::Int(5));

        let div_zero = Expr::Binary(
            Box::new(Expr::Literal(Value::Int(10))),
            BinOp::Div,
            Box::new(Expr::Literal(Value::Int(0))),
        );
        assert!(matches!(evaluate(&div_zero, &row, &columns()), Err(Error::ArithmeticError(_))));
    }

    #[test]
    fn arithmetic_overflow_is_an_error_not_a_panic() {
        let row = Row::new(vec![Value::Int(1), Value::Null]);
        let overflow = Expr::Binary(
            Box::new(Expr::Literal(Value::Int(i32::MAX))),
            BinOp::Add,
            Box::new(Expr::Literal(Value::Int(1))),
        );
        assert!(matches!(evaluate(&overflow, &row, &columns()), Err(Error::ArithmeticError(_))));
    }

    #[test]
    fn logical_and_or_coerce_operands_to_boolean() {
        let row = Row::new(vec![Value::Int(0), Value::Varchar("x".into())]);
        let expr = Expr::Binary(
            Box::new(Expr::Column("id".into())),
            BinOp::Or,
            Box::new(Expr::Column("name".into())),
        );
        assert_eq!(evaluate(&expr, &row, &columns()).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn not_inverts_coerced_boolean() {
        let row = Row::new(vec![Value::Int(0), Value::Null]);
        let expr = Expr::Not(Box::new(Expr::Column("id".into())));
        assert_eq!(evaluate(&expr, &row, &columns()).unwrap(), Value::Boolean(true));
    }
}
