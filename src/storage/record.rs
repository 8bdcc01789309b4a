//! COMPACT record serialization: null bitmap, variable-length prefix
//! list, then column payload, as described in spec.md §3/§4.4.

use crate::common::{Error, Result};
use crate::types::{Column, ColumnType, Row, Value};

const MAX_VARCHAR_LEN: usize = 32_767;

fn null_bitmap_len(column_count: usize) -> usize {
    column_count.div_ceil(8)
}

fn varchar_len_prefix_size(len: usize) -> usize {
    if len <= 0x7F {
        1
    } else {
        2
    }
}

/// Exact serialized byte length for `row` against `columns`, without
/// allocating the record itself.
pub fn calculate_record_size(row: &Row, columns: &[Column]) -> Result<usize> {
    check_shape(row, columns)?;

    let mut size = null_bitmap_len(columns.len());

    for (value, column) in row.values.iter().zip(columns) {
        if value.is_null() {
            continue;
        }
        if column.col_type.is_varchar() {
            let s = expect_varchar(value, column)?;
            check_varchar_len(s, column)?;
            size += varchar_len_prefix_size(s.len());
        }
    }

    for (value, column) in row.values.iter().zip(columns) {
        if value.is_null() {
            continue;
        }
        size += match column.col_type {
            ColumnType::Varchar => expect_varchar(value, column)?.len(),
            other => other.fixed_width().expect("fixed-width type"),
        };
    }

    Ok(size)
}

/// Serialize `row` into a COMPACT-format byte record.
pub fn serialize(row: &Row, columns: &[Column]) -> Result<Vec<u8>> {
    check_shape(row, columns)?;

    let bitmap_len = null_bitmap_len(columns.len());
    let mut bitmap = vec![0u8; bitmap_len];
    for (i, value) in row.values.iter().enumerate() {
        if value.is_null() {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }

    let mut var_len_list = Vec::new();
    for i in (0..columns.len()).rev() {
        let column = &columns[i];
        let value = &row.values[i];
        if !column.col_type.is_varchar() || value.is_null() {
            continue;
        }
        let s = expect_varchar(value, column)?;
        check_varchar_len(s, column)?;
        encode_varchar_len(s.len(), &mut var_len_list);
    }

    let mut payload = Vec::new();
    for (value, column) in row.values.iter().zip(columns) {
        if value.is_null() {
            continue;
        }
        match (value, column.col_type) {
            (Value::Int(v), ColumnType::Int) => payload.extend_from_slice(&v.to_le_bytes()),
            (Value::BigInt(v), ColumnType::BigInt) => payload.extend_from_slice(&v.to_le_bytes()),
            (Value::Double(v), ColumnType::Double) => payload.extend_from_slice(&v.to_le_bytes()),
            (Value::Boolean(v), ColumnType::Boolean) => payload.push(*v as u8),
            (Value::Date(v), ColumnType::Date) => payload.extend_from_slice(&v.to_le_bytes()),
            (Value::Timestamp(v), ColumnType::Timestamp) => payload.extend_from_slice(&v.to_le_bytes()),
            (Value::Varchar(s), ColumnType::Varchar) => payload.extend_from_slice(s.as_bytes()),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "column {}: value {} does not match declared type {:?}",
                    column.name,
                    value.type_name(),
                    column.col_type
                )))
            }
        }
    }

    let mut record = Vec::with_capacity(bitmap.len() + var_len_list.len() + payload.len());
    record.extend(bitmap);
    record.extend(var_len_list);
    record.extend(payload);
    Ok(record)
}

/// Inverse of [`serialize`]: `deserialize(serialize(r, C), C) == r`.
pub fn deserialize(bytes: &[u8], columns: &[Column]) -> Result<Row> {
    let bitmap_len = null_bitmap_len(columns.len());
    if bytes.len() < bitmap_len {
        return Err(Error::InvalidArgument("record shorter than its null bitmap".into()));
    }
    let bitmap = &bytes[..bitmap_len];
    let is_null = |i: usize| (bitmap[i / 8] >> (i % 8)) & 1 == 1;

    let mut offset = bitmap_len;
    let mut varchar_lengths = vec![0usize; columns.len()];
    for i in (0..columns.len()).rev() {
        if !columns[i].col_type.is_varchar() || is_null(i) {
            continue;
        }
        let (len, consumed) = decode_varchar_len(&bytes[offset..])?;
        varchar_lengths[i] = len;
        offset += consumed;
    }

    let mut values = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        if is_null(i) {
            values.push(Value::Null);
            continue;
        }

        let value = match column.col_type {
            ColumnType::Int => {
                let v = read_fixed::<4>(bytes, &mut offset)?;
                Value::Int(i32::from_le_bytes(v))
            }
            ColumnType::BigInt => {
                let v = read_fixed::<8>(bytes, &mut offset)?;
                Value::BigInt(i64::from_le_bytes(v))
            }
            ColumnType::Double => {
                let v = read_fixed::<8>(bytes, &mut offset)?;
                Value::Double(f64::from_le_bytes(v))
            }
            ColumnType::Boolean => {
                let v = read_fixed::<1>(bytes, &mut offset)?;
                Value::Boolean(v[0] != 0)
            }
            ColumnType::Date => {
                let v = read_fixed::<8>(bytes, &mut offset)?;
                Value::Date(i64::from_le_bytes(v))
            }
            ColumnType::Timestamp => {
                let v = read_fixed::<8>(bytes, &mut offset)?;
                Value::Timestamp(i64::from_le_bytes(v))
            }
            ColumnType::Varchar => {
                let len = varchar_lengths[i];
                if offset + len > bytes.len() {
                    return Err(Error::InvalidArgument("record truncated in varchar payload".into()));
                }
                let s = std::str::from_utf8(&bytes[offset..offset + len])
                    .map_err(|e| Error::InvalidArgument(format!("invalid utf-8 in varchar column: {e}")))?
                    .to_string();
                offset += len;
                Value::Varchar(s)
            }
        };
        values.push(value);
    }

    Ok(Row::new(values))
}

fn check_shape(row: &Row, columns: &[Column]) -> Result<()> {
    if row.values.len() != columns.len() {
        return Err(Error::InvalidArgument(format!(
            "row has {} values but {} columns were given",
            row.values.len(),
            columns.len()
        )));
    }
    Ok(())
}

fn expect_varchar<'a>(value: &'a Value, column: &Column) -> Result<&'a str> {
    match value {
        Value::Varchar(s) => Ok(s.as_str()),
        other => Err(Error::InvalidArgument(format!(
            "column {}: expected VARCHAR, got {}",
            column.name,
            other.type_name()
        ))),
    }
}

fn check_varchar_len(s: &str, column: &Column) -> Result<()> {
    if s.len() > MAX_VARCHAR_LEN {
        return Err(Error::InvalidArgument(format!(
            "column {}: varchar of {} bytes exceeds the 15-bit length-prefix limit of {}",
            column.name,
            s.len(),
            MAX_VARCHAR_LEN
        )));
    }
    Ok(())
}

fn encode_varchar_len(len: usize, out: &mut Vec<u8>) {
    if len <= 0x7F {
        out.push(len as u8);
    } else {
        let hi = 0x80 | ((len >> 8) & 0x7F) as u8;
        let lo = (len & 0xFF) as u8;
        out.push(hi);
        out.push(lo);
    }
}

fn decode_varchar_len(bytes: &[u8]) -> Result<(usize, usize)> {
    let first = *bytes
        .first()
        .ok_or_else(|| Error::InvalidArgument("record truncated in length-prefix list".into()))?;

    if first & 0x80 == 0 {
        Ok((first as usize, 1))
    } else {
        let second = *bytes
            .get(1)
            .ok_or_else(|| Error::InvalidArgument("record truncated in length-prefix list".into()))?;
        let len = (((first & 0x7F) as usize) << 8) | second as usize;
        Ok((len, 2))
    }
}

fn read_fixed<const N: usize>(bytes: &[u8], offset: &mut usize) -> Result<[u8; N]> {
    if *offset + N > bytes.len() {
        return Err(Error::InvalidArgument("record truncated in fixed-width payload".into()));
    }
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[*offset..*offset + N]);
    *offset += N;
    Ok(buf)
}
