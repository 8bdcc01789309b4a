//! Key-domain hashing.
//!
//! Every `BPlusTree` orders and searches by a 32-bit integer key. Scalar
//! values that aren't already a 32-bit int are folded down to one,
//! deterministically and identically everywhere, via [`HashableKey`].
//!
//! # Caveat
//! Folding `i64`/`str` keys into 32 bits can collide: two distinct
//! `Value`s may hash to the same tree key. Callers that store full
//! records (clustered indexes) or full primary-key values (secondary
//! indexes) alongside the hashed key can still disambiguate on a match;
//! this engine does not attempt perfect hashing.

use crate::common::{Error, Result};
use crate::types::Value;

/// A scalar value in the form the key-domain hash understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashableKey<'a> {
    Int(i32),
    Int64(i64),
    Str(&'a str),
}

/// Folds a `HashableKey` down to the tree's 32-bit key domain.
///
/// A trait (rather than a free function) so the one documented hash is
/// enforced at the type level: every caller that needs a tree key must
/// go through an implementation of this trait.
pub trait KeyHasher {
    fn hash(key: &HashableKey<'_>) -> i32;
}

/// The single hash implementation used throughout the engine.
pub struct StandardKeyHasher;

impl KeyHasher for StandardKeyHasher {
    fn hash(key: &HashableKey<'_>) -> i32 {
        match key {
            HashableKey::Int(v) => *v,
            HashableKey::Int64(v) => (*v ^ (*v >> 32)) as i32,
            HashableKey::Str(s) => fnv1a_32(s),
        }
    }
}

/// 32-bit FNV-1a fold of a string's UTF-8 bytes.
fn fnv1a_32(s: &str) -> i32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    for byte in s.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash as i32
}

/// Reduce a scalar `Value` to the tree's 32-bit key domain, per the
/// standard hash. `Double`, `Boolean`, and `Null` have no defined index
/// key and are rejected.
pub fn indexed_key_for(value: &Value) -> Result<i32> {
    let hashable = match value {
        Value::Int(v) => HashableKey::Int(*v),
        Value::BigInt(v) => HashableKey::Int64(*v),
        Value::Date(v) | Value::Timestamp(v) => HashableKey::Int64(*v),
        Value::Varchar(s) => HashableKey::Str(s.as_str()),
        Value::Double(_) | Value::Boolean(_) | Value::Null => {
            return Err(Error::Unsupported(format!(
                "{} cannot be used as an index key",
                value.type_name()
            )))
        }
    };
    Ok(StandardKeyHasher::hash(&hashable))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_keys_pass_through_unchanged() {
        assert_eq!(StandardKeyHasher::hash(&HashableKey::Int(42)), 42);
        assert_eq!(StandardKeyHasher::hash(&HashableKey::Int(-7)), -7);
    }

    #[test]
    fn int64_fold_is_deterministic() {
        let a = StandardKeyHasher::hash(&HashableKey::Int64(1_234_567_890_123));
        let b = StandardKeyHasher::hash(&HashableKey::Int64(1_234_567_890_123));
        assert_eq!(a, b);
    }

    #[test]
    fn small_int64_values_fold_to_themselves() {
        assert_eq!(StandardKeyHasher::hash(&HashableKey::Int64(100)), 100);
    }

    #[test]
    fn string_hash_is_deterministic_and_sensitive_to_content() {
        let a = StandardKeyHasher::hash(&HashableKey::Str("alice"));
        let b = StandardKeyHasher::hash(&HashableKey::Str("alice"));
        let c = StandardKeyHasher::hash(&HashableKey::Str("bob"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn indexed_key_for_rejects_unsupported_types() {
        assert!(indexed_key_for(&Value::Double(1.0)).is_err());
        assert!(indexed_key_for(&Value::Boolean(true)).is_err());
        assert!(indexed_key_for(&Value::Null).is_err());
    }

    #[test]
    fn indexed_key_for_accepts_scalar_domains() {
        assert_eq!(indexed_key_for(&Value::Int(5)).unwrap(), 5);
        assert!(indexed_key_for(&Value::BigInt(5)).is_ok());
        assert!(indexed_key_for(&Value::Varchar("x".into())).is_ok());
    }
}
