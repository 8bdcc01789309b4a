//! Error types for the storage engine.
//!
//! One variant per entry in the error taxonomy: callers match on `kind`
//! rather than parsing messages.

use thiserror::Error;

/// Convenient Result type alias, as `std::io::Result` does for `io::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the engine surfaces, from the page substrate up through the
/// executor.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("duplicate key in unique index: {0}")]
    DuplicateKey(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("page-manager metadata corrupt: {0}")]
    MetadataCorrupt(String),

    #[error("B+Tree index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("buffer pool exhausted: no unpinned frame available")]
    PoolExhausted,

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("arithmetic error: {0}")]
    ArithmeticError(String),

    #[error("predicate did not evaluate to a boolean")]
    PredicateNotBoolean,

    #[error("unsupported: {0}")]
    Unsupported(String),
}
