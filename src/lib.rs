//! kvrelay - a teaching-grade relational storage engine modeled on
//! MySQL/InnoDB's architecture: buffer pool, B+Tree clustered and
//! secondary indexes, a system catalog, and a Volcano-model executor.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            kvrelay                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Query Layer (exec/)                         │   │
//! │  │      Statement/Expr AST → PlanHandle → Operators          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │   Engine & Catalog (engine.rs, catalog.rs, table.rs)      │   │
//! │  │   StorageEngine + SchemaManager + Table                   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Index Layer (index/)                            │   │
//! │  │    ClusteredIndex / SecondaryIndex over a B+Tree           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │       Buffer Pool (buffer/)                                │
//! │  │   BufferPoolManager + strict-LRU replacer + Frame          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                         │
//! │  │     DiskManager + Page + PageHeader + record (de)serialize │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - shared primitives (ids, errors, config)
//! - [`types`] - scalar values, column descriptors, rows
//! - [`storage`] - disk I/O, page formats, record (de)serialization
//! - [`buffer`] - buffer pool management and strict-LRU eviction
//! - [`index`] - the disk-backed B+Tree and the clustered/secondary indexes built on it
//! - [`table`] - a table: schema plus its indexes
//! - [`catalog`] - the system catalog (`SYS_TABLES`/`SYS_COLUMNS`)
//! - [`engine`] - the `StorageEngine` façade tying all of the above together
//! - [`exec`] - the statement AST, expression evaluator, and Volcano-model executor
//!
//! # Quick Start
//! ```no_run
//! use kvrelay::engine::StorageEngine;
//! use kvrelay::types::{Column, ColumnType, Row, Value};
//!
//! let mut engine = StorageEngine::open("my_database").unwrap();
//! let table = engine
//!     .create_table(
//!         "users",
//!         vec![
//!             Column::new("id", ColumnType::Int, 0, false).unwrap(),
//!             Column::new("name", ColumnType::Varchar, 64, true).unwrap(),
//!         ],
//!     )
//!     .unwrap();
//!
//! table
//!     .insert_row(&Row::new(vec![Value::Int(1), Value::Varchar("alice".into())]))
//!     .unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod engine;
pub mod exec;
pub mod index;
pub mod storage;
pub mod table;
pub mod types;

pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, IndexId, PageId, PageKey, Result, TableId};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use catalog::SchemaManager;
pub use engine::StorageEngine;
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
pub use table::Table;
