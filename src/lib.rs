//! # jetdb - Jet Index Engine and Access Expressions
//!
//! jetdb reads and maintains the index B-trees of Microsoft Jet / Access
//! database files and evaluates the Access expression language used for
//! default values, validation rules and calculated columns.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use jetdb::{IndexData, IndexDefinition, MemPageStore, OwnedValue, RowId};
//! use jetdb::types::{ColumnDef, DataType};
//!
//! let def = IndexDefinition::builder()
//!     .column(ColumnDef::new("id", DataType::Long), 0, true)
//!     .unique(true)
//!     .build()?;
//! let index = IndexData::create("PrimaryKey", def, Arc::new(MemPageStore::default()), 1)?;
//! index.add_row(&[OwnedValue::Long(7)], RowId::new(3, 0))?;
//!
//! let value = jetdb::expr::eval_constant("DateAdd(\"d\", 1, #1/31/2024#)", &Default::default())?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Cursors (index, table scan)       │
//! ├──────────────────┬──────────────────┤
//! │  Index B-tree    │ Expression engine│
//! │  (codec, pages)  │ + function library│
//! ├──────────────────┴──────────────────┤
//! │  Values, column types, locale       │
//! ├─────────────────────────────────────┤
//! │  Page store (memory / mmap)         │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: page store trait, in-memory and memory-mapped stores
//! - [`config`]: Jet format constants, locale settings
//! - [`types`]: column types, owned values, expression values, date serials
//! - [`index`]: entry codec, index pages, `IndexData` B-tree, entry cursor
//! - [`cursor`]: row cursors over an index or a plain table scan
//! - [`expr`]: expression lexer, parser and evaluator
//! - [`functions`]: the built-in function library and registry
//! - [`error`]: `IndexError` and `EvalError`

#[macro_use]
mod macros;

pub mod config;
pub mod cursor;
pub mod error;
pub mod expr;
pub mod functions;
pub mod index;
pub mod storage;
pub mod types;

pub use config::{JetFormat, LocaleContext};
pub use cursor::{Cursor, CursorBuilder, IndexCursor, MemTable, TableAccessor, TableScanCursor};
pub use error::{EvalError, IndexError};
pub use expr::{EvalContext, Expression, ExpressionKind, ParseContext};
pub use functions::{Function, FunctionLookup, FunctionRegistry};
pub use index::{
    EntryCursor, Index, IndexColumn, IndexData, IndexDefinition, IndexKind, IndexValue, RowId,
    Sentinel,
};
pub use storage::{MemPageStore, MmapPageStore, PageStore};
pub use types::{ColumnDef, DataType, OwnedValue, Value};
