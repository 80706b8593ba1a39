//! # Index Module
//!
//! Jet (Access) index B-trees: the order-preserving entry codec, page
//! layout, the page tree itself, and the entry cursor that walks it.
//!
//! ## Layers
//!
//! ```text
//! Index (logical: name, kind)            mod.rs
//!   │ Arc
//!   v
//! IndexData (page tree, state machine)   data.rs
//!   │                    ^
//!   │ IndexPage          │ EntryCursor   cursor.rs
//!   v                    │
//! PageStore          Entry / RowId       entry.rs, codec.rs
//! ```
//!
//! - [`codec`] turns a row (or a partial key) into an [`Entry`] whose bytes
//!   sort like the row's values. Text columns use the General sort order
//!   in `collation.rs`.
//! - [`IndexData`] keeps the entries in a B-tree of index pages, shared by
//!   every logical [`Index`] defined over the same columns.
//! - [`EntryCursor`] iterates entries between two boundaries and survives
//!   concurrent inserts and deletes.
//!
//! The table-level `IndexCursor` in `crate::cursor` builds on
//! `EntryCursor` to return rows instead of entries.
//!
//! ## Usage
//!
//! ```ignore
//! let def = IndexDefinition::builder()
//!     .column(ColumnDef::new("id", DataType::Long), 0, true)
//!     .primary_key()
//!     .build()?;
//! let data = Arc::new(IndexData::create("PrimaryKey", def, store, table_page)?);
//! data.add_row(&[OwnedValue::Long(7)], RowId::new(12, 0))?;
//!
//! let index = Index::new("PrimaryKey", IndexKind::PrimaryKey, data);
//! let mut cursor = index.entry_cursor(None, true, None, true)?;
//! while cursor.next_entry()?.is_valid() { /* ... */ }
//! ```

pub mod codec;
mod collation;
mod cursor;
mod data;
mod definition;
mod entry;
mod page;

pub use cursor::EntryCursor;
pub use data::IndexData;
pub use definition::{IndexColumn, IndexDefinition, IndexDefinitionBuilder};
pub use entry::{Entry, IndexValue, Position, RowId, RowIdKind, Sentinel};
pub use page::IndexPage;

use std::sync::Arc;

use eyre::Result;

use crate::cursor::{IndexCursor, TableAccessor};
use crate::error::IndexError;
use crate::types::OwnedValue;

/// The table and index a foreign key points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub referenced_table: String,
    pub referenced_index: String,
    pub cascade_updates: bool,
    pub cascade_deletes: bool,
    /// The referenced table lives in a linked database.
    pub cross_database: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    Normal,
    PrimaryKey,
    ForeignKey(ForeignKeyRef),
}

/// A named index over shared index data.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    kind: IndexKind,
    data: Arc<IndexData>,
}

impl Index {
    pub fn new(name: impl Into<String>, kind: IndexKind, data: Arc<IndexData>) -> Self {
        Self {
            name: name.into(),
            kind,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &IndexKind {
        &self.kind
    }

    pub fn data(&self) -> &Arc<IndexData> {
        &self.data
    }

    pub fn definition(&self) -> &IndexDefinition {
        self.data.definition()
    }

    pub fn is_primary_key(&self) -> bool {
        self.kind == IndexKind::PrimaryKey
    }

    pub fn is_foreign_key(&self) -> bool {
        matches!(self.kind, IndexKind::ForeignKey(_))
    }

    pub fn is_unique(&self) -> bool {
        self.data.definition().is_unique()
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyRef> {
        match &self.kind {
            IndexKind::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }

    pub fn unsupported_reason(&self) -> Option<String> {
        if let Some(reason) = self.data.unsupported_reason() {
            return Some(reason.to_string());
        }
        self.foreign_key()
            .filter(|fk| fk.cross_database)
            .map(|fk| {
                format!(
                    "foreign key references table '{}' in another database",
                    fk.referenced_table
                )
            })
    }

    pub fn ensure_supported(&self) -> Result<()> {
        match self.unsupported_reason() {
            Some(reason) => Err(IndexError::Unsupported {
                index: self.name.clone(),
                reason,
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Entry cursor between two keys given in index column order. A missing
    /// key leaves that end of the index open.
    pub fn entry_cursor(
        &self,
        start: Option<&[IndexValue]>,
        start_inclusive: bool,
        end: Option<&[IndexValue]>,
        end_inclusive: bool,
    ) -> Result<EntryCursor> {
        self.ensure_supported()?;
        let def = self.data.definition();
        let start = match start {
            Some(values) => codec::encode_key(
                def,
                values,
                if start_inclusive {
                    Sentinel::Min
                } else {
                    Sentinel::Max
                },
            )?,
            None => Entry::MIN,
        };
        let end = match end {
            Some(values) => codec::encode_key(
                def,
                values,
                if end_inclusive {
                    Sentinel::Max
                } else {
                    Sentinel::Min
                },
            )?,
            None => Entry::MAX,
        };
        EntryCursor::new(self.data.clone(), start, end)
    }

    /// Row cursor over `table` restricted to the given key range.
    pub fn new_cursor(
        &self,
        table: Arc<dyn TableAccessor>,
        start: Option<&[IndexValue]>,
        start_inclusive: bool,
        end: Option<&[IndexValue]>,
        end_inclusive: bool,
    ) -> Result<IndexCursor> {
        let entries = self.entry_cursor(start, start_inclusive, end, end_inclusive)?;
        Ok(IndexCursor::new(table, self.clone(), entries))
    }

    /// Key with `value` in `column` and `sentinel` in every other position,
    /// for bounding a lookup on a single column.
    pub fn construct_partial_index_row(
        &self,
        sentinel: Sentinel,
        column: &str,
        value: OwnedValue,
    ) -> Result<Vec<IndexValue>> {
        let def = self.data.definition();
        let pos = def.position_of(column).ok_or_else(|| {
            eyre::eyre!("column '{}' is not part of index '{}'", column, self.name)
        })?;
        let mut row = vec![IndexValue::Sentinel(sentinel); def.column_count()];
        row[pos] = IndexValue::Value(value);
        Ok(row)
    }
}
