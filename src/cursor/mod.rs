//! # Cursor Module
//!
//! Row-level cursors over a table: a plain storage-order scan and an index
//! cursor that visits rows in index order within a key range.
//!
//! ```text
//! CursorBuilder ──index usable?──yes──> IndexCursor ──> EntryCursor ──> IndexData
//!       │                                    │
//!       no (logs why)                        └──> TableAccessor::get_row
//!       v
//! TableScanCursor ──> TableAccessor::row_after / row_before
//! ```
//!
//! Both cursors implement [`Cursor`]: movement, current row access, value
//! searches and saving/restoring a position. Neither holds a lock between
//! calls; they re-read the table and index on every move and tolerate rows
//! being added and removed underneath them.
//!
//! ## Row Iteration
//!
//! [`Cursor::rows`] (or [`Rows::new`] for a boxed cursor) borrows a cursor
//! as a lazy iterator. The iterator starts
//! wherever the cursor is, and `reset` rewinds it to before the first row.
//!
//! ```ignore
//! let mut cursor = CursorBuilder::new(table).index(&index).build()?;
//! for row in Rows::new(cursor.as_mut()) {
//!     println!("{:?}", row?.get("name"));
//! }
//! ```

mod index_cursor;
mod matcher;
mod scan;
mod table;

pub use index_cursor::{EntryRows, IndexCursor};
pub use matcher::{CaseInsensitiveColumnMatcher, ColumnMatcher, SimpleColumnMatcher};
pub use scan::TableScanCursor;
pub use table::{MemTable, Row, TableAccessor};

use std::sync::Arc;

use eyre::Result;
use tracing::warn;

use crate::index::{Index, IndexValue, Position, RowId};
use crate::types::OwnedValue;

/// Position of a table scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPosition {
    BeforeFirst,
    At(RowId),
    AfterLast,
}

/// A saved cursor position, restorable on the cursor that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorState {
    Scan {
        current: ScanPosition,
        previous: ScanPosition,
    },
    Index {
        current: Position,
        previous: Position,
    },
}

pub trait Cursor {
    fn table(&self) -> &Arc<dyn TableAccessor>;

    fn before_first(&mut self);

    fn after_last(&mut self);

    fn is_before_first(&self) -> bool;

    fn is_after_last(&self) -> bool;

    /// Moves to the next row. Returns `false` once past the last row.
    fn move_to_next_row(&mut self) -> Result<bool>;

    fn move_to_previous_row(&mut self) -> Result<bool>;

    fn current_row_id(&self) -> Option<RowId>;

    fn column_matcher(&self) -> &dyn ColumnMatcher;

    fn save_state(&self) -> CursorState;

    fn restore_state(&mut self, state: CursorState) -> Result<()>;

    /// The current row, restricted to `columns` when given. `None` when the
    /// cursor is not on a row.
    fn current_row(&self, columns: Option<&[&str]>) -> Result<Option<Row>> {
        match self.current_row_id() {
            Some(id) => Ok(Some(self.table().get_row(id, columns)?)),
            None => Ok(None),
        }
    }

    /// Moves to the first row whose `column` matches `value`. On failure
    /// the cursor keeps its old position.
    fn find_first_row(&mut self, column: &str, value: &OwnedValue) -> Result<bool> {
        let pattern = [(column, value.clone())];
        scan_for_match(self, &pattern)
    }

    /// Moves to the first row matching every `(column, value)` pair.
    fn find_first_row_by_pattern(&mut self, pattern: &[(&str, OwnedValue)]) -> Result<bool> {
        scan_for_match(self, pattern)
    }

    fn rows(&mut self) -> Rows<'_, Self>
    where
        Self: Sized,
    {
        Rows::new(self)
    }
}

/// Full scan from the start for a row matching `pattern`, restoring the
/// original position when nothing matches.
pub(crate) fn scan_for_match<C: Cursor + ?Sized>(
    cursor: &mut C,
    pattern: &[(&str, OwnedValue)],
) -> Result<bool> {
    let saved = cursor.save_state();
    cursor.before_first();
    while cursor.move_to_next_row()? {
        if current_row_matches(cursor, pattern)? {
            return Ok(true);
        }
    }
    cursor.restore_state(saved)?;
    Ok(false)
}

pub(crate) fn current_row_matches<C: Cursor + ?Sized>(
    cursor: &C,
    pattern: &[(&str, OwnedValue)],
) -> Result<bool> {
    let names: Vec<&str> = pattern.iter().map(|(c, _)| *c).collect();
    let Some(row) = cursor.current_row(Some(names.as_slice()))? else {
        return Ok(false);
    };
    let matcher = cursor.column_matcher();
    Ok(pattern.iter().zip(row.values()).all(|((column, expected), actual)| {
        matcher.matches(column, expected, actual)
    }))
}

/// Lazy iterator over the rows after a cursor's position.
pub struct Rows<'a, C: Cursor + ?Sized> {
    cursor: &'a mut C,
    columns: Option<Vec<String>>,
}

impl<'a, C: Cursor + ?Sized> Rows<'a, C> {
    /// Iterator over `cursor`; also works for `dyn Cursor`.
    pub fn new(cursor: &'a mut C) -> Self {
        Self {
            cursor,
            columns: None,
        }
    }

    /// Only read these columns of each row.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Rewinds to before the first row, so the iterator starts over.
    pub fn reset(&mut self) {
        self.cursor.before_first();
    }
}

impl<C: Cursor + ?Sized> Iterator for Rows<'_, C> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.move_to_next_row() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(Err(e)),
        }
        let names: Option<Vec<&str>> = self
            .columns
            .as_ref()
            .map(|cols| cols.iter().map(String::as_str).collect());
        self.cursor.current_row(names.as_deref()).transpose()
    }
}

/// Chooses between an index cursor and a table scan.
#[derive(Debug)]
pub struct CursorBuilder {
    table: Arc<dyn TableAccessor>,
    index: Option<Index>,
    start: Option<(Vec<IndexValue>, bool)>,
    end: Option<(Vec<IndexValue>, bool)>,
    matcher: Option<Arc<dyn ColumnMatcher>>,
}

impl CursorBuilder {
    pub fn new(table: Arc<dyn TableAccessor>) -> Self {
        Self {
            table,
            index: None,
            start: None,
            end: None,
            matcher: None,
        }
    }

    pub fn index(mut self, index: &Index) -> Self {
        self.index = Some(index.clone());
        self
    }

    /// Uses the table's index called `name`, if there is one.
    pub fn index_by_name(mut self, name: &str) -> Self {
        self.index = self
            .table
            .indexes()
            .into_iter()
            .find(|i| i.name().eq_ignore_ascii_case(name));
        self
    }

    pub fn start_row(mut self, values: Vec<IndexValue>, inclusive: bool) -> Self {
        self.start = Some((values, inclusive));
        self
    }

    pub fn end_row(mut self, values: Vec<IndexValue>, inclusive: bool) -> Self {
        self.end = Some((values, inclusive));
        self
    }

    pub fn column_matcher(mut self, matcher: Arc<dyn ColumnMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn to_scan_cursor(self) -> TableScanCursor {
        let mut cursor = TableScanCursor::new(self.table);
        if let Some(m) = self.matcher {
            cursor.set_column_matcher(m);
        }
        cursor
    }

    pub fn to_index_cursor(self) -> Result<IndexCursor> {
        let index = self
            .index
            .ok_or_else(|| eyre::eyre!("no index chosen for cursor on '{}'", self.table.name()))?;
        let (start, start_inclusive) = match &self.start {
            Some((v, inc)) => (Some(v.as_slice()), *inc),
            None => (None, true),
        };
        let (end, end_inclusive) = match &self.end {
            Some((v, inc)) => (Some(v.as_slice()), *inc),
            None => (None, true),
        };
        let mut cursor =
            index.new_cursor(self.table.clone(), start, start_inclusive, end, end_inclusive)?;
        if let Some(m) = self.matcher {
            cursor.set_column_matcher(m);
        }
        Ok(cursor)
    }

    /// An index cursor when an index was chosen and is usable, otherwise a
    /// table scan. A range is ignored by the scan.
    pub fn build(self) -> Result<Box<dyn Cursor>> {
        if self.index.is_none() {
            return Ok(Box::new(self.to_scan_cursor()));
        }
        let unusable = self
            .index
            .as_ref()
            .and_then(|i| i.unsupported_reason().map(|r| (i.name().to_string(), r)));
        match unusable {
            None => Ok(Box::new(self.to_index_cursor()?)),
            Some((index, reason)) => {
                warn!(
                    table = self.table.name(),
                    %index,
                    %reason,
                    "index unusable, falling back to table scan"
                );
                Ok(Box::new(self.to_scan_cursor()))
            }
        }
    }
}
