//! Storage-order table scan.

use std::sync::Arc;

use eyre::{bail, Result};

use super::matcher::{ColumnMatcher, SimpleColumnMatcher};
use super::table::TableAccessor;
use super::{Cursor, CursorState, ScanPosition};
use crate::index::RowId;

#[derive(Debug, Clone)]
pub struct TableScanCursor {
    table: Arc<dyn TableAccessor>,
    current: ScanPosition,
    previous: ScanPosition,
    matcher: Arc<dyn ColumnMatcher>,
}

impl TableScanCursor {
    pub fn new(table: Arc<dyn TableAccessor>) -> Self {
        Self {
            table,
            current: ScanPosition::BeforeFirst,
            previous: ScanPosition::BeforeFirst,
            matcher: Arc::new(SimpleColumnMatcher),
        }
    }

    pub fn set_column_matcher(&mut self, matcher: Arc<dyn ColumnMatcher>) {
        self.matcher = matcher;
    }

    pub fn position(&self) -> ScanPosition {
        self.current
    }

    fn move_to(&mut self, next: ScanPosition) -> bool {
        self.previous = std::mem::replace(&mut self.current, next);
        matches!(next, ScanPosition::At(_))
    }
}

impl Cursor for TableScanCursor {
    fn table(&self) -> &Arc<dyn TableAccessor> {
        &self.table
    }

    fn before_first(&mut self) {
        self.current = ScanPosition::BeforeFirst;
        self.previous = ScanPosition::BeforeFirst;
    }

    fn after_last(&mut self) {
        self.current = ScanPosition::AfterLast;
        self.previous = ScanPosition::AfterLast;
    }

    fn is_before_first(&self) -> bool {
        self.current == ScanPosition::BeforeFirst
    }

    fn is_after_last(&self) -> bool {
        self.current == ScanPosition::AfterLast
    }

    fn move_to_next_row(&mut self) -> Result<bool> {
        let next = match self.current {
            ScanPosition::AfterLast => None,
            ScanPosition::BeforeFirst => self.table.row_after(None)?,
            ScanPosition::At(id) => self.table.row_after(Some(id))?,
        };
        Ok(self.move_to(next.map_or(ScanPosition::AfterLast, ScanPosition::At)))
    }

    fn move_to_previous_row(&mut self) -> Result<bool> {
        let prev = match self.current {
            ScanPosition::BeforeFirst => None,
            ScanPosition::AfterLast => self.table.row_before(None)?,
            ScanPosition::At(id) => self.table.row_before(Some(id))?,
        };
        Ok(self.move_to(prev.map_or(ScanPosition::BeforeFirst, ScanPosition::At)))
    }

    fn current_row_id(&self) -> Option<RowId> {
        match self.current {
            ScanPosition::At(id) => Some(id),
            _ => None,
        }
    }

    fn column_matcher(&self) -> &dyn ColumnMatcher {
        self.matcher.as_ref()
    }

    fn save_state(&self) -> CursorState {
        CursorState::Scan {
            current: self.current,
            previous: self.previous,
        }
    }

    fn restore_state(&mut self, state: CursorState) -> Result<()> {
        match state {
            CursorState::Scan { current, previous } => {
                self.current = current;
                self.previous = previous;
                Ok(())
            }
            CursorState::Index { .. } => {
                bail!("cannot restore an index cursor state on a table scan")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemTable;
    use crate::types::{ColumnDef, DataType, OwnedValue};

    fn table(n: i32) -> Arc<MemTable> {
        let t = MemTable::new(
            "T",
            vec![
                ColumnDef::new("n", DataType::Long),
                ColumnDef::text("s", 20),
            ],
        );
        for i in 0..n {
            t.insert(vec![i.into(), format!("row{}", i).as_str().into()])
                .unwrap();
        }
        t.into_shared()
    }

    #[test]
    fn scans_both_ways() {
        let t = table(5);
        let mut c = TableScanCursor::new(t);
        let forward: Vec<OwnedValue> = c
            .rows()
            .map(|r| r.unwrap().get("n").cloned().unwrap())
            .collect();
        assert_eq!(forward.len(), 5);
        assert!(c.is_after_last());

        let mut back = 0;
        while c.move_to_previous_row().unwrap() {
            back += 1;
        }
        assert_eq!(back, 5);
        assert!(c.is_before_first());
    }

    #[test]
    fn find_restores_position_on_miss() {
        let t = table(5);
        let mut c = TableScanCursor::new(t);
        assert!(c.find_first_row("s", &"row3".into()).unwrap());
        let at = c.current_row_id();
        assert!(!c.find_first_row("s", &"ROW3".into()).unwrap());
        assert_eq!(c.current_row_id(), at);
        assert!(c
            .find_first_row_by_pattern(&[("n", OwnedValue::Long(4)), ("s", "row4".into())])
            .unwrap());
    }

    #[test]
    fn deleted_row_is_skipped() {
        let t = table(3);
        let mut c = TableScanCursor::new(t.clone());
        c.move_to_next_row().unwrap();
        let first = c.current_row_id().unwrap();
        t.delete(first).unwrap();
        assert!(c.move_to_next_row().unwrap());
        assert_ne!(c.current_row_id(), Some(first));
        assert_eq!(
            c.current_row(None).unwrap().unwrap().get("n"),
            Some(&OwnedValue::Long(1))
        );
    }
}
