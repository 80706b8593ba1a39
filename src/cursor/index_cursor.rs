//! Row cursor driven by an index.
//!
//! Rows come back in index order, limited to the cursor's key range. Finds
//! that name a leading run of the index columns seek through the index
//! instead of scanning; the rest fall back to a scan in index order.
//!
//! Several rows can share encoded index bytes without having equal values
//! (text keys collapse case). Seeks therefore walk every row under the
//! searched key prefix and ask the column matcher about each one.

use std::sync::Arc;

use eyre::{bail, Result};

use super::matcher::{CaseInsensitiveColumnMatcher, ColumnMatcher, SimpleColumnMatcher};
use super::table::{Row, TableAccessor};
use super::{scan_for_match, Cursor, CursorState};
use crate::index::{codec, EntryCursor, Index, IndexValue, RowId, Sentinel};
use crate::types::OwnedValue;

#[derive(Debug, Clone)]
pub struct IndexCursor {
    table: Arc<dyn TableAccessor>,
    index: Index,
    entries: EntryCursor,
    matcher: Arc<dyn ColumnMatcher>,
}

impl IndexCursor {
    /// Unique indexes default to case-insensitive matching, mirroring how
    /// their keys collide; other indexes match values exactly.
    pub fn new(table: Arc<dyn TableAccessor>, index: Index, entries: EntryCursor) -> Self {
        let matcher: Arc<dyn ColumnMatcher> = if index.is_unique() {
            Arc::new(CaseInsensitiveColumnMatcher)
        } else {
            Arc::new(SimpleColumnMatcher)
        };
        Self {
            table,
            index,
            entries,
            matcher,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn entry_cursor(&self) -> &EntryCursor {
        &self.entries
    }

    pub fn set_column_matcher(&mut self, matcher: Arc<dyn ColumnMatcher>) {
        self.matcher = matcher;
    }

    fn key_values(values: &[OwnedValue]) -> Vec<IndexValue> {
        values.iter().cloned().map(IndexValue::Value).collect()
    }

    /// Names of the first `n` index columns.
    fn key_columns(&self, n: usize) -> Vec<&str> {
        self.index
            .definition()
            .columns()
            .iter()
            .take(n)
            .map(|c| c.name())
            .collect()
    }

    /// Positions the cursor just before the first entry of the key given by
    /// `values` (leading index columns). Returns the encoded key prefix.
    fn seek(&mut self, values: &[OwnedValue]) -> Result<Vec<u8>> {
        let key = codec::encode_key(
            self.index.definition(),
            &Self::key_values(values),
            Sentinel::Min,
        )?;
        let prefix = key.bytes().to_vec();
        self.entries.before_entry(key)?;
        Ok(prefix)
    }

    /// Walks forward from a seek to the first row under `prefix` accepted
    /// by `accept`.
    fn walk_prefix(
        &mut self,
        prefix: &[u8],
        mut accept: impl FnMut(&Self) -> Result<bool>,
    ) -> Result<bool> {
        loop {
            let entry = self.entries.next_entry()?;
            if !entry.is_valid() || !entry.bytes().starts_with(prefix) {
                return Ok(false);
            }
            if accept(self)? {
                return Ok(true);
            }
        }
    }

    /// Moves to the first row whose leading index columns match `values`.
    /// When there is none the cursor is left where it was.
    pub fn find_first_row_by_entry(&mut self, values: &[OwnedValue]) -> Result<bool> {
        let saved = self.save_state();
        let found = match self.seek(values) {
            Ok(prefix) => self.walk_prefix(&prefix, |c| c.current_row_matches_entry(values)),
            Err(e) => Err(e),
        };
        match found {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.restore_state(saved)?;
                Ok(false)
            }
            Err(e) => {
                self.restore_state(saved)?;
                Err(e)
            }
        }
    }

    /// Moves to the first row whose key is not less than `values`, whether
    /// or not it matches. Returns `false` when that is past the last row.
    pub fn find_closest_row_by_entry(&mut self, values: &[OwnedValue]) -> Result<bool> {
        let saved = self.save_state();
        let moved = self.seek(values).and_then(|_| self.move_to_next_row());
        if moved.is_err() {
            self.restore_state(saved)?;
        }
        moved
    }

    /// Whether the current row's leading index columns match `values`.
    pub fn current_row_matches_entry(&self, values: &[OwnedValue]) -> Result<bool> {
        if values.len() > self.index.definition().column_count() {
            bail!(
                "{} values given for index '{}' with {} columns",
                values.len(),
                self.index.name(),
                self.index.definition().column_count()
            );
        }
        let columns = self.key_columns(values.len());
        let Some(row) = self.current_row(Some(columns.as_slice()))? else {
            return Ok(false);
        };
        Ok(columns
            .iter()
            .zip(values)
            .zip(row.values())
            .all(|((column, expected), actual)| self.matcher.matches(column, expected, actual)))
    }

    /// Iterator over the rows whose leading index columns match `values`.
    pub fn entry_iter(&mut self, values: &[OwnedValue]) -> Result<EntryRows<'_>> {
        let prefix = self.seek(values)?;
        Ok(EntryRows {
            cursor: self,
            values: values.to_vec(),
            prefix,
        })
    }
}

impl Cursor for IndexCursor {
    fn table(&self) -> &Arc<dyn TableAccessor> {
        &self.table
    }

    fn before_first(&mut self) {
        self.entries.before_first();
    }

    fn after_last(&mut self) {
        self.entries.after_last();
    }

    fn is_before_first(&self) -> bool {
        self.entries.is_before_first()
    }

    fn is_after_last(&self) -> bool {
        self.entries.is_after_last()
    }

    fn move_to_next_row(&mut self) -> Result<bool> {
        Ok(self.entries.next_entry()?.is_valid())
    }

    fn move_to_previous_row(&mut self) -> Result<bool> {
        Ok(self.entries.previous_entry()?.is_valid())
    }

    fn current_row_id(&self) -> Option<RowId> {
        let pos = self.entries.current();
        pos.is_on_row().then(|| pos.entry().row_id())
    }

    fn column_matcher(&self) -> &dyn ColumnMatcher {
        self.matcher.as_ref()
    }

    fn save_state(&self) -> CursorState {
        CursorState::Index {
            current: self.entries.current().clone(),
            previous: self.entries.previous().clone(),
        }
    }

    fn restore_state(&mut self, state: CursorState) -> Result<()> {
        match state {
            CursorState::Index { current, previous } => {
                self.entries.restore_position(current, previous)
            }
            CursorState::Scan { .. } => {
                bail!("cannot restore a table scan state on an index cursor")
            }
        }
    }

    /// Seeks through the index when `column` is the first index column.
    fn find_first_row(&mut self, column: &str, value: &OwnedValue) -> Result<bool> {
        if self.index.definition().position_of(column) == Some(0) {
            return self.find_first_row_by_entry(std::slice::from_ref(value));
        }
        let pattern = [(column, value.clone())];
        scan_for_match(self, &pattern)
    }

    /// Seeks on the longest leading run of index columns named in `pattern`
    /// and checks the remaining pairs on each candidate row.
    fn find_first_row_by_pattern(&mut self, pattern: &[(&str, OwnedValue)]) -> Result<bool> {
        let mut key = Vec::new();
        for col in self.index.definition().columns() {
            match pattern.iter().find(|(name, _)| col.column().is_named(name)) {
                Some((_, value)) => key.push(value.clone()),
                None => break,
            }
        }
        if key.is_empty() {
            return scan_for_match(self, pattern);
        }

        let saved = self.save_state();
        let prefix = self.seek(&key)?;
        let found = self.walk_prefix(&prefix, |c| super::current_row_matches(c, pattern))?;
        if !found {
            self.restore_state(saved)?;
        }
        Ok(found)
    }
}

/// Rows matching one index key, in index order.
pub struct EntryRows<'a> {
    cursor: &'a mut IndexCursor,
    values: Vec<OwnedValue>,
    prefix: Vec<u8>,
}

impl Iterator for EntryRows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let values = &self.values;
        match self
            .cursor
            .walk_prefix(&self.prefix, |c| c.current_row_matches_entry(values))
        {
            Ok(true) => self.cursor.current_row(None).transpose(),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemTable;
    use crate::index::{IndexData, IndexDefinition, IndexKind};
    use crate::storage::{MemPageStore, PageStore};
    use crate::types::{ColumnDef, DataType};

    fn setup(unique: bool) -> (Arc<MemTable>, Index) {
        let table = MemTable::new(
            "Parts",
            vec![
                ColumnDef::text("name", 30),
                ColumnDef::new("qty", DataType::Long),
            ],
        )
        .into_shared();
        let store: Arc<dyn PageStore> = Arc::new(MemPageStore::default());
        let def = IndexDefinition::builder()
            .column(ColumnDef::text("name", 30), 0, true)
            .column(ColumnDef::new("qty", DataType::Long), 1, true)
            .unique(unique)
            .build()
            .unwrap();
        let data = Arc::new(IndexData::create("ByName", def, store, 1).unwrap());
        let index = Index::new("ByName", IndexKind::Normal, data);
        table.add_index(index.clone()).unwrap();
        (table, index)
    }

    fn cursor(table: &Arc<MemTable>, index: &Index) -> IndexCursor {
        index
            .new_cursor(table.clone(), None, true, None, true)
            .unwrap()
    }

    #[test]
    fn rows_follow_index_order() {
        let (table, index) = setup(false);
        for (name, qty) in [("bolt", 3), ("axle", 1), ("cog", 2), ("axle", 0)] {
            table.insert(vec![name.into(), qty.into()]).unwrap();
        }
        let mut c = cursor(&table, &index);
        let names: Vec<(OwnedValue, OwnedValue)> = c
            .rows()
            .map(|r| {
                let r = r.unwrap();
                (r.get("name").cloned().unwrap(), r.get("qty").cloned().unwrap())
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("axle".into(), OwnedValue::Long(0)),
                ("axle".into(), OwnedValue::Long(1)),
                ("bolt".into(), OwnedValue::Long(3)),
                ("cog".into(), OwnedValue::Long(2)),
            ]
        );
    }

    #[test]
    fn exact_matcher_skips_case_variants() {
        let (table, index) = setup(false);
        table.insert(vec!["Foo".into(), 1.into()]).unwrap();
        table.insert(vec!["foo".into(), 2.into()]).unwrap();
        let mut c = cursor(&table, &index);

        assert!(c.find_first_row_by_entry(&["foo".into()]).unwrap());
        let row = c.current_row(None).unwrap().unwrap();
        assert_eq!(row.get("qty"), Some(&OwnedValue::Long(2)));

        let matches: Vec<Row> = c
            .entry_iter(&["Foo".into()])
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].get("qty"), Some(&OwnedValue::Long(1)));
    }

    #[test]
    fn closest_row_does_not_require_a_match() {
        let (table, index) = setup(false);
        table.insert(vec!["b".into(), 1.into()]).unwrap();
        table.insert(vec!["d".into(), 1.into()]).unwrap();
        let mut c = cursor(&table, &index);

        assert!(!c.find_first_row_by_entry(&["c".into()]).unwrap());
        assert!(c.is_before_first());
        assert!(c.find_closest_row_by_entry(&["c".into()]).unwrap());
        assert_eq!(
            c.current_row(Some(&["name"][..])).unwrap().unwrap().get("name"),
            Some(&OwnedValue::from("d"))
        );
        assert!(!c.find_closest_row_by_entry(&["e".into()]).unwrap());
        assert!(c.is_after_last());
    }

    #[test]
    fn pattern_find_uses_leading_columns() {
        let (table, index) = setup(true);
        table.insert(vec!["gear".into(), 5.into()]).unwrap();
        table.insert(vec!["gear".into(), 9.into()]).unwrap();
        let mut c = cursor(&table, &index);

        assert!(c
            .find_first_row_by_pattern(&[("qty", 9.into()), ("NAME", "GEAR".into())])
            .unwrap());
        assert_eq!(
            c.current_row(None).unwrap().unwrap().get("qty"),
            Some(&OwnedValue::Long(9))
        );
        assert!(c.find_first_row("qty", &5.into()).unwrap());
        assert!(!c.find_first_row("qty", &7.into()).unwrap());
    }
}
