//! Table access consumed by cursors, and an in-memory table that keeps its
//! indexes up to date.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use eyre::{bail, ensure, eyre, Result, WrapErr};
use parking_lot::RwLock;

use crate::index::{Index, RowId};
use crate::types::{ColumnDef, OwnedValue};

/// A materialized table row: column names with their values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    row_id: RowId,
    columns: Vec<String>,
    values: Vec<OwnedValue>,
}

impl Row {
    pub fn new(row_id: RowId, columns: Vec<String>, values: Vec<OwnedValue>) -> Self {
        Self {
            row_id,
            columns,
            values,
        }
    }

    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    /// Value of `column`, matched case-insensitively.
    pub fn get(&self, column: &str) -> Option<&OwnedValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    pub fn values(&self) -> &[OwnedValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OwnedValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Row storage behind a cursor. Row ids come back in storage order.
pub trait TableAccessor: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn columns(&self) -> &[ColumnDef];

    /// Reads a row, restricted to `columns` when given.
    fn get_row(&self, row_id: RowId, columns: Option<&[&str]>) -> Result<Row>;

    /// First row after `row_id`, or the first row when `None`.
    fn row_after(&self, row_id: Option<RowId>) -> Result<Option<RowId>>;

    /// Last row before `row_id`, or the last row when `None`.
    fn row_before(&self, row_id: Option<RowId>) -> Result<Option<RowId>>;

    fn row_ids(&self) -> Result<Vec<RowId>> {
        let mut ids = Vec::new();
        let mut cur = None;
        while let Some(id) = self.row_after(cur)? {
            ids.push(id);
            cur = Some(id);
        }
        Ok(ids)
    }

    fn indexes(&self) -> Vec<Index> {
        Vec::new()
    }
}

const ROWS_PER_PAGE: u32 = 64;
const FIRST_DATA_PAGE: u32 = 1;

/// Table held in memory. Every supported index attached to it is updated on
/// insert, update and delete; a change rejected by one index is undone in
/// the indexes already updated.
pub struct MemTable {
    name: String,
    columns: Vec<ColumnDef>,
    rows: RwLock<BTreeMap<RowId, Vec<OwnedValue>>>,
    indexes: RwLock<Vec<Index>>,
    next_slot: RwLock<u32>,
}

impl fmt::Debug for MemTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemTable")
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("rows", &self.rows.read().len())
            .field("indexes", &self.indexes.read().len())
            .finish()
    }
}

impl MemTable {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: RwLock::new(BTreeMap::new()),
            indexes: RwLock::new(Vec::new()),
            next_slot: RwLock::new(0),
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    pub fn index(&self, name: &str) -> Option<Index> {
        self.indexes
            .read()
            .iter()
            .find(|i| i.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Attaches an index and fills it with the existing rows. Unsupported
    /// indexes are attached but never written.
    pub fn add_index(&self, index: Index) -> Result<()> {
        if index.unsupported_reason().is_none() && !self.shares_data(&index) {
            for (id, values) in self.rows.read().iter() {
                index
                    .data()
                    .add_row(values, *id)
                    .wrap_err_with(|| format!("failed to fill index '{}'", index.name()))?;
            }
        }
        self.indexes.write().push(index);
        Ok(())
    }

    fn shares_data(&self, index: &Index) -> bool {
        self.indexes
            .read()
            .iter()
            .any(|i| Arc::ptr_eq(i.data(), index.data()))
    }

    /// Indexes to maintain: supported ones, each shared `IndexData` once.
    fn maintained(&self) -> Vec<Index> {
        let mut out: Vec<Index> = Vec::new();
        for index in self.indexes.read().iter() {
            if index.unsupported_reason().is_some()
                || out.iter().any(|i| Arc::ptr_eq(i.data(), index.data()))
            {
                continue;
            }
            out.push(index.clone());
        }
        out
    }

    pub fn insert(&self, values: Vec<OwnedValue>) -> Result<RowId> {
        ensure!(
            values.len() == self.columns.len(),
            "table '{}' has {} columns, row has {}",
            self.name,
            self.columns.len(),
            values.len()
        );

        let row_id = {
            let mut slot = self.next_slot.write();
            let id = RowId::new(
                FIRST_DATA_PAGE + *slot / ROWS_PER_PAGE,
                (*slot % ROWS_PER_PAGE) as u8,
            );
            *slot += 1;
            id
        };

        let indexes = self.maintained();
        for (done, index) in indexes.iter().enumerate() {
            if let Err(e) = index.data().add_row(&values, row_id) {
                for undo in &indexes[..done] {
                    undo.data().delete_row(&values, row_id)?;
                }
                return Err(e);
            }
        }

        self.rows.write().insert(row_id, values);
        Ok(row_id)
    }

    pub fn delete(&self, row_id: RowId) -> Result<bool> {
        let Some(values) = self.rows.read().get(&row_id).cloned() else {
            return Ok(false);
        };
        for index in self.maintained() {
            index.data().delete_row(&values, row_id)?;
        }
        self.rows.write().remove(&row_id);
        Ok(true)
    }

    pub fn update(&self, row_id: RowId, values: Vec<OwnedValue>) -> Result<()> {
        ensure!(
            values.len() == self.columns.len(),
            "table '{}' has {} columns, row has {}",
            self.name,
            self.columns.len(),
            values.len()
        );
        let old = self
            .rows
            .read()
            .get(&row_id)
            .cloned()
            .ok_or_else(|| eyre!("row {} not found in table '{}'", row_id, self.name))?;

        let indexes = self.maintained();
        for (done, index) in indexes.iter().enumerate() {
            if let Err(e) = index.data().update_row(&old, row_id, &values, row_id) {
                for undo in &indexes[..done] {
                    undo.data().update_row(&values, row_id, &old, row_id)?;
                }
                return Err(e);
            }
        }

        self.rows.write().insert(row_id, values);
        Ok(())
    }

    fn column_position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.is_named(name))
            .ok_or_else(|| eyre!("no column '{}' in table '{}'", name, self.name))
    }
}

impl TableAccessor for MemTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    fn get_row(&self, row_id: RowId, columns: Option<&[&str]>) -> Result<Row> {
        let rows = self.rows.read();
        let Some(values) = rows.get(&row_id) else {
            bail!("row {} not found in table '{}'", row_id, self.name);
        };

        match columns {
            None => Ok(Row::new(
                row_id,
                self.columns.iter().map(|c| c.name().to_string()).collect(),
                values.clone(),
            )),
            Some(names) => {
                let mut out_names = Vec::with_capacity(names.len());
                let mut out_values = Vec::with_capacity(names.len());
                for name in names {
                    let pos = self.column_position(name)?;
                    out_names.push(self.columns[pos].name().to_string());
                    out_values.push(values[pos].clone());
                }
                Ok(Row::new(row_id, out_names, out_values))
            }
        }
    }

    fn row_after(&self, row_id: Option<RowId>) -> Result<Option<RowId>> {
        let rows = self.rows.read();
        let next = match row_id {
            None => rows.keys().next(),
            Some(id) => rows
                .range((std::ops::Bound::Excluded(id), std::ops::Bound::Unbounded))
                .map(|(k, _)| k)
                .next(),
        };
        Ok(next.copied())
    }

    fn row_before(&self, row_id: Option<RowId>) -> Result<Option<RowId>> {
        let rows = self.rows.read();
        let prev = match row_id {
            None => rows.keys().next_back(),
            Some(id) => rows.range(..id).map(|(k, _)| k).next_back(),
        };
        Ok(prev.copied())
    }

    fn indexes(&self) -> Vec<Index> {
        self.indexes.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::index::{IndexData, IndexDefinition, IndexKind};
    use crate::storage::{MemPageStore, PageStore};
    use crate::types::DataType;

    fn people() -> MemTable {
        MemTable::new(
            "People",
            vec![
                ColumnDef::new("id", DataType::Long),
                ColumnDef::text("name", 50),
            ],
        )
    }

    fn unique_name_index() -> Index {
        let store: Arc<dyn PageStore> = Arc::new(MemPageStore::default());
        let def = IndexDefinition::builder()
            .column(ColumnDef::text("name", 50), 1, true)
            .unique(true)
            .build()
            .unwrap();
        let data = Arc::new(IndexData::create("ByName", def, store, 1).unwrap());
        Index::new("ByName", IndexKind::Normal, data)
    }

    #[test]
    fn rows_are_returned_in_storage_order() {
        let table = people();
        let a = table.insert(vec![1.into(), "a".into()]).unwrap();
        let b = table.insert(vec![2.into(), "b".into()]).unwrap();
        assert_eq!(table.row_ids().unwrap(), vec![a, b]);
        assert_eq!(table.row_before(None).unwrap(), Some(b));
        assert_eq!(table.row_after(Some(b)).unwrap(), None);

        let row = table.get_row(b, Some(&["NAME"][..])).unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("name"), Some(&OwnedValue::from("b")));
    }

    #[test]
    fn rejected_insert_leaves_table_unchanged() {
        let table = people();
        table.add_index(unique_name_index()).unwrap();
        table.insert(vec![1.into(), "Foo".into()]).unwrap();

        let err = table.insert(vec![2.into(), "foo".into()]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::ConstraintViolation { .. })
        ));
        assert_eq!(table.row_count(), 1);
        let index = table.index("byname").unwrap();
        assert_eq!(index.data().entry_count().unwrap(), 1);
    }

    #[test]
    fn update_and_delete_maintain_indexes() {
        let table = people();
        let id = table.insert(vec![1.into(), "a".into()]).unwrap();
        table.add_index(unique_name_index()).unwrap();
        let index = table.index("ByName").unwrap();
        assert_eq!(index.data().entry_count().unwrap(), 1);

        table.update(id, vec![1.into(), "z".into()]).unwrap();
        let entries = index.data().entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].row_id(), id);

        assert!(table.delete(id).unwrap());
        assert_eq!(index.data().entry_count().unwrap(), 0);
        assert!(!table.delete(id).unwrap());
    }
}
