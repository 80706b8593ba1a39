//! # Index Definitions
//!
//! An `IndexDefinition` is the ordered list of indexed columns plus the
//! uniqueness and null-handling flags. Column order fixes the byte order of
//! every encoded entry, so a definition is immutable once built.
//!
//! ```ignore
//! let def = IndexDefinition::builder()
//!     .column(ColumnDef::new("LastName", DataType::Text), 1, true)
//!     .column(ColumnDef::new("FirstName", DataType::Text), 2, true)
//!     .unique(true)
//!     .build()?;
//! ```

use eyre::{ensure, Result};

use crate::config::MAX_INDEX_COLUMNS;
use crate::types::ColumnDef;

/// One indexed column: the column definition, its position in a table row
/// and its sort direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    column: ColumnDef,
    column_index: usize,
    ascending: bool,
}

impl IndexColumn {
    pub fn column(&self) -> &ColumnDef {
        &self.column
    }

    pub fn name(&self) -> &str {
        self.column.name()
    }

    /// Position of the column within a full table row.
    pub fn column_index(&self) -> usize {
        self.column_index
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    columns: Vec<IndexColumn>,
    unique: bool,
    ignore_nulls: bool,
    required: bool,
}

impl IndexDefinition {
    pub fn builder() -> IndexDefinitionBuilder {
        IndexDefinitionBuilder::default()
    }

    pub fn columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of `name` among the indexed columns (case-insensitive).
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.column.is_named(name))
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn ignores_nulls(&self) -> bool {
        self.ignore_nulls
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

#[derive(Debug, Default)]
pub struct IndexDefinitionBuilder {
    columns: Vec<IndexColumn>,
    unique: bool,
    ignore_nulls: bool,
    required: bool,
}

impl IndexDefinitionBuilder {
    pub fn column(mut self, column: ColumnDef, column_index: usize, ascending: bool) -> Self {
        self.columns.push(IndexColumn {
            column,
            column_index,
            ascending,
        });
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn ignore_nulls(mut self, ignore: bool) -> Self {
        self.ignore_nulls = ignore;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Primary keys are unique and reject nulls.
    pub fn primary_key(self) -> Self {
        self.unique(true).required(true)
    }

    pub fn build(self) -> Result<IndexDefinition> {
        ensure!(!self.columns.is_empty(), "index must have at least one column");
        ensure!(
            self.columns.len() <= MAX_INDEX_COLUMNS,
            "index has {} columns, maximum is {}",
            self.columns.len(),
            MAX_INDEX_COLUMNS
        );
        for (i, col) in self.columns.iter().enumerate() {
            ensure!(
                !self.columns[..i]
                    .iter()
                    .any(|c| c.column.is_named(col.column.name())),
                "column '{}' appears twice in index",
                col.column.name()
            );
        }
        Ok(IndexDefinition {
            columns: self.columns,
            unique: self.unique,
            ignore_nulls: self.ignore_nulls,
            required: self.required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn builder_validates_columns() {
        assert!(IndexDefinition::builder().build().is_err());

        let dup = IndexDefinition::builder()
            .column(ColumnDef::new("A", DataType::Long), 0, true)
            .column(ColumnDef::new("a", DataType::Long), 1, true)
            .build();
        assert!(dup.is_err());

        let def = IndexDefinition::builder()
            .column(ColumnDef::new("A", DataType::Long), 0, true)
            .column(ColumnDef::new("B", DataType::Text), 3, false)
            .primary_key()
            .build()
            .unwrap();
        assert!(def.is_unique() && def.is_required());
        assert_eq!(def.position_of("b"), Some(1));
        assert_eq!(def.columns()[1].column_index(), 3);
        assert!(!def.columns()[1].is_ascending());
    }
}
