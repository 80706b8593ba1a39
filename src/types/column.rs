//! # Column Definitions
//!
//! `ColumnDef` pairs a `DataType` with the metadata the index codec needs:
//! the column's position in a table row, decimal precision/scale for
//! `Numeric` columns and the declared text length.
//!
//! ```ignore
//! use jetdb::types::{ColumnDef, DataType};
//!
//! let id = ColumnDef::new("ID", DataType::Long);
//! let price = ColumnDef::numeric("Price", 18, 2);
//! let name = ColumnDef::text("Name", 50);
//! ```

use super::DataType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    name: String,
    data_type: DataType,
    precision: u8,
    scale: u8,
    length: Option<u16>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            precision: 0,
            scale: 0,
            length: None,
        }
    }

    pub fn numeric(name: impl Into<String>, precision: u8, scale: u8) -> Self {
        Self {
            precision,
            scale,
            ..Self::new(name, DataType::Numeric)
        }
    }

    pub fn text(name: impl Into<String>, length: u16) -> Self {
        Self {
            length: Some(length),
            ..Self::new(name, DataType::Text)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn length(&self) -> Option<u16> {
        self.length
    }

    /// Case-insensitive name match, the way Access resolves column names.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
