//! # Type System
//!
//! ## Module Structure
//!
//! - `data_type`: Access column type codes (`DataType`)
//! - `column`: `ColumnDef` with precision/scale/length metadata
//! - `owned_value`: `OwnedValue`, a value stored in a table column
//! - `value`: `Value`, the expression runtime value, and its coercions
//! - `temporal`: date doubles, date patterns and date parsing
//!
//! ## Key Types
//!
//! | Type          | Purpose                                   |
//! |---------------|-------------------------------------------|
//! | `DataType`    | Column type code from the table definition|
//! | `ColumnDef`   | Column definition with metadata           |
//! | `OwnedValue`  | Row value (index input, cursor output)    |
//! | `Value`       | Expression value (Null/String/.../Decimal)|
//! | `ValueType`   | Discriminant of `Value`                   |

mod column;
mod data_type;
mod owned_value;
pub mod temporal;
mod value;

pub use column::ColumnDef;
pub use data_type::DataType;
pub use owned_value::{format_guid, parse_guid, OwnedValue};
pub use value::{
    double_to_long, format_decimal, format_double, parse_decimal, parse_number, seconds_of_day, Value,
    ValueType,
};
