//! # Index Column Codecs
//!
//! Encodes the indexed columns of a row into the byte string stored in an
//! index entry. Every encoding is order-preserving: comparing two encoded
//! keys with `memcmp` gives the same answer as comparing the values.
//!
//! ## Layout
//!
//! Each column starts with a flag byte:
//!
//! ```text
//!              ascending   descending
//! value        0x7F        0x80
//! null         0x00        0xFF
//! ```
//!
//! followed by the value bytes (omitted for nulls). Descending columns store
//! the value bytes bit-inverted.
//!
//! | Type                    | Value bytes                                        |
//! |-------------------------|----------------------------------------------------|
//! | Boolean                 | none: the flag byte itself is 0x00 true / 0xFF false|
//! | Byte                    | 1 byte unsigned                                    |
//! | Int / Long / BigInt     | big-endian, sign bit flipped                       |
//! | Money                   | i64 scaled by 10^4, big-endian, sign bit flipped   |
//! | Float / Double / Date   | IEEE bits: negatives inverted, positives sign flip |
//! | Numeric                 | i128 mantissa at column scale, sign bit flipped    |
//! | Text / Memo             | General sort order codes (see `collation`)         |
//! | Binary / GUID           | 8-byte chunks, each followed by a length marker    |
//!
//! Text keys hold a case- and accent-folded primary run followed by an
//! accent run, each ended by 0x01, so neither run ever starts with a byte
//! that could be mistaken for the terminator.
//!
//! ## Partial Keys
//!
//! `IndexValue::Sentinel` ends the key: encoding stops there and the entry
//! takes `RowId::FIRST` or `RowId::LAST`, which makes it sort before or after
//! every entry sharing the encoded prefix.

use chrono::NaiveDateTime;
use eyre::{bail, ensure, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::collation::encode_text;
use super::definition::{IndexColumn, IndexDefinition};
use super::entry::{Entry, IndexValue, RowId, Sentinel};
use crate::config::{
    NumericConfig, ASC_BOOLEAN_FALSE, ASC_BOOLEAN_TRUE, ASC_NULL_FLAG, ASC_START_FLAG, BINARY_CHUNK_MORE,
    BINARY_CHUNK_SIZE, DESC_NULL_FLAG, DESC_START_FLAG, MAX_NUMERIC_PRECISION, MAX_ROW_ID_PAGE,
    MONEY_SCALE,
};
use crate::error::IndexError;
use crate::types::{parse_guid, temporal, DataType, OwnedValue};

/// Encodes a full table row (indexed by table column position) into an
/// entry. Fails with `IndexError::DataType` when a value does not fit its
/// column.
pub fn encode_row(def: &IndexDefinition, row: &[OwnedValue], row_id: RowId) -> Result<Entry> {
    check_row_id(row_id)?;
    let mut bytes = Vec::with_capacity(16 * def.column_count());
    for col in def.columns() {
        let value = row.get(col.column_index()).ok_or_else(|| {
            eyre::eyre!(
                "row has {} values, index column '{}' is at position {}",
                row.len(),
                col.name(),
                col.column_index()
            )
        })?;
        encode_column(col, value, &mut bytes)?;
    }
    Ok(Entry::new(bytes, row_id))
}

/// Encodes a key given in index column order. Missing trailing values and
/// the first sentinel end the key; the entry's row id places it before
/// (`Min`) or after (`Max`) everything sharing the prefix.
pub fn encode_key(def: &IndexDefinition, values: &[IndexValue], default: Sentinel) -> Result<Entry> {
    ensure!(
        values.len() <= def.column_count(),
        "key has {} values but index has {} columns",
        values.len(),
        def.column_count()
    );

    let mut bytes = Vec::with_capacity(16 * values.len());
    let mut end = if values.len() < def.column_count() {
        Some(default)
    } else {
        None
    };

    for (col, value) in def.columns().iter().zip(values) {
        match value {
            IndexValue::Value(v) => encode_column(col, v, &mut bytes)?,
            IndexValue::Sentinel(s) => {
                end = Some(*s);
                break;
            }
        }
    }

    let row_id = match end {
        Some(Sentinel::Min) => RowId::FIRST,
        Some(Sentinel::Max) => RowId::LAST,
        None if default == Sentinel::Max => RowId::LAST,
        None => RowId::FIRST,
    };
    Ok(Entry::new(bytes, row_id))
}

/// Whether every indexed column of `row` is null.
pub fn is_null_row(def: &IndexDefinition, row: &[OwnedValue]) -> bool {
    def.columns()
        .iter()
        .all(|c| row.get(c.column_index()).is_none_or(OwnedValue::is_null))
}

pub fn has_null(def: &IndexDefinition, row: &[OwnedValue]) -> bool {
    def.columns()
        .iter()
        .any(|c| row.get(c.column_index()).is_none_or(OwnedValue::is_null))
}

/// First column whose type has no index encoding, as an unsupported reason.
pub fn unsupported_reason(def: &IndexDefinition) -> Option<String> {
    def.columns()
        .iter()
        .find(|c| !c.column().data_type().is_indexable())
        .map(|c| {
            format!(
                "column '{}' of type {:?} has no index collation",
                c.name(),
                c.column().data_type()
            )
        })
}

pub fn encode_column(col: &IndexColumn, value: &OwnedValue, out: &mut Vec<u8>) -> Result<()> {
    let asc = col.is_ascending();
    let data_type = col.column().data_type();

    if data_type == DataType::Boolean {
        let truth = match value {
            OwnedValue::Null => false,
            other => to_bool(col, other)?,
        };
        let flag = if truth {
            ASC_BOOLEAN_TRUE
        } else {
            ASC_BOOLEAN_FALSE
        };
        out.push(if asc { flag } else { !flag });
        return Ok(());
    }

    if value.is_null() {
        out.push(if asc { ASC_NULL_FLAG } else { DESC_NULL_FLAG });
        return Ok(());
    }

    out.push(if asc { ASC_START_FLAG } else { DESC_START_FLAG });
    let start = out.len();

    match data_type {
        DataType::Byte => {
            let v = to_i64(col, value)?;
            let b = u8::try_from(v).map_err(|_| out_of_range(col, v))?;
            out.push(b);
        }
        DataType::Int => {
            let v = to_i64(col, value)?;
            let v = i16::try_from(v).map_err(|_| out_of_range(col, v))?;
            out.extend_from_slice(&((v as u16) ^ 0x8000).to_be_bytes());
        }
        DataType::Long => {
            let v = to_i64(col, value)?;
            let v = i32::try_from(v).map_err(|_| out_of_range(col, v))?;
            out.extend_from_slice(&((v as u32) ^ 0x8000_0000).to_be_bytes());
        }
        DataType::BigInt => {
            let v = to_i64(col, value)?;
            out.extend_from_slice(&((v as u64) ^ (1 << 63)).to_be_bytes());
        }
        DataType::Money => {
            let d = to_decimal(col, value)?;
            let scaled = d
                .checked_mul(Decimal::from(10i64.pow(MONEY_SCALE)))
                .map(|s| s.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
                .and_then(|s| s.to_i64())
                .ok_or_else(|| data_type_error(col, format!("{} overflows Currency", d)))?;
            out.extend_from_slice(&((scaled as u64) ^ (1 << 63)).to_be_bytes());
        }
        DataType::Float => {
            let f = to_f64(col, value)? as f32;
            if !f.is_finite() {
                return Err(data_type_error(col, "value overflows Single".to_string()));
            }
            out.extend_from_slice(&order_f32(f).to_be_bytes());
        }
        DataType::Double => {
            let f = to_f64(col, value)?;
            out.extend_from_slice(&order_f64(f).to_be_bytes());
        }
        DataType::ShortDateTime => {
            let f = to_date_double(col, value)?;
            out.extend_from_slice(&order_f64(f).to_be_bytes());
        }
        DataType::Numeric => {
            let mantissa = to_numeric_mantissa(col, value)?;
            out.extend_from_slice(&((mantissa as u128) ^ (1 << 127)).to_be_bytes());
        }
        DataType::Text | DataType::Memo => {
            let text = to_text(col, value)?;
            encode_text(&text, out);
        }
        DataType::Binary => {
            let bytes = to_bytes(col, value)?;
            encode_binary(&bytes, out);
        }
        DataType::Guid => {
            let bytes = match value {
                OwnedValue::Guid(g) => g.to_vec(),
                OwnedValue::Text(s) => parse_guid(s)
                    .ok_or_else(|| data_type_error(col, format!("'{}' is not a GUID", s)))?
                    .to_vec(),
                OwnedValue::Binary(b) if b.len() == 16 => b.clone(),
                other => return Err(type_mismatch(col, other)),
            };
            encode_binary(&bytes, out);
        }
        // flag byte only, written above
        DataType::Boolean => {}
        DataType::Ole | DataType::ComplexType => {
            bail!(IndexError::Unsupported {
                index: col.name().to_string(),
                reason: format!("column type {:?} cannot be indexed", data_type),
            })
        }
    }

    if !asc {
        for b in &mut out[start..] {
            *b = !*b;
        }
    }
    Ok(())
}

fn encode_binary(bytes: &[u8], out: &mut Vec<u8>) {
    let mut chunks = bytes.chunks(BINARY_CHUNK_SIZE).peekable();
    while let Some(chunk) = chunks.next() {
        out.extend_from_slice(chunk);
        out.resize(out.len() + BINARY_CHUNK_SIZE - chunk.len(), 0);
        if chunks.peek().is_some() {
            out.push(BINARY_CHUNK_MORE);
        } else {
            out.push(chunk.len() as u8);
        }
    }
}

/// Maps a float onto an unsigned integer with the same order.
fn order_f64(f: f64) -> u64 {
    let f = if f == 0.0 { 0.0 } else { f };
    let bits = f.to_bits();
    if f.is_sign_negative() {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}

fn order_f32(f: f32) -> u32 {
    let f = if f == 0.0 { 0.0 } else { f };
    let bits = f.to_bits();
    if f.is_sign_negative() {
        !bits
    } else {
        bits ^ (1 << 31)
    }
}

fn to_bool(col: &IndexColumn, value: &OwnedValue) -> Result<bool> {
    Ok(match value {
        OwnedValue::Bool(b) => *b,
        OwnedValue::Byte(_)
        | OwnedValue::Int(_)
        | OwnedValue::Long(_)
        | OwnedValue::BigInt(_)
        | OwnedValue::Float(_)
        | OwnedValue::Double(_)
        | OwnedValue::Money(_)
        | OwnedValue::Numeric(_) => to_f64(col, value)? != 0.0,
        OwnedValue::Text(s) => {
            let t = s.trim();
            !(t.eq_ignore_ascii_case("false") || t.eq_ignore_ascii_case("no") || t == "0")
        }
        other => return Err(type_mismatch(col, other)),
    })
}

fn to_i64(col: &IndexColumn, value: &OwnedValue) -> Result<i64> {
    match value {
        OwnedValue::Bool(b) => Ok(if *b { -1 } else { 0 }),
        OwnedValue::Byte(b) => Ok(*b as i64),
        OwnedValue::Int(i) => Ok(*i as i64),
        OwnedValue::Long(l) => Ok(*l as i64),
        OwnedValue::BigInt(l) => Ok(*l),
        OwnedValue::Money(d) | OwnedValue::Numeric(d) => d
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_i64()
            .ok_or_else(|| data_type_error(col, format!("{} overflows {:?}", d, col.column().data_type()))),
        OwnedValue::Float(_) | OwnedValue::Double(_) | OwnedValue::Text(_) => {
            let f = to_f64(col, value)?.round_ties_even();
            if f < i64::MIN as f64 || f >= i64::MAX as f64 {
                return Err(data_type_error(col, format!("{} overflows", f)));
            }
            Ok(f as i64)
        }
        other => Err(type_mismatch(col, other)),
    }
}

fn to_f64(col: &IndexColumn, value: &OwnedValue) -> Result<f64> {
    match value {
        OwnedValue::Bool(b) => Ok(if *b { -1.0 } else { 0.0 }),
        OwnedValue::Byte(b) => Ok(*b as f64),
        OwnedValue::Int(i) => Ok(*i as f64),
        OwnedValue::Long(l) => Ok(*l as f64),
        OwnedValue::BigInt(l) => Ok(*l as f64),
        OwnedValue::Money(d) | OwnedValue::Numeric(d) => d
            .to_f64()
            .ok_or_else(|| data_type_error(col, format!("{} is not a number", d))),
        OwnedValue::Float(f) => Ok(*f as f64),
        OwnedValue::Double(d) => Ok(*d),
        OwnedValue::DateTime(dt) => Ok(temporal::to_date_double(*dt)),
        OwnedValue::Text(s) => crate::types::parse_number(s, &NumericConfig::default())
            .and_then(|v| match v {
                crate::types::Value::Long(l) => Some(l as f64),
                crate::types::Value::Double(d) => Some(d),
                _ => None,
            })
            .ok_or_else(|| data_type_error(col, format!("'{}' is not a number", s))),
        other => Err(type_mismatch(col, other)),
    }
}

fn to_decimal(col: &IndexColumn, value: &OwnedValue) -> Result<Decimal> {
    match value {
        OwnedValue::Money(d) | OwnedValue::Numeric(d) => Ok(*d),
        OwnedValue::Byte(b) => Ok(Decimal::from(*b)),
        OwnedValue::Int(i) => Ok(Decimal::from(*i)),
        OwnedValue::Long(l) => Ok(Decimal::from(*l)),
        OwnedValue::BigInt(l) => Ok(Decimal::from(*l)),
        OwnedValue::Text(s) => crate::types::parse_decimal(s, &NumericConfig::default())
            .ok_or_else(|| data_type_error(col, format!("'{}' is not a number", s))),
        other => {
            let f = to_f64(col, other)?;
            Decimal::from_f64(f).ok_or_else(|| data_type_error(col, format!("{} overflows Decimal", f)))
        }
    }
}

fn to_numeric_mantissa(col: &IndexColumn, value: &OwnedValue) -> Result<i128> {
    let column = col.column();
    let precision = if column.precision() == 0 {
        MAX_NUMERIC_PRECISION
    } else {
        column.precision().min(MAX_NUMERIC_PRECISION)
    };
    let scale = column.scale() as u32;

    let d = to_decimal(col, value)?
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
    let mut mantissa = d.mantissa();
    let current_scale = d.scale();
    if current_scale < scale {
        mantissa = mantissa
            .checked_mul(10i128.pow(scale - current_scale))
            .ok_or_else(|| data_type_error(col, format!("{} overflows Decimal", d)))?;
    }

    let digits = mantissa.unsigned_abs().checked_ilog10().map_or(1, |l| l + 1);
    if digits > precision as u32 {
        return Err(data_type_error(
            col,
            format!(
                "{} has {} digits, column precision is {}",
                d, digits, precision
            ),
        ));
    }
    Ok(mantissa)
}

fn to_date_double(col: &IndexColumn, value: &OwnedValue) -> Result<f64> {
    match value {
        OwnedValue::DateTime(dt) => Ok(temporal::to_date_double(*dt)),
        OwnedValue::Text(s) => {
            let parsed = temporal::parse_date_time(s, &Default::default(), 2000)
                .ok_or_else(|| data_type_error(col, format!("'{}' is not a date", s)))?;
            let dt: NaiveDateTime = parsed
                .date
                .unwrap_or_else(temporal::epoch_date)
                .and_time(parsed.time.unwrap_or_default());
            Ok(temporal::to_date_double(dt))
        }
        other => to_f64(col, other),
    }
}

fn to_text(col: &IndexColumn, value: &OwnedValue) -> Result<String> {
    Ok(match value {
        OwnedValue::Text(s) => s.clone(),
        OwnedValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        OwnedValue::Byte(b) => b.to_string(),
        OwnedValue::Int(i) => i.to_string(),
        OwnedValue::Long(l) => l.to_string(),
        OwnedValue::BigInt(l) => l.to_string(),
        OwnedValue::Money(d) | OwnedValue::Numeric(d) => d.normalize().to_string(),
        OwnedValue::Float(f) => f.to_string(),
        OwnedValue::Double(d) => d.to_string(),
        OwnedValue::Guid(g) => crate::types::format_guid(g),
        other => return Err(type_mismatch(col, other)),
    })
}

fn to_bytes(col: &IndexColumn, value: &OwnedValue) -> Result<Vec<u8>> {
    match value {
        OwnedValue::Binary(b) => Ok(b.clone()),
        OwnedValue::Guid(g) => Ok(g.to_vec()),
        OwnedValue::Text(s) => Ok(s.as_bytes().to_vec()),
        other => Err(type_mismatch(col, other)),
    }
}

/// Rejects row ids whose page number would be truncated when stored.
pub(crate) fn check_row_id(row_id: RowId) -> Result<()> {
    if row_id.is_valid() && !row_id.fits_entry() {
        return Err(IndexError::DataType {
            column: "row id".to_string(),
            reason: format!(
                "page number {} exceeds the largest storable page {}",
                row_id.page_number(),
                MAX_ROW_ID_PAGE
            ),
        }
        .into());
    }
    Ok(())
}

fn data_type_error(col: &IndexColumn, reason: String) -> eyre::Report {
    IndexError::DataType {
        column: col.name().to_string(),
        reason,
    }
    .into()
}

fn out_of_range(col: &IndexColumn, v: i64) -> eyre::Report {
    data_type_error(
        col,
        format!("{} is out of range for {:?}", v, col.column().data_type()),
    )
}

fn type_mismatch(col: &IndexColumn, value: &OwnedValue) -> eyre::Report {
    data_type_error(
        col,
        format!(
            "cannot store {:?} in a {:?} column",
            value,
            col.column().data_type()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{END_TEXT, TEXT_LETTER_BASE};
    use crate::types::ColumnDef;
    use proptest::prelude::*;

    fn single(dt: DataType, ascending: bool) -> IndexDefinition {
        IndexDefinition::builder()
            .column(ColumnDef::new("C", dt), 0, ascending)
            .build()
            .unwrap()
    }

    fn key(def: &IndexDefinition, v: OwnedValue) -> Vec<u8> {
        encode_row(def, &[v], RowId::new(1, 0)).unwrap().bytes().to_vec()
    }

    #[test]
    fn long_layout_matches_format() {
        let def = single(DataType::Long, true);
        assert_eq!(key(&def, OwnedValue::Long(1)), vec![0x7F, 0x80, 0, 0, 1]);
        assert_eq!(key(&def, OwnedValue::Long(-1)), vec![0x7F, 0x7F, 0xFF, 0xFF, 0xFF]);
        assert_eq!(key(&def, OwnedValue::Null), vec![0x00]);

        let desc = single(DataType::Long, false);
        assert_eq!(key(&desc, OwnedValue::Long(1)), vec![0x80, 0x7F, 0xFF, 0xFF, 0xFE]);
        assert_eq!(key(&desc, OwnedValue::Null), vec![0xFF]);
    }

    #[test]
    fn text_collapses_case_and_terminates() {
        let def = single(DataType::Text, true);
        assert_eq!(
            key(&def, OwnedValue::text("ab")),
            vec![0x7F, TEXT_LETTER_BASE, TEXT_LETTER_BASE + 1, END_TEXT, END_TEXT]
        );
        assert_eq!(key(&def, OwnedValue::text("Foo")), key(&def, OwnedValue::text("fOO")));
        assert_eq!(key(&def, OwnedValue::text("")), vec![0x7F, END_TEXT, END_TEXT]);
        assert!(key(&def, OwnedValue::Null) < key(&def, OwnedValue::text("")));
        assert!(key(&def, OwnedValue::text("Smith")) < key(&def, OwnedValue::text("Smithers")));
    }

    #[test]
    fn text_follows_general_sort_order() {
        let def = single(DataType::Text, true);
        let k = |s: &str| key(&def, OwnedValue::text(s));
        assert!(k("Ärger") < k("Zebra"));
        assert!(k("éclair") < k("f"));
        assert!(k("cote") < k("côte"));
        assert!(k("côte") < k("coter"));

        let desc = single(DataType::Text, false);
        let d = |s: &str| key(&desc, OwnedValue::text(s));
        assert!(d("Zebra") < d("Ärger"));
    }

    #[test]
    fn long_text_is_truncated() {
        let def = single(DataType::Memo, true);
        let a = "x".repeat(300);
        let b = format!("{}{}", "x".repeat(255), "yyyy");
        assert_eq!(key(&def, OwnedValue::text(a)), key(&def, OwnedValue::text(b)));
    }

    #[test]
    fn booleans_are_flag_only() {
        let def = single(DataType::Boolean, true);
        assert_eq!(key(&def, OwnedValue::Bool(true)), vec![0x00]);
        assert_eq!(key(&def, OwnedValue::Bool(false)), vec![0xFF]);
        let desc = single(DataType::Boolean, false);
        assert_eq!(key(&desc, OwnedValue::Bool(true)), vec![0xFF]);
    }

    #[test]
    fn binary_chunks_carry_length_markers() {
        let def = single(DataType::Binary, true);
        let bytes = key(&def, OwnedValue::Binary((1..=10).collect()));
        assert_eq!(
            bytes,
            vec![0x7F, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 10, 0, 0, 0, 0, 0, 0, 2]
        );
    }

    #[test]
    fn overflow_is_a_data_type_error() {
        let def = single(DataType::Int, true);
        let err = encode_row(&def, &[OwnedValue::Long(70000)], RowId::new(1, 0)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::DataType { .. })
        ));

        let numeric = IndexDefinition::builder()
            .column(ColumnDef::numeric("N", 4, 2), 0, true)
            .build()
            .unwrap();
        assert!(encode_row(&numeric, &[OwnedValue::Numeric(Decimal::new(12345, 1))], RowId::new(1, 0)).is_err());
        assert!(encode_row(&numeric, &[OwnedValue::Numeric(Decimal::new(1234, 2))], RowId::new(1, 0)).is_ok());
    }

    #[test]
    fn row_ids_past_three_bytes_are_rejected() {
        let def = single(DataType::Long, true);
        let row = [OwnedValue::Long(1)];
        assert!(encode_row(&def, &row, RowId::new(MAX_ROW_ID_PAGE, 0)).is_ok());
        let err = encode_row(&def, &row, RowId::new(MAX_ROW_ID_PAGE + 1, 0)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::DataType { .. })
        ));
    }

    #[test]
    fn partial_key_stops_at_sentinel() {
        let def = IndexDefinition::builder()
            .column(ColumnDef::new("A", DataType::Long), 0, true)
            .column(ColumnDef::new("B", DataType::Long), 1, true)
            .build()
            .unwrap();
        let min = encode_key(
            &def,
            &[OwnedValue::Long(5).into(), Sentinel::Min.into()],
            Sentinel::Min,
        )
        .unwrap();
        assert_eq!(min.bytes().len(), 5);
        assert_eq!(min.row_id(), RowId::FIRST);

        let max = encode_key(&def, &[OwnedValue::Long(5).into()], Sentinel::Max).unwrap();
        assert_eq!(max.row_id(), RowId::LAST);

        let row = encode_row(&def, &[OwnedValue::Long(5), OwnedValue::Null], RowId::new(3, 1)).unwrap();
        assert!(min < row && row < max);
    }

    #[test]
    fn opaque_columns_are_reported_unsupported() {
        let def = single(DataType::Ole, true);
        assert!(unsupported_reason(&def).is_some());
        assert!(unsupported_reason(&single(DataType::Text, true)).is_none());
    }

    proptest! {
        #[test]
        fn long_order_is_preserved(a in any::<i32>(), b in any::<i32>()) {
            let def = single(DataType::Long, true);
            let ka = key(&def, OwnedValue::Long(a));
            let kb = key(&def, OwnedValue::Long(b));
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));

            let desc = single(DataType::Long, false);
            let da = key(&desc, OwnedValue::Long(a));
            let db = key(&desc, OwnedValue::Long(b));
            prop_assert_eq!(b.cmp(&a), da.cmp(&db));
        }

        #[test]
        fn double_order_is_preserved(a in -1e300f64..1e300, b in -1e300f64..1e300) {
            let def = single(DataType::Double, true);
            let ka = key(&def, OwnedValue::Double(a));
            let kb = key(&def, OwnedValue::Double(b));
            prop_assert_eq!(a.partial_cmp(&b).unwrap(), ka.cmp(&kb));
        }

        #[test]
        fn text_order_is_case_insensitive(a in "[a-zA-Z0-9 ]{0,20}", b in "[a-zA-Z0-9 ]{0,20}") {
            let def = single(DataType::Text, true);
            let ka = key(&def, OwnedValue::text(a.clone()));
            let kb = key(&def, OwnedValue::text(b.clone()));
            prop_assert_eq!(a.to_uppercase().cmp(&b.to_uppercase()), ka.cmp(&kb));
        }
    }
}
