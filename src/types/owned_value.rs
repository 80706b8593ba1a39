//! # Column Values
//!
//! `OwnedValue` is a value as stored in a table column. Rows handed to the
//! index layer and returned by cursors are made of these.
//!
//! ## Conversion
//!
//! Column values enter expressions through [`OwnedValue::to_value`] and
//! expression results are written back with [`OwnedValue::from_value`],
//! which coerces into the target column type:
//!
//! ```ignore
//! let v: Value = row[0].to_value()?;
//! let stored = OwnedValue::from_value(&result, DataType::Long, &locale)?;
//! ```

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::{DataType, Value};
use crate::config::LocaleContext;
use crate::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum OwnedValue {
    Null,
    Bool(bool),
    Byte(u8),
    Int(i16),
    Long(i32),
    BigInt(i64),
    Money(Decimal),
    Float(f32),
    Double(f64),
    DateTime(NaiveDateTime),
    Text(String),
    Binary(Vec<u8>),
    Guid([u8; 16]),
    Numeric(Decimal),
}

impl OwnedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, OwnedValue::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        OwnedValue::Text(s.into())
    }

    /// Converts a column value into an expression value. Booleans become
    /// `-1`/`0`, exact wide numbers become decimals.
    pub fn to_value(&self) -> Result<Value, EvalError> {
        Ok(match self {
            OwnedValue::Null => Value::Null,
            OwnedValue::Bool(b) => Value::from_bool(*b),
            OwnedValue::Byte(b) => Value::Long(*b as i32),
            OwnedValue::Int(i) => Value::Long(*i as i32),
            OwnedValue::Long(l) => Value::Long(*l),
            OwnedValue::BigInt(l) => Value::BigDecimal(Decimal::from(*l)),
            OwnedValue::Money(d) | OwnedValue::Numeric(d) => Value::BigDecimal(*d),
            OwnedValue::Float(f) => Value::Double(*f as f64),
            OwnedValue::Double(d) => Value::Double(*d),
            OwnedValue::DateTime(dt) => Value::DateTime(*dt),
            OwnedValue::Text(s) => Value::String(s.clone()),
            OwnedValue::Guid(g) => Value::String(format_guid(g)),
            OwnedValue::Binary(_) => {
                return Err(EvalError::coercion("binary data", "expression value"))
            }
        })
    }

    /// Coerces an expression result into a value of column type `data_type`.
    pub fn from_value(
        value: &Value,
        data_type: DataType,
        locale: &LocaleContext,
    ) -> Result<OwnedValue, EvalError> {
        if value.is_null() {
            return Ok(OwnedValue::Null);
        }
        Ok(match data_type {
            DataType::Boolean => OwnedValue::Bool(value.as_bool()),
            DataType::Byte => {
                let l = value.as_long(locale)?;
                OwnedValue::Byte(u8::try_from(l).map_err(|_| EvalError::coercion(l, "Byte"))?)
            }
            DataType::Int => {
                let l = value.as_long(locale)?;
                OwnedValue::Int(i16::try_from(l).map_err(|_| EvalError::coercion(l, "Integer"))?)
            }
            DataType::Long => OwnedValue::Long(value.as_long(locale)?),
            DataType::BigInt => {
                let d = value.as_decimal(locale)?;
                OwnedValue::BigInt(
                    d.round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointNearestEven)
                        .to_i64()
                        .ok_or_else(|| EvalError::coercion(d, "BigInt"))?,
                )
            }
            DataType::Money => OwnedValue::Money(value.as_decimal(locale)?.round_dp(4)),
            DataType::Numeric => OwnedValue::Numeric(value.as_decimal(locale)?),
            DataType::Float => OwnedValue::Float(value.as_double(locale)? as f32),
            DataType::Double => OwnedValue::Double(value.as_double(locale)?),
            DataType::ShortDateTime => OwnedValue::DateTime(value.as_date_time(locale)?),
            DataType::Text | DataType::Memo => OwnedValue::Text(value.as_string(locale)),
            DataType::Guid => {
                let text = value.as_string(locale);
                OwnedValue::Guid(
                    parse_guid(&text).ok_or_else(|| EvalError::coercion(text, "GUID"))?,
                )
            }
            DataType::Binary | DataType::Ole | DataType::ComplexType => {
                return Err(EvalError::coercion(
                    value.as_string(locale),
                    "binary column",
                ))
            }
        })
    }
}

impl From<&str> for OwnedValue {
    fn from(s: &str) -> Self {
        OwnedValue::Text(s.to_string())
    }
}

impl From<i32> for OwnedValue {
    fn from(l: i32) -> Self {
        OwnedValue::Long(l)
    }
}

impl From<bool> for OwnedValue {
    fn from(b: bool) -> Self {
        OwnedValue::Bool(b)
    }
}

impl From<f64> for OwnedValue {
    fn from(d: f64) -> Self {
        OwnedValue::Double(d)
    }
}

/// Renders a GUID in the brace form Access displays.
pub fn format_guid(g: &[u8; 16]) -> String {
    let hex: String = g.iter().map(|b| format!("{:02X}", b)).collect();
    format!(
        "{{{}-{}-{}-{}-{}}}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

pub fn parse_guid(text: &str) -> Option<[u8; 16]> {
    let digits: String = text
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .chars()
        .filter(|c| *c != '-')
        .collect();
    if digits.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(digits.get(i * 2..i * 2 + 2)?, 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_become_access_truth_values() {
        assert_eq!(OwnedValue::Bool(true).to_value().unwrap(), Value::Long(-1));
        assert_eq!(OwnedValue::Bool(false).to_value().unwrap(), Value::Long(0));
    }

    #[test]
    fn from_value_checks_target_width() {
        let locale = LocaleContext::default();
        assert_eq!(
            OwnedValue::from_value(&Value::Double(2.5), DataType::Int, &locale).unwrap(),
            OwnedValue::Int(2)
        );
        assert!(OwnedValue::from_value(&Value::Long(70000), DataType::Int, &locale).is_err());
        assert!(OwnedValue::from_value(&Value::Long(-1), DataType::Byte, &locale).is_err());
        assert_eq!(
            OwnedValue::from_value(&Value::Null, DataType::Text, &locale).unwrap(),
            OwnedValue::Null
        );
    }

    #[test]
    fn guid_text_round_trips() {
        let g = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB,
            0xCD, 0xEF,
        ];
        let text = format_guid(&g);
        assert_eq!(text, "{01234567-89AB-CDEF-0123-456789ABCDEF}");
        assert_eq!(parse_guid(&text), Some(g));
        assert_eq!(parse_guid("{bogus}"), None);
    }

    #[test]
    fn binary_values_do_not_enter_expressions() {
        assert!(OwnedValue::Binary(vec![1, 2, 3]).to_value().is_err());
    }
}
