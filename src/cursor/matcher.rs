//! Column value equality used by the cursor find operations.

use std::fmt;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::types::OwnedValue;

pub trait ColumnMatcher: Send + Sync + fmt::Debug {
    /// Whether `actual`, read from `column`, matches the searched `expected`.
    fn matches(&self, column: &str, expected: &OwnedValue, actual: &OwnedValue) -> bool;
}

/// Exact equality, with numbers compared by value across widths.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleColumnMatcher;

impl ColumnMatcher for SimpleColumnMatcher {
    fn matches(&self, _column: &str, expected: &OwnedValue, actual: &OwnedValue) -> bool {
        if expected == actual {
            return true;
        }
        match (numeric(expected), numeric(actual)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Text compared ignoring case, everything else as [`SimpleColumnMatcher`].
/// Matches the way text index entries collapse case.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitiveColumnMatcher;

impl ColumnMatcher for CaseInsensitiveColumnMatcher {
    fn matches(&self, column: &str, expected: &OwnedValue, actual: &OwnedValue) -> bool {
        match (expected, actual) {
            (OwnedValue::Text(a), OwnedValue::Text(b)) => {
                a.chars()
                    .flat_map(char::to_uppercase)
                    .eq(b.chars().flat_map(char::to_uppercase))
            }
            _ => SimpleColumnMatcher.matches(column, expected, actual),
        }
    }
}

fn numeric(v: &OwnedValue) -> Option<Decimal> {
    match v {
        OwnedValue::Byte(b) => Some(Decimal::from(*b)),
        OwnedValue::Int(i) => Some(Decimal::from(*i)),
        OwnedValue::Long(i) => Some(Decimal::from(*i)),
        OwnedValue::BigInt(i) => Some(Decimal::from(*i)),
        OwnedValue::Money(d) | OwnedValue::Numeric(d) => Some(*d),
        OwnedValue::Float(f) => Decimal::from_f32(*f),
        OwnedValue::Double(f) => Decimal::from_f64(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_matcher_compares_numbers_by_value() {
        let m = SimpleColumnMatcher;
        assert!(m.matches("c", &OwnedValue::Long(3), &OwnedValue::Int(3)));
        assert!(m.matches("c", &OwnedValue::Double(2.5), &OwnedValue::Money(Decimal::new(25, 1))));
        assert!(!m.matches("c", &"Foo".into(), &"foo".into()));
        assert!(m.matches("c", &OwnedValue::Null, &OwnedValue::Null));
        assert!(!m.matches("c", &OwnedValue::Null, &OwnedValue::Long(0)));
    }

    #[test]
    fn case_insensitive_matcher_folds_text() {
        let m = CaseInsensitiveColumnMatcher;
        assert!(m.matches("c", &"straße".into(), &"STRASSE".into()));
        assert!(m.matches("c", &"Foo".into(), &"fOO".into()));
        assert!(!m.matches("c", &"Foo".into(), &"Fob".into()));
    }
}
