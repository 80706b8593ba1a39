//! # Expression Runtime Values
//!
//! `Value` is the closed set of runtime values the expression engine works
//! with. Access has no boolean runtime type: `True` is `Long(-1)` and `False`
//! is `Long(0)`.
//!
//! ## Coercion Rules
//!
//! | From \ To   | bool            | Long / Double / Decimal        | Date                  |
//! |-------------|-----------------|--------------------------------|-----------------------|
//! | Null        | false           | error                          | error                 |
//! | String      | true            | locale-aware number parse      | locale-aware parse    |
//! | Date/Time   | true            | date double                    | itself                |
//! | Long        | != 0            | widened                        | date double           |
//! | Double      | != 0.0          | banker's rounding into Long    | date double           |
//! | BigDecimal  | != 0            | banker's rounding into Long    | date double           |
//!
//! Number parsing honors the locale's decimal and grouping separators and
//! the `&H` (hex) / `&O` (octal) radix prefixes. Radix values that fit in 16
//! bits wrap as 16-bit integers (`&HFFFF` is -1), the way Access reads them.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::temporal::{self, epoch_date, format_pattern};
use crate::config::{LocaleContext, NumericConfig};
use crate::error::EvalError;

/// Significant digits shown when a Double is rendered as text.
const DOUBLE_DISPLAY_DIGITS: i32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    String,
    Date,
    Time,
    DateTime,
    Long,
    Double,
    BigDecimal,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Long | ValueType::Double | ValueType::BigDecimal)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, ValueType::Date | ValueType::Time | ValueType::DateTime)
    }

    /// Name reported by `TypeName`.
    pub fn type_name(self) -> &'static str {
        match self {
            ValueType::Null => "Null",
            ValueType::String => "String",
            ValueType::Date | ValueType::Time | ValueType::DateTime => "Date",
            ValueType::Long => "Long",
            ValueType::Double => "Double",
            ValueType::BigDecimal => "Decimal",
        }
    }

    /// Code reported by `VarType`.
    pub fn var_type(self) -> i32 {
        match self {
            ValueType::Null => 1,
            ValueType::Long => 3,
            ValueType::Double => 5,
            ValueType::Date | ValueType::Time | ValueType::DateTime => 7,
            ValueType::String => 8,
            ValueType::BigDecimal => 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Long(i32),
    Double(f64),
    BigDecimal(Decimal),
}

impl Value {
    pub const TRUE: Value = Value::Long(-1);
    pub const FALSE: Value = Value::Long(0);

    pub fn from_bool(b: bool) -> Self {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Double result of a computation; infinities and NaN are overflow
    /// errors.
    pub fn double(d: f64) -> Result<Self, EvalError> {
        if d.is_finite() {
            Ok(Value::Double(d))
        } else {
            Err(EvalError::invalid("numeric overflow"))
        }
    }

    /// Builds the narrowest temporal value for `dt`: a time on the epoch day
    /// is a `Time`, a midnight is a `Date`.
    pub fn from_date_time(dt: NaiveDateTime) -> Self {
        if dt.date() == epoch_date() {
            Value::Time(dt.time())
        } else if dt.time() == NaiveTime::MIN {
            Value::Date(dt.date())
        } else {
            Value::DateTime(dt)
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::BigDecimal(_) => ValueType::BigDecimal,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::String(_) | Value::Date(_) | Value::Time(_) | Value::DateTime(_) => true,
            Value::Long(l) => *l != 0,
            Value::Double(d) => *d != 0.0,
            Value::BigDecimal(d) => !d.is_zero(),
        }
    }

    pub fn as_string(&self, locale: &LocaleContext) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Long(l) => l.to_string(),
            Value::Double(d) => format_double(*d, locale.numeric()),
            Value::BigDecimal(d) => format_decimal(*d, locale.numeric()),
            Value::Date(d) => format_pattern(
                d.and_time(NaiveTime::MIN),
                locale.temporal().short_date_pattern(),
                locale.temporal(),
            ),
            Value::Time(t) => format_pattern(
                epoch_date().and_time(*t),
                locale.temporal().long_time_pattern(),
                locale.temporal(),
            ),
            Value::DateTime(dt) => {
                format_pattern(*dt, &locale.temporal().general_pattern(), locale.temporal())
            }
        }
    }

    pub fn as_double(&self, locale: &LocaleContext) -> Result<f64, EvalError> {
        match self {
            Value::Null => Err(EvalError::coercion("Null", "Double")),
            Value::Long(l) => Ok(*l as f64),
            Value::Double(d) => Ok(*d),
            Value::BigDecimal(d) => d
                .to_f64()
                .ok_or_else(|| EvalError::coercion(d, "Double")),
            Value::String(s) => parse_number(s, locale.numeric())
                .ok_or_else(|| EvalError::coercion(format!("\"{}\"", s), "Double"))?
                .as_double(locale),
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => self.as_date_double(locale),
        }
    }

    /// Rounds half-to-even into a 32-bit integer.
    pub fn as_long(&self, locale: &LocaleContext) -> Result<i32, EvalError> {
        match self {
            Value::Long(l) => Ok(*l),
            Value::BigDecimal(d) => d
                .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
                .to_i32()
                .ok_or_else(|| EvalError::coercion(d, "Long")),
            Value::String(s) => parse_number(s, locale.numeric())
                .ok_or_else(|| EvalError::coercion(format!("\"{}\"", s), "Long"))?
                .as_long(locale),
            _ => {
                let d = self.as_double(locale)?;
                double_to_long(d)
            }
        }
    }

    pub fn as_decimal(&self, locale: &LocaleContext) -> Result<Decimal, EvalError> {
        match self {
            Value::Null => Err(EvalError::coercion("Null", "Decimal")),
            Value::Long(l) => Ok(Decimal::from(*l)),
            Value::BigDecimal(d) => Ok(*d),
            Value::Double(d) => {
                Decimal::from_f64(*d).ok_or_else(|| EvalError::coercion(d, "Decimal"))
            }
            Value::String(s) => parse_decimal(s, locale.numeric())
                .ok_or_else(|| EvalError::coercion(format!("\"{}\"", s), "Decimal")),
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
                let d = self.as_date_double(locale)?;
                Decimal::from_f64(d).ok_or_else(|| EvalError::coercion(d, "Decimal"))
            }
        }
    }

    pub fn as_date_time(&self, locale: &LocaleContext) -> Result<NaiveDateTime, EvalError> {
        match self {
            Value::Null => Err(EvalError::coercion("Null", "Date")),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            Value::Time(t) => Ok(epoch_date().and_time(*t)),
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => {
                let parsed = temporal::parse_date_time(s, locale.temporal(), current_year())
                    .ok_or_else(|| EvalError::coercion(format!("\"{}\"", s), "Date"))?;
                let date = parsed.date.unwrap_or_else(epoch_date);
                Ok(date.and_time(parsed.time.unwrap_or(NaiveTime::MIN)))
            }
            Value::Long(_) | Value::Double(_) | Value::BigDecimal(_) => {
                temporal::from_date_double(self.as_double(locale)?)
            }
        }
    }

    pub fn as_date_double(&self, locale: &LocaleContext) -> Result<f64, EvalError> {
        match self {
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) | Value::String(_) => {
                Ok(temporal::to_date_double(self.as_date_time(locale)?))
            }
            other => other.as_double(locale),
        }
    }

    /// Converts a value to its numeric form for arithmetic: strings are
    /// parsed, temporal values become date doubles.
    pub fn to_numeric(&self, locale: &LocaleContext) -> Result<Value, EvalError> {
        match self {
            Value::Long(_) | Value::Double(_) | Value::BigDecimal(_) | Value::Null => {
                Ok(self.clone())
            }
            Value::String(s) => parse_number(s, locale.numeric())
                .ok_or_else(|| EvalError::coercion(format!("\"{}\"", s), "number")),
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
                Ok(Value::Double(self.as_date_double(locale)?))
            }
        }
    }
}

impl Value {
    /// Converts to `target`, keeping Null as Null. Used for declared
    /// expression result types.
    pub fn coerce_to(&self, target: ValueType, locale: &LocaleContext) -> Result<Value, EvalError> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        Ok(match target {
            ValueType::Null => Value::Null,
            ValueType::String => Value::String(self.as_string(locale)),
            ValueType::Long => Value::Long(self.as_long(locale)?),
            ValueType::Double => Value::Double(self.as_double(locale)?),
            ValueType::BigDecimal => Value::BigDecimal(self.as_decimal(locale)?),
            ValueType::Date => Value::Date(self.as_date_time(locale)?.date()),
            ValueType::Time => Value::Time(self.as_date_time(locale)?.time()),
            ValueType::DateTime => Value::DateTime(self.as_date_time(locale)?),
        })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from_bool(b)
    }
}

impl From<i32> for Value {
    fn from(l: i32) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::BigDecimal(d)
    }
}

pub fn double_to_long(d: f64) -> Result<i32, EvalError> {
    let rounded = d.round_ties_even();
    if !rounded.is_finite() || rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return Err(EvalError::coercion(d, "Long"));
    }
    Ok(rounded as i32)
}

/// Parses a numeric string. Integers that fit in 32 bits become `Long`,
/// everything else a `Double`.
pub fn parse_number(text: &str, numeric: &NumericConfig) -> Option<Value> {
    let trimmed = text.trim();
    if let Some(radix) = parse_radix(trimmed) {
        return Some(Value::Long(radix));
    }

    let normalized = normalize_number(trimmed, numeric)?;
    if let Ok(l) = normalized.parse::<i32>() {
        return Some(Value::Long(l));
    }
    normalized
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
        .map(Value::Double)
}

pub fn parse_decimal(text: &str, numeric: &NumericConfig) -> Option<Decimal> {
    let trimmed = text.trim();
    if let Some(radix) = parse_radix(trimmed) {
        return Some(Decimal::from(radix));
    }
    let normalized = normalize_number(trimmed, numeric)?;
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

fn normalize_number(text: &str, numeric: &NumericConfig) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == numeric.grouping_separator() {
            continue;
        }
        if c == numeric.decimal_separator() {
            out.push('.');
        } else if c.is_ascii_digit() || matches!(c, '+' | '-' | 'e' | 'E' | '.') {
            out.push(c);
        } else {
            return None;
        }
    }
    if !out.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(out)
}

fn parse_radix(text: &str) -> Option<i32> {
    let upper = text.get(..2)?.to_ascii_uppercase();
    let radix = match upper.as_str() {
        "&H" => 16,
        "&O" => 8,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return None;
    }
    let value = u64::from_str_radix(digits, radix).ok()?;
    if value <= 0xFFFF {
        Some(value as u16 as i16 as i32)
    } else if value <= 0xFFFF_FFFF {
        Some(value as u32 as i32)
    } else {
        None
    }
}

/// Renders a Double with at most 15 significant digits, switching to
/// scientific notation for very large or very small magnitudes.
pub fn format_double(d: f64, numeric: &NumericConfig) -> String {
    if d == 0.0 {
        return "0".to_string();
    }
    if !d.is_finite() {
        return d.to_string();
    }

    let exponent = d.abs().log10().floor() as i32;
    let text = if exponent >= DOUBLE_DISPLAY_DIGITS || exponent < -DOUBLE_DISPLAY_DIGITS {
        let mantissa = d / 10f64.powi(exponent);
        let mantissa = trim_fraction(format!(
            "{:.*}",
            (DOUBLE_DISPLAY_DIGITS - 1) as usize,
            mantissa
        ));
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}E{}{}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (DOUBLE_DISPLAY_DIGITS - 1 - exponent).max(0) as usize;
        trim_fraction(format!("{:.*}", decimals, d))
    };

    localize_separator(text, numeric)
}

pub fn format_decimal(d: Decimal, numeric: &NumericConfig) -> String {
    localize_separator(d.normalize().to_string(), numeric)
}

fn trim_fraction(mut text: String) -> String {
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

fn localize_separator(text: String, numeric: &NumericConfig) -> String {
    if numeric.decimal_separator() == '.' {
        text
    } else {
        text.replace('.', &numeric.decimal_separator().to_string())
    }
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Local::now().year()
}

/// Seconds since midnight of a temporal value, used by `Timer` and friends.
pub fn seconds_of_day(t: NaiveTime) -> f64 {
    t.num_seconds_from_midnight() as f64 + (t.nanosecond() / 1_000_000) as f64 / 1000.0
}
