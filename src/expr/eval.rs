//! # Operator Semantics
//!
//! Tree-walking evaluation of a parsed expression.
//!
//! ## Numeric Promotion
//!
//! Arithmetic operands are brought to a common type, Long < Double <
//! BigDecimal. Strings are parsed (Long when the text is an integer that
//! fits 32 bits), dates become date doubles. Long results that overflow
//! continue as Double.
//!
//! ## Dates in Arithmetic
//!
//! `date + number`, `number + date` and `date - number` stay dates.
//! `date - date` is the Double difference in days. Every other operator
//! works on the date double.
//!
//! ## Nulls
//!
//! Arithmetic, comparisons, `Like`, `Between` and `In` return Null when an
//! operand is Null. `&` treats Null as an empty string unless both sides
//! are Null. The logical operators use three-valued logic and skip the
//! right operand when the left one decides the result.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use super::ast::{BinaryOp, Node, UnaryOp};
use super::context::EvalContext;
use super::like::LikePattern;
use crate::config::LocaleContext;
use crate::error::EvalError;
use crate::types::{temporal, Value};

pub(crate) fn eval(node: &Node, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
    match node {
        Node::Literal(v) => Ok(v.clone()),
        Node::Identifier(id) => ctx.identifier_value(id),
        Node::ThisValue => ctx
            .this_value()
            .cloned()
            .ok_or_else(|| EvalError::invalid("validation rule evaluated without a value")),
        Node::Paren(inner) => eval(inner, ctx),
        Node::Unary { op, operand } => {
            let v = eval(operand, ctx)?;
            unary(*op, &v, ctx.locale())
        }
        Node::Binary { op, left, right } if op.is_logical() => logical(*op, left, right, ctx),
        Node::Binary { op, left, right } => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            binary(*op, &l, &r, ctx.locale())
        }
        Node::IsNull { operand, negated } => {
            let v = eval(operand, ctx)?;
            Ok(Value::from_bool(v.is_null() != *negated))
        }
        Node::Like {
            operand,
            pattern,
            negated,
        } => {
            let v = eval(operand, ctx)?;
            let p = eval(pattern, ctx)?;
            if v.is_null() || p.is_null() {
                return Ok(Value::Null);
            }
            let locale = ctx.locale();
            let pattern = LikePattern::compile(&p.as_string(locale))?;
            Ok(Value::from_bool(pattern.matches(&v.as_string(locale)) != *negated))
        }
        Node::Between {
            operand,
            low,
            high,
            negated,
        } => {
            let v = eval(operand, ctx)?;
            let lo = eval(low, ctx)?;
            let hi = eval(high, ctx)?;
            if v.is_null() || lo.is_null() || hi.is_null() {
                return Ok(Value::Null);
            }
            let locale = ctx.locale();
            let inside = compare(&v, &lo, locale)? != Ordering::Less
                && compare(&v, &hi, locale)? != Ordering::Greater;
            Ok(Value::from_bool(inside != *negated))
        }
        Node::In {
            operand,
            list,
            negated,
        } => {
            let v = eval(operand, ctx)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let candidate = eval(item, ctx)?;
                if candidate.is_null() {
                    saw_null = true;
                } else if compare(&v, &candidate, ctx.locale())? == Ordering::Equal {
                    return Ok(Value::from_bool(!*negated));
                }
            }
            if saw_null {
                Ok(Value::Null)
            } else {
                Ok(Value::from_bool(*negated))
            }
        }
        Node::Call { function, args } => {
            let values = args
                .iter()
                .map(|a| eval(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            function.call(ctx, &values)
        }
    }
}

fn logical(
    op: BinaryOp,
    left: &Node,
    right: &Node,
    ctx: &mut EvalContext<'_>,
) -> Result<Value, EvalError> {
    let l = truth(&eval(left, ctx)?);
    match (op, l) {
        (BinaryOp::And, Some(false)) => return Ok(Value::FALSE),
        (BinaryOp::Or, Some(true)) => return Ok(Value::TRUE),
        (BinaryOp::Imp, Some(false)) => return Ok(Value::TRUE),
        _ => {}
    }
    let r = truth(&eval(right, ctx)?);

    let result = match op {
        BinaryOp::And => match (l, r) {
            (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        BinaryOp::Or => match (l, r) {
            (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        BinaryOp::Xor => l.zip(r).map(|(a, b)| a != b),
        BinaryOp::Eqv => l.zip(r).map(|(a, b)| a == b),
        BinaryOp::Imp => match (l, r) {
            (_, Some(true)) => Some(true),
            (Some(true), Some(false)) => Some(false),
            _ => None,
        },
        _ => return Err(EvalError::invalid(format!("{} is not a logical operator", op.symbol()))),
    };
    Ok(result.map_or(Value::Null, Value::from_bool))
}

fn truth(v: &Value) -> Option<bool> {
    if v.is_null() {
        None
    } else {
        Some(v.as_bool())
    }
}

pub(crate) fn unary(op: UnaryOp, v: &Value, locale: &LocaleContext) -> Result<Value, EvalError> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    match op {
        UnaryOp::Not => Ok(Value::from_bool(!v.as_bool())),
        UnaryOp::Plus => v.to_numeric(locale),
        UnaryOp::Negate => match v.to_numeric(locale)? {
            Value::Long(l) => Ok(l
                .checked_neg()
                .map_or(Value::Double(-(l as f64)), Value::Long)),
            Value::Double(d) => Ok(Value::Double(-d)),
            Value::BigDecimal(d) => Ok(Value::BigDecimal(-d)),
            other => Err(EvalError::coercion(format!("{:?}", other), "number")),
        },
    }
}

pub(crate) fn binary(
    op: BinaryOp,
    l: &Value,
    r: &Value,
    locale: &LocaleContext,
) -> Result<Value, EvalError> {
    if op == BinaryOp::Concat {
        return Ok(concat(l, r, locale));
    }
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    match op {
        BinaryOp::Eq => Ok(Value::from_bool(compare(l, r, locale)? == Ordering::Equal)),
        BinaryOp::NotEq => Ok(Value::from_bool(compare(l, r, locale)? != Ordering::Equal)),
        BinaryOp::Lt => Ok(Value::from_bool(compare(l, r, locale)? == Ordering::Less)),
        BinaryOp::LtEq => Ok(Value::from_bool(compare(l, r, locale)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::from_bool(compare(l, r, locale)? == Ordering::Greater)),
        BinaryOp::GtEq => Ok(Value::from_bool(compare(l, r, locale)? != Ordering::Less)),
        BinaryOp::Add => add(l, r, locale),
        BinaryOp::Subtract => subtract(l, r, locale),
        BinaryOp::Multiply => match numeric_pair(l, r, locale)? {
            NumPair::Long(a, b) => Ok(a
                .checked_mul(b)
                .map_or(Value::Double(a as f64 * b as f64), Value::Long)),
            NumPair::Double(a, b) => Value::double(a * b),
            NumPair::Decimal(a, b) => decimal(a.checked_mul(b)),
        },
        BinaryOp::Divide => match numeric_pair(l, r, locale)? {
            NumPair::Long(a, b) => {
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                Value::double(a as f64 / b as f64)
            }
            NumPair::Double(a, b) => {
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Value::double(a / b)
            }
            NumPair::Decimal(a, b) => {
                if b.is_zero() {
                    return Err(EvalError::DivisionByZero);
                }
                decimal(a.checked_div(b))
            }
        },
        BinaryOp::Power => {
            let a = l.as_double(locale)?;
            let b = r.as_double(locale)?;
            Value::double(a.powf(b))
        }
        BinaryOp::IntDivide => {
            let a = l.as_long(locale)?;
            let b = r.as_long(locale)?;
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(a.checked_div(b)
                .map_or(Value::Double((a as f64 / b as f64).trunc()), Value::Long))
        }
        BinaryOp::Mod => {
            let a = l.as_long(locale)?;
            let b = r.as_long(locale)?;
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Long(a.checked_rem(b).unwrap_or(0)))
        }
        _ => Err(EvalError::invalid(format!(
            "{} is not an arithmetic operator",
            op.symbol()
        ))),
    }
}

fn concat(l: &Value, r: &Value, locale: &LocaleContext) -> Value {
    if l.is_null() && r.is_null() {
        return Value::Null;
    }
    let mut s = l.as_string(locale);
    s.push_str(&r.as_string(locale));
    Value::String(s)
}

fn add(l: &Value, r: &Value, locale: &LocaleContext) -> Result<Value, EvalError> {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }
    let is_date = l.value_type().is_temporal() != r.value_type().is_temporal();
    let sum = match numeric_pair(l, r, locale)? {
        NumPair::Long(a, b) => a.checked_add(b).map_or(Value::Double(a as f64 + b as f64), Value::Long),
        NumPair::Double(a, b) => Value::double(a + b)?,
        NumPair::Decimal(a, b) => decimal(a.checked_add(b))?,
    };
    if is_date {
        to_date(&sum, locale)
    } else {
        Ok(sum)
    }
}

fn subtract(l: &Value, r: &Value, locale: &LocaleContext) -> Result<Value, EvalError> {
    let is_date = l.value_type().is_temporal() && !r.value_type().is_temporal();
    let diff = match numeric_pair(l, r, locale)? {
        NumPair::Long(a, b) => a.checked_sub(b).map_or(Value::Double(a as f64 - b as f64), Value::Long),
        NumPair::Double(a, b) => Value::double(a - b)?,
        NumPair::Decimal(a, b) => decimal(a.checked_sub(b))?,
    };
    if is_date {
        to_date(&diff, locale)
    } else {
        Ok(diff)
    }
}

fn to_date(v: &Value, locale: &LocaleContext) -> Result<Value, EvalError> {
    let dt = temporal::from_date_double(v.as_double(locale)?)?;
    Ok(Value::from_date_time(dt))
}

fn decimal(d: Option<Decimal>) -> Result<Value, EvalError> {
    d.map(Value::BigDecimal)
        .ok_or_else(|| EvalError::invalid("numeric overflow"))
}

/// Two numeric operands promoted to a common representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumPair {
    Long(i32, i32),
    Double(f64, f64),
    Decimal(Decimal, Decimal),
}

pub(crate) fn numeric_pair(
    l: &Value,
    r: &Value,
    locale: &LocaleContext,
) -> Result<NumPair, EvalError> {
    let a = l.to_numeric(locale)?;
    let b = r.to_numeric(locale)?;
    Ok(match (&a, &b) {
        (Value::Long(x), Value::Long(y)) => NumPair::Long(*x, *y),
        (Value::BigDecimal(_), _) | (_, Value::BigDecimal(_)) => {
            NumPair::Decimal(a.as_decimal(locale)?, b.as_decimal(locale)?)
        }
        _ => NumPair::Double(a.as_double(locale)?, b.as_double(locale)?),
    })
}

/// Orders two non-null values. Strings compare case-insensitively with each
/// other; mixed with numbers or dates they are converted when they parse
/// and compared as text otherwise.
fn compare(l: &Value, r: &Value, locale: &LocaleContext) -> Result<Ordering, EvalError> {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return Ok(compare_text(a, b));
    }

    let lt = l.value_type();
    let rt = r.value_type();
    if lt.is_temporal() || rt.is_temporal() {
        return match (l.as_date_double(locale), r.as_date_double(locale)) {
            (Ok(a), Ok(b)) => Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
            (Err(e), _) | (_, Err(e)) if !e.is_coercion() => Err(e),
            _ => Ok(compare_text(&l.as_string(locale), &r.as_string(locale))),
        };
    }

    match numeric_pair(l, r, locale) {
        Ok(NumPair::Long(a, b)) => Ok(a.cmp(&b)),
        Ok(NumPair::Double(a, b)) => Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
        Ok(NumPair::Decimal(a, b)) => Ok(a.cmp(&b)),
        Err(e) if e.is_coercion() => Ok(compare_text(&l.as_string(locale), &r.as_string(locale))),
        Err(e) => Err(e),
    }
}

pub(crate) fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_uppercase)
        .cmp(b.chars().flat_map(char::to_uppercase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn locale() -> LocaleContext {
        LocaleContext::default()
    }

    fn bin(op: BinaryOp, l: impl Into<Value>, r: impl Into<Value>) -> Result<Value, EvalError> {
        binary(op, &l.into(), &r.into(), &locale())
    }

    #[test]
    fn long_overflow_continues_as_double() {
        assert_eq!(
            bin(BinaryOp::Add, i32::MAX, 1).unwrap(),
            Value::Double(i32::MAX as f64 + 1.0)
        );
        assert_eq!(bin(BinaryOp::Multiply, 6, 7).unwrap(), Value::Long(42));
    }

    #[test]
    fn division_kinds() {
        assert_eq!(bin(BinaryOp::Divide, 7, 2).unwrap(), Value::Double(3.5));
        assert_eq!(bin(BinaryOp::IntDivide, 7, 2).unwrap(), Value::Long(3));
        assert_eq!(bin(BinaryOp::IntDivide, 7.5, 2).unwrap(), Value::Long(4));
        assert_eq!(bin(BinaryOp::Mod, 10, 3).unwrap(), Value::Long(1));
        assert_eq!(bin(BinaryOp::Mod, -10, 3).unwrap(), Value::Long(-1));
        assert_eq!(
            bin(BinaryOp::Divide, 1, 0).unwrap_err(),
            EvalError::DivisionByZero
        );
        assert_eq!(
            bin(BinaryOp::Mod, 1, 0.4).unwrap_err(),
            EvalError::DivisionByZero
        );
    }

    #[test]
    fn plus_concatenates_strings_but_adds_numeric_text() {
        assert_eq!(bin(BinaryOp::Add, "a", "b").unwrap(), Value::string("ab"));
        assert_eq!(bin(BinaryOp::Add, "2", 3).unwrap(), Value::Long(5));
        assert!(bin(BinaryOp::Add, "x", 3).unwrap_err().is_coercion());
    }

    #[test]
    fn concat_handles_nulls() {
        assert_eq!(
            binary(BinaryOp::Concat, &Value::Null, &"a".into(), &locale()).unwrap(),
            Value::string("a")
        );
        assert_eq!(
            binary(BinaryOp::Concat, &Value::Null, &Value::Null, &locale()).unwrap(),
            Value::Null
        );
        assert_eq!(bin(BinaryOp::Concat, 1, "x").unwrap(), Value::string("1x"));
    }

    #[test]
    fn date_arithmetic() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let next = binary(BinaryOp::Add, &Value::Date(d), &Value::Long(1), &locale()).unwrap();
        assert_eq!(next, Value::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));

        let diff = binary(
            BinaryOp::Subtract,
            &next,
            &Value::Date(d),
            &locale(),
        )
        .unwrap();
        assert_eq!(diff, Value::Double(1.0));
    }

    #[test]
    fn comparisons() {
        assert_eq!(compare(&"abc".into(), &"ABC".into(), &locale()).unwrap(), Ordering::Equal);
        assert_eq!(compare(&"10".into(), &Value::Long(9), &locale()).unwrap(), Ordering::Greater);
        assert_eq!(
            compare(&Value::Double(2.5), &Value::BigDecimal(Decimal::new(25, 1)), &locale()).unwrap(),
            Ordering::Equal
        );
        assert_eq!(bin(BinaryOp::Lt, Value::Null, 1).unwrap(), Value::Null);
    }

    #[test]
    fn negation_of_min_long_widens() {
        assert_eq!(
            unary(UnaryOp::Negate, &Value::Long(i32::MIN), &locale()).unwrap(),
            Value::Double(2147483648.0)
        );
        assert_eq!(unary(UnaryOp::Not, &Value::Null, &locale()).unwrap(), Value::Null);
        assert_eq!(unary(UnaryOp::Not, &Value::Long(0), &locale()).unwrap(), Value::TRUE);
    }
}
