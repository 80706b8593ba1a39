//! # Conversion and Formatting Functions
//!
//! - `CBool CByte CCur CDate CDbl CDec CInt CLng CSng CStr CVar`: type
//!   conversions, failing with a coercion error when the value does not fit
//! - `Hex Oct`: radix text of the rounded argument
//! - `Str`: number text with a leading space for non-negative values
//! - `Val`: leading numeric prefix of a string, ignoring whitespace
//! - `FormatNumber FormatPercent FormatCurrency FormatDateTime`
//!
//! The `Format*` number functions take tristate flags where -1 is true,
//! 0 false and -2 the locale default. Rounding for display is half away
//! from zero, unlike `Round` and the `C*` conversions which round half to
//! even.

use rust_decimal::{Decimal, RoundingStrategy};

use super::{arg_long, opt_long, Function, FunctionRegistry};
use crate::config::{LocaleContext, NumericConfig};
use crate::error::EvalError;
use crate::expr::EvalContext;
use crate::types::temporal::{epoch_date, format_pattern};
use crate::types::{format_double, parse_number, Value};

const CURRENCY_SCALE: u32 = 4;
const MAX_FORMAT_DIGITS: i32 = 28;

const TRISTATE_TRUE: i32 = -1;
const TRISTATE_FALSE: i32 = 0;
const TRISTATE_DEFAULT: i32 = -2;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_builtin(Function::new("CBool", 1, 1, cbool));
    registry.add_builtin(Function::new("CByte", 1, 1, cbyte));
    registry.add_builtin(Function::new("CCur", 1, 1, ccur));
    registry.add_builtin(Function::new("CDate", 1, 1, cdate));
    registry.add_builtin(Function::new("CDbl", 1, 1, cdbl));
    registry.add_builtin(Function::new("CDec", 1, 1, cdec));
    registry.add_builtin(Function::new("CInt", 1, 1, cint));
    registry.add_builtin(Function::new("CLng", 1, 1, clng));
    registry.add_builtin(Function::new("CSng", 1, 1, csng));
    registry.add_builtin(Function::new("CStr", 1, 1, cstr));
    registry.add_builtin(Function::new("CVar", 1, 1, cvar).handles_nulls());

    let hex = Function::new("Hex", 1, 1, hex);
    registry.add_builtin(hex.alias("Hex$"));
    registry.add_builtin(hex);
    let oct = Function::new("Oct", 1, 1, oct);
    registry.add_builtin(oct.alias("Oct$"));
    registry.add_builtin(oct);
    let str_fn = Function::new("Str", 1, 1, str_);
    registry.add_builtin(str_fn.alias("Str$"));
    registry.add_builtin(str_fn);
    registry.add_builtin(Function::new("Val", 1, 1, val));

    registry.add_builtin(Function::new("FormatNumber", 1, 5, format_number));
    registry.add_builtin(Function::new("FormatPercent", 1, 5, format_percent));
    registry.add_builtin(Function::new("FormatCurrency", 1, 5, format_currency));
    registry.add_builtin(Function::new("FormatDateTime", 1, 2, format_date_time));
}

fn cbool(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let b = match &args[0] {
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => true,
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => false,
        Value::String(s) => match parse_number(s, ctx.locale().numeric()) {
            Some(n) => n.as_bool(),
            None => return Err(EvalError::coercion(format!("\"{}\"", s), "Boolean")),
        },
        v => v.as_bool(),
    };
    Ok(Value::from_bool(b))
}

fn cbyte(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let l = args[0].as_long(ctx.locale())?;
    if !(0..=255).contains(&l) {
        return Err(EvalError::coercion(l, "Byte"));
    }
    Ok(Value::Long(l))
}

fn ccur(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let d = args[0].as_decimal(ctx.locale())?;
    Ok(Value::BigDecimal(d.round_dp_with_strategy(
        CURRENCY_SCALE,
        RoundingStrategy::MidpointNearestEven,
    )))
}

fn cdate(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::from_date_time(args[0].as_date_time(ctx.locale())?))
}

fn cdbl(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Double(args[0].as_double(ctx.locale())?))
}

fn cdec(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::BigDecimal(args[0].as_decimal(ctx.locale())?))
}

fn cint(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let l = args[0].as_long(ctx.locale())?;
    if i16::try_from(l).is_err() {
        return Err(EvalError::coercion(l, "Integer"));
    }
    Ok(Value::Long(l))
}

fn clng(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Long(args[0].as_long(ctx.locale())?))
}

/// Single precision, returned as the shortest Double that prints the same.
fn csng(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let d = args[0].as_double(ctx.locale())?;
    let single = d as f32;
    if !single.is_finite() {
        return Err(EvalError::coercion(d, "Single"));
    }
    let widened = single
        .to_string()
        .parse::<f64>()
        .unwrap_or(single as f64);
    Ok(Value::Double(widened))
}

fn cstr(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(args[0].as_string(ctx.locale())))
}

fn cvar(_ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(args[0].clone())
}

/// Values in the 16-bit range print as 16-bit two's complement, the way
/// Access treats Integer arguments.
fn hex(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let l = arg_long(args, 0, ctx.locale())?;
    Ok(Value::String(match i16::try_from(l) {
        Ok(small) => format!("{:X}", small as u16),
        Err(_) => format!("{:X}", l),
    }))
}

fn oct(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let l = arg_long(args, 0, ctx.locale())?;
    Ok(Value::String(match i16::try_from(l) {
        Ok(small) => format!("{:o}", small as u16),
        Err(_) => format!("{:o}", l),
    }))
}

/// Always uses `.` as the decimal separator.
fn str_(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let n = args[0].to_numeric(ctx.locale())?;
    let text = match n {
        Value::Long(l) => l.to_string(),
        Value::BigDecimal(d) => d.normalize().to_string(),
        other => format_double(other.as_double(ctx.locale())?, &NumericConfig::default()),
    };
    Ok(Value::String(if text.starts_with('-') {
        text
    } else {
        format!(" {}", text)
    }))
}

fn val(_ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let text = match &args[0] {
        Value::String(s) => s.clone(),
        other => other.as_string(&LocaleContext::default()),
    };
    Ok(Value::Double(leading_number(&text)))
}

/// Parses the longest numeric prefix of `text` after removing whitespace.
/// Anything unparseable is 0.
fn leading_number(text: &str) -> f64 {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let upper = compact.to_ascii_uppercase();

    if let Some(rest) = upper.strip_prefix('&') {
        let (radix, digits) = match rest.chars().next() {
            Some('H') => (16, &rest[1..]),
            Some('O') => (8, &rest[1..]),
            _ => return 0.0,
        };
        let end = digits
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(digits.len());
        return match u32::from_str_radix(&digits[..end], radix) {
            Ok(v) if v <= 0xFFFF => v as u16 as i16 as f64,
            Ok(v) => v as i32 as f64,
            Err(_) => 0.0,
        };
    }

    let bytes = upper.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || (end == digits_start + 1 && bytes[digits_start] == b'.') {
        return 0.0;
    }
    if end < bytes.len() && matches!(bytes[end], b'E' | b'D') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            let mantissa = &upper[..end];
            let exponent = &upper[end + 1..exp_end];
            return format!("{}E{}", mantissa, exponent)
                .parse()
                .unwrap_or(0.0);
        }
    }
    upper[..end].parse().unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy)]
struct NumberFormat {
    digits: u32,
    leading_digit: bool,
    parens_for_negative: bool,
    group_digits: bool,
}

impl NumberFormat {
    /// Reads the optional arguments shared by the `Format*` number
    /// functions, starting at index 1.
    fn from_args(
        args: &[Value],
        locale: &LocaleContext,
        default_parens: bool,
    ) -> Result<Self, EvalError> {
        let digits = opt_long(args, 1, -1, locale)?;
        let digits = match digits {
            -1 => locale.numeric().fractional_digits(),
            d if (0..=MAX_FORMAT_DIGITS).contains(&d) => d as u32,
            d => {
                return Err(EvalError::invalid(format!(
                    "invalid number of digits {}",
                    d
                )))
            }
        };
        Ok(Self {
            digits,
            leading_digit: tristate(args, 2, true, locale)?,
            parens_for_negative: tristate(args, 3, default_parens, locale)?,
            group_digits: tristate(args, 4, true, locale)?,
        })
    }

    /// Returns the sign and the unsigned digits of `value`.
    fn render(&self, value: Decimal, numeric: &NumericConfig) -> (bool, String) {
        let rounded =
            value.round_dp_with_strategy(self.digits, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let plain = format!("{:.*}", self.digits as usize, rounded.abs());
        let (int_part, frac_part) = match plain.split_once('.') {
            Some((i, f)) => (i.to_string(), Some(f.to_string())),
            None => (plain, None),
        };

        let mut int_part = if self.group_digits {
            group(&int_part, numeric.grouping_separator())
        } else {
            int_part
        };
        if !self.leading_digit && int_part == "0" && frac_part.is_some() {
            int_part.clear();
        }

        let mut out = int_part;
        if let Some(frac) = frac_part {
            out.push(numeric.decimal_separator());
            out.push_str(&frac);
        }
        (negative, out)
    }

    fn wrap_negative(&self, negative: bool, body: String) -> String {
        match (negative, self.parens_for_negative) {
            (false, _) => body,
            (true, true) => format!("({})", body),
            (true, false) => format!("-{}", body),
        }
    }
}

fn tristate(
    args: &[Value],
    i: usize,
    default: bool,
    locale: &LocaleContext,
) -> Result<bool, EvalError> {
    match opt_long(args, i, TRISTATE_DEFAULT, locale)? {
        TRISTATE_TRUE => Ok(true),
        TRISTATE_FALSE => Ok(false),
        TRISTATE_DEFAULT => Ok(default),
        other => Err(EvalError::invalid(format!("invalid tristate value {}", other))),
    }
}

fn group(digits: &str, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn format_number(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let format = NumberFormat::from_args(args, locale, false)?;
    let (negative, body) = format.render(args[0].as_decimal(locale)?, locale.numeric());
    Ok(Value::String(format.wrap_negative(negative, body)))
}

fn format_percent(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let format = NumberFormat::from_args(args, locale, false)?;
    let scaled = args[0].as_decimal(locale)? * Decimal::ONE_HUNDRED;
    let (negative, body) = format.render(scaled, locale.numeric());
    Ok(Value::String(
        format.wrap_negative(negative, format!("{}%", body)),
    ))
}

fn format_currency(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let format = NumberFormat::from_args(args, locale, true)?;
    let (negative, body) = format.render(args[0].as_decimal(locale)?, locale.numeric());
    let body = format!("{}{}", locale.numeric().currency_symbol(), body);
    Ok(Value::String(format.wrap_negative(negative, body)))
}

const GENERAL_DATE: i32 = 0;
const LONG_DATE: i32 = 1;
const SHORT_DATE: i32 = 2;
const LONG_TIME: i32 = 3;
const SHORT_TIME: i32 = 4;

fn format_date_time(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let dt = args[0].as_date_time(locale)?;
    let temporal = locale.temporal();
    let text = match opt_long(args, 1, GENERAL_DATE, locale)? {
        GENERAL_DATE => Value::from_date_time(dt).as_string(locale),
        LONG_DATE => format_pattern(dt, temporal.long_date_pattern(), temporal),
        SHORT_DATE => format_pattern(dt, temporal.short_date_pattern(), temporal),
        LONG_TIME => format_pattern(
            epoch_date().and_time(dt.time()),
            temporal.long_time_pattern(),
            temporal,
        ),
        SHORT_TIME => format_pattern(
            epoch_date().and_time(dt.time()),
            temporal.short_time_pattern(),
            temporal,
        ),
        other => {
            return Err(EvalError::invalid(format!(
                "invalid date format {}",
                other
            )))
        }
    };
    Ok(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let registry = FunctionRegistry::builtin();
        let mut ctx = EvalContext::default();
        registry.functions[&name.to_ascii_uppercase()].call(&mut ctx, args)
    }

    fn text(name: &str, args: &[Value]) -> String {
        match call(name, args).unwrap() {
            Value::String(s) => s,
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn integer_conversions_round_half_even_and_check_range() {
        assert_eq!(call("CInt", &[Value::Double(2.5)]).unwrap(), Value::Long(2));
        assert_eq!(call("CInt", &[Value::Double(3.5)]).unwrap(), Value::Long(4));
        assert!(call("CInt", &[Value::Long(40_000)]).unwrap_err().is_coercion());
        assert!(call("CByte", &[Value::Long(-1)]).is_err());
        assert_eq!(
            call("CLng", &[Value::string("1,234")]).unwrap(),
            Value::Long(1234)
        );
    }

    #[test]
    fn boolean_and_single() {
        assert_eq!(call("CBool", &[Value::string("0")]).unwrap(), Value::FALSE);
        assert_eq!(call("CBool", &[Value::string("True")]).unwrap(), Value::TRUE);
        assert!(call("CBool", &[Value::string("maybe")]).is_err());
        assert_eq!(call("CSng", &[Value::Double(1.1)]).unwrap(), Value::Double(1.1));
        assert_eq!(call("CStr", &[Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn cdate_narrows_the_type() {
        assert_eq!(
            call("CDate", &[Value::string("3/15/2021")]).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2021, 3, 15).unwrap())
        );
        assert!(matches!(
            call("CDate", &[Value::Double(0.5)]).unwrap(),
            Value::Time(_)
        ));
    }

    #[test]
    fn radix_text() {
        assert_eq!(text("Hex", &[Value::Long(255)]), "FF");
        assert_eq!(text("Hex", &[Value::Long(-1)]), "FFFF");
        assert_eq!(text("Hex", &[Value::Long(-65536)]), "FFFF0000");
        assert_eq!(text("Oct$", &[Value::Long(8)]), "10");
    }

    #[test]
    fn str_and_val() {
        assert_eq!(text("Str", &[Value::Long(42)]), " 42");
        assert_eq!(text("Str", &[Value::Double(-1.5)]), "-1.5");
        assert_eq!(leading_number("  12 34abc"), 1234.0);
        assert_eq!(leading_number("-3.5x"), -3.5);
        assert_eq!(leading_number("1e3"), 1000.0);
        assert_eq!(leading_number("&HFF"), 255.0);
        assert_eq!(leading_number("abc"), 0.0);
        assert_eq!(call("Val", &[Value::string("7 days")]).unwrap(), Value::Double(7.0));
    }

    #[test]
    fn number_formats() {
        assert_eq!(text("FormatNumber", &[Value::Double(1234.5)]), "1,234.50");
        assert_eq!(
            text("FormatNumber", &[Value::Double(-0.125), Value::Long(2)]),
            "-0.13"
        );
        assert_eq!(
            text(
                "FormatNumber",
                &[Value::Double(0.5), Value::Long(1), Value::Long(0)]
            ),
            ".5"
        );
        assert_eq!(
            text(
                "FormatNumber",
                &[
                    Value::Long(-1234),
                    Value::Long(0),
                    Value::Long(-2),
                    Value::Long(-1),
                    Value::Long(0)
                ]
            ),
            "(1234)"
        );
        assert_eq!(text("FormatPercent", &[Value::Double(0.256)]), "25.60%");
        assert_eq!(text("FormatCurrency", &[Value::Double(1234.5)]), "$1,234.50");
        assert_eq!(text("FormatCurrency", &[Value::Long(-5)]), "($5.00)");
    }

    #[test]
    fn date_formats() {
        let dt = NaiveDate::from_ymd_opt(2024, 7, 4)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        let v = Value::DateTime(dt);
        assert_eq!(text("FormatDateTime", &[v.clone(), Value::Long(2)]), "7/4/2024");
        assert_eq!(
            text("FormatDateTime", &[v.clone(), Value::Long(1)]),
            "Thursday, July 4, 2024"
        );
        assert_eq!(text("FormatDateTime", &[v.clone(), Value::Long(3)]), "3:30:00 PM");
        assert_eq!(text("FormatDateTime", &[v, Value::Long(4)]), "15:30");
    }
}
