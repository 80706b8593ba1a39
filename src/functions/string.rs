//! # Text Functions
//!
//! Positions are 1-based and count characters, not bytes. Functions taking a
//! compare mode use 0 for binary (exact) and 1 for text (case-insensitive)
//! comparison; text is the default, matching how Access evaluates stored
//! expressions.
//!
//! The string-returning functions are also registered under a `$` alias
//! (`Left$`, `Mid$`, ...).

use std::cmp::Ordering;

use super::{arg_long, opt_long, Function, FunctionRegistry};
use crate::error::EvalError;
use crate::expr::{compare_text, fold_char, EvalContext};
use crate::types::Value;

const COMPARE_BINARY: i32 = 0;
const COMPARE_TEXT: i32 = 1;

const CONV_UPPER: i32 = 1;
const CONV_LOWER: i32 = 2;
const CONV_PROPER: i32 = 3;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_builtin(Function::new("Asc", 1, 1, asc));
    registry.add_builtin(Function::new("AscW", 1, 1, asc_w));
    registry.add_builtin(Function::new("InStr", 2, 4, in_str));
    registry.add_builtin(Function::new("InStrRev", 2, 4, in_str_rev));
    registry.add_builtin(Function::new("Len", 1, 1, len));
    registry.add_builtin(Function::new("StrComp", 2, 3, str_comp));

    with_alias(registry, Function::new("Chr", 1, 1, chr));
    with_alias(registry, Function::new("ChrW", 1, 1, chr_w));
    with_alias(registry, Function::new("LCase", 1, 1, lcase));
    with_alias(registry, Function::new("UCase", 1, 1, ucase));
    with_alias(registry, Function::new("Left", 2, 2, left));
    with_alias(registry, Function::new("Right", 2, 2, right));
    with_alias(registry, Function::new("Mid", 2, 3, mid));
    with_alias(registry, Function::new("LTrim", 1, 1, ltrim));
    with_alias(registry, Function::new("RTrim", 1, 1, rtrim));
    with_alias(registry, Function::new("Trim", 1, 1, trim));
    with_alias(registry, Function::new("Space", 1, 1, space));
    with_alias(registry, Function::new("String", 2, 2, string));
    with_alias(registry, Function::new("StrConv", 2, 3, str_conv));
    with_alias(registry, Function::new("StrReverse", 1, 1, str_reverse));
    with_alias(registry, Function::new("Replace", 3, 6, replace));
}

fn with_alias(registry: &mut FunctionRegistry, function: Function) {
    registry.add_builtin(function.alias(&format!("{}$", function.name())));
    registry.add_builtin(function);
}

fn text(ctx: &EvalContext<'_>, v: &Value) -> String {
    v.as_string(ctx.locale())
}

fn compare_mode(ctx: &EvalContext<'_>, args: &[Value], i: usize) -> Result<bool, EvalError> {
    match opt_long(args, i, COMPARE_TEXT, ctx.locale())? {
        COMPARE_BINARY => Ok(false),
        COMPARE_TEXT => Ok(true),
        other => Err(EvalError::invalid(format!("invalid compare mode {}", other))),
    }
}

fn count_arg(ctx: &EvalContext<'_>, args: &[Value], i: usize) -> Result<usize, EvalError> {
    let n = arg_long(args, i, ctx.locale())?;
    usize::try_from(n).map_err(|_| EvalError::invalid(format!("invalid length {}", n)))
}

fn chars_of(s: &str, text_compare: bool) -> Vec<char> {
    if text_compare {
        s.chars().map(fold_char).collect()
    } else {
        s.chars().collect()
    }
}

/// 0-based index of the first occurrence of `needle` at or after `from`.
fn find_from(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()] == *needle)
}

fn asc(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(ctx, &args[0]);
    let c = s
        .chars()
        .next()
        .ok_or_else(|| EvalError::invalid("Asc of an empty string"))?;
    let code = c as u32;
    Ok(Value::Long(if code <= 0xFF { code as i32 } else { '?' as i32 }))
}

fn asc_w(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(ctx, &args[0]);
    let c = s
        .chars()
        .next()
        .ok_or_else(|| EvalError::invalid("AscW of an empty string"))?;
    Ok(Value::Long(c as i32))
}

fn chr(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let code = arg_long(args, 0, ctx.locale())?;
    let c = u8::try_from(code)
        .map(char::from)
        .map_err(|_| EvalError::invalid(format!("invalid character code {}", code)))?;
    Ok(Value::String(c.to_string()))
}

/// Negative codes wrap into the 16-bit range.
fn chr_w(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let code = arg_long(args, 0, ctx.locale())?;
    if !(-32768..=65535).contains(&code) {
        return Err(EvalError::invalid(format!("invalid character code {}", code)));
    }
    let c = char::from_u32(code as u32 & 0xFFFF)
        .ok_or_else(|| EvalError::invalid(format!("invalid character code {}", code)))?;
    Ok(Value::String(c.to_string()))
}

/// `InStr([start,] haystack, needle[, compare])`.
fn in_str(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let (start, rest) = if args.len() >= 3 {
        (arg_long(args, 0, ctx.locale())?, &args[1..])
    } else {
        (1, args)
    };
    if start < 1 {
        return Err(EvalError::invalid(format!("invalid start {}", start)));
    }
    let text_compare = compare_mode(ctx, rest, 2)?;
    let hay = chars_of(&text(ctx, &rest[0]), text_compare);
    let needle = chars_of(&text(ctx, &rest[1]), text_compare);

    let from = start as usize - 1;
    if from > hay.len() {
        return Ok(Value::Long(0));
    }
    if needle.is_empty() {
        return Ok(Value::Long(start));
    }
    Ok(Value::Long(
        find_from(&hay, &needle, from).map_or(0, |i| i as i32 + 1),
    ))
}

/// `InStrRev(haystack, needle[, start[, compare]])`; start -1 searches from
/// the end.
fn in_str_rev(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let start = opt_long(args, 2, -1, ctx.locale())?;
    if start == 0 || start < -1 {
        return Err(EvalError::invalid(format!("invalid start {}", start)));
    }
    let text_compare = compare_mode(ctx, args, 3)?;
    let hay = chars_of(&text(ctx, &args[0]), text_compare);
    let needle = chars_of(&text(ctx, &args[1]), text_compare);

    let limit = if start == -1 {
        hay.len()
    } else {
        start as usize
    };
    if limit > hay.len() {
        return Ok(Value::Long(0));
    }
    if needle.is_empty() {
        return Ok(Value::Long(limit as i32));
    }
    if needle.len() > limit {
        return Ok(Value::Long(0));
    }
    let found = (0..=limit - needle.len())
        .rev()
        .find(|&i| hay[i..i + needle.len()] == *needle);
    Ok(Value::Long(found.map_or(0, |i| i as i32 + 1)))
}

fn lcase(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(text(ctx, &args[0]).to_lowercase()))
}

fn ucase(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(text(ctx, &args[0]).to_uppercase()))
}

fn left(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let n = count_arg(ctx, args, 1)?;
    Ok(Value::String(text(ctx, &args[0]).chars().take(n).collect()))
}

fn right(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let n = count_arg(ctx, args, 1)?;
    let s = text(ctx, &args[0]);
    let len = s.chars().count();
    Ok(Value::String(s.chars().skip(len.saturating_sub(n)).collect()))
}

fn mid(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let start = arg_long(args, 1, ctx.locale())?;
    if start < 1 {
        return Err(EvalError::invalid(format!("invalid start {}", start)));
    }
    let s = text(ctx, &args[0]);
    let skipped = s.chars().skip(start as usize - 1);
    Ok(Value::String(match args.get(2) {
        Some(_) => skipped.take(count_arg(ctx, args, 2)?).collect(),
        None => skipped.collect(),
    }))
}

fn len(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let n = text(ctx, &args[0]).chars().count();
    Ok(Value::Long(n as i32))
}

fn ltrim(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(
        text(ctx, &args[0]).trim_start_matches(' ').to_string(),
    ))
}

fn rtrim(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(
        text(ctx, &args[0]).trim_end_matches(' ').to_string(),
    ))
}

fn trim(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(text(ctx, &args[0]).trim_matches(' ').to_string()))
}

fn space(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(" ".repeat(count_arg(ctx, args, 0)?)))
}

/// `String(n, c)`: `c` is a character code or a string whose first
/// character is repeated.
fn string(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let n = count_arg(ctx, args, 0)?;
    let c = match &args[1] {
        Value::String(s) => s
            .chars()
            .next()
            .ok_or_else(|| EvalError::invalid("String of an empty string"))?,
        v => {
            let code = v.as_long(ctx.locale())?;
            char::from_u32(code.rem_euclid(256) as u32)
                .ok_or_else(|| EvalError::invalid(format!("invalid character code {}", code)))?
        }
    };
    Ok(Value::String(std::iter::repeat(c).take(n).collect()))
}

fn str_comp(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let a = text(ctx, &args[0]);
    let b = text(ctx, &args[1]);
    let ordering = if compare_mode(ctx, args, 2)? {
        compare_text(&a, &b)
    } else {
        a.cmp(&b)
    };
    Ok(Value::Long(match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

/// Supports the case conversions; the wide/narrow and code page
/// conversions have no meaning for Rust strings.
fn str_conv(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(ctx, &args[0]);
    let conversion = arg_long(args, 1, ctx.locale())?;
    Ok(Value::String(match conversion {
        CONV_UPPER => s.to_uppercase(),
        CONV_LOWER => s.to_lowercase(),
        CONV_PROPER => proper_case(&s),
        other => {
            return Err(EvalError::invalid(format!(
                "unsupported conversion {}",
                other
            )))
        }
    }))
}

fn proper_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() || c == '\0' {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

fn str_reverse(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(text(ctx, &args[0]).chars().rev().collect()))
}

/// `Replace(s, find, with[, start[, count[, compare]]])`. The result starts
/// at `start`; earlier characters are dropped. A count of -1 replaces every
/// occurrence.
fn replace(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let start = opt_long(args, 3, 1, ctx.locale())?;
    if start < 1 {
        return Err(EvalError::invalid(format!("invalid start {}", start)));
    }
    let count = opt_long(args, 4, -1, ctx.locale())?;
    if count < -1 {
        return Err(EvalError::invalid(format!("invalid count {}", count)));
    }
    let text_compare = compare_mode(ctx, args, 5)?;

    let source: Vec<char> = text(ctx, &args[0])
        .chars()
        .skip(start as usize - 1)
        .collect();
    let find = text(ctx, &args[1]);
    let with = text(ctx, &args[2]);
    if find.is_empty() || count == 0 {
        return Ok(Value::String(source.into_iter().collect()));
    }

    let hay: Vec<char> = if text_compare {
        source.iter().copied().map(fold_char).collect()
    } else {
        source.clone()
    };
    let needle = chars_of(&find, text_compare);

    let mut out = String::with_capacity(source.len());
    let mut pos = 0;
    let mut replaced = 0;
    while count == -1 || replaced < count {
        match find_from(&hay, &needle, pos) {
            Some(i) => {
                out.extend(&source[pos..i]);
                out.push_str(&with);
                pos = i + needle.len();
                replaced += 1;
            }
            None => break,
        }
    }
    out.extend(&source[pos..]);
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let registry = FunctionRegistry::builtin();
        let mut ctx = EvalContext::default();
        registry.functions[&name.to_ascii_uppercase()].call(&mut ctx, args)
    }

    fn s(v: &str) -> Value {
        Value::string(v)
    }

    fn l(n: i32) -> Value {
        Value::Long(n)
    }

    #[test]
    fn slicing_counts_characters() {
        assert_eq!(call("Left", &[s("héllo"), l(2)]).unwrap(), s("hé"));
        assert_eq!(call("Right$", &[s("héllo"), l(3)]).unwrap(), s("llo"));
        assert_eq!(call("Right", &[s("ab"), l(5)]).unwrap(), s("ab"));
        assert_eq!(call("Mid", &[s("abcdef"), l(2), l(3)]).unwrap(), s("bcd"));
        assert_eq!(call("Mid", &[s("abcdef"), l(5)]).unwrap(), s("ef"));
        assert_eq!(call("Mid", &[s("abc"), l(9)]).unwrap(), s(""));
        assert!(call("Left", &[s("abc"), l(-1)]).is_err());
        assert!(call("Mid", &[s("abc"), l(0)]).is_err());
        assert_eq!(call("Len", &[Value::Null]).unwrap(), Value::Null);
        assert_eq!(call("Len", &[l(1234)]).unwrap(), l(4));
    }

    #[test]
    fn searching() {
        assert_eq!(call("InStr", &[s("abcABC"), s("B")]).unwrap(), l(2));
        assert_eq!(call("InStr", &[l(3), s("abcABC"), s("B")]).unwrap(), l(5));
        assert_eq!(
            call("InStr", &[l(1), s("abcABC"), s("B"), l(0)]).unwrap(),
            l(5)
        );
        assert_eq!(call("InStr", &[s("abc"), s("")]).unwrap(), l(1));
        assert_eq!(call("InStr", &[s("abc"), s("z")]).unwrap(), l(0));
        assert_eq!(call("InStrRev", &[s("abcabc"), s("bc")]).unwrap(), l(5));
        assert_eq!(call("InStrRev", &[s("abcabc"), s("bc"), l(4)]).unwrap(), l(2));
    }

    #[test]
    fn trimming_and_padding() {
        assert_eq!(call("Trim", &[s("  a b  ")]).unwrap(), s("a b"));
        assert_eq!(call("LTrim", &[s("  a ")]).unwrap(), s("a "));
        assert_eq!(call("RTrim$", &[s(" a  ")]).unwrap(), s(" a"));
        assert_eq!(call("Space", &[l(3)]).unwrap(), s("   "));
        assert_eq!(call("String", &[l(3), s("xyz")]).unwrap(), s("xxx"));
        assert_eq!(call("String", &[l(2), l(65)]).unwrap(), s("AA"));
    }

    #[test]
    fn character_codes() {
        assert_eq!(call("Asc", &[s("A")]).unwrap(), l(65));
        assert_eq!(call("AscW", &[s("€")]).unwrap(), l(0x20AC));
        assert!(call("Asc", &[s("")]).is_err());
        assert_eq!(call("Chr", &[l(97)]).unwrap(), s("a"));
        assert!(call("Chr", &[l(300)]).is_err());
        assert_eq!(call("ChrW", &[l(0x20AC)]).unwrap(), s("€"));
    }

    #[test]
    fn comparison_and_case() {
        assert_eq!(call("StrComp", &[s("abc"), s("ABC")]).unwrap(), l(0));
        assert_eq!(call("StrComp", &[s("abc"), s("ABC"), l(0)]).unwrap(), l(1));
        assert_eq!(call("StrComp", &[s("a"), Value::Null]).unwrap(), Value::Null);
        assert_eq!(call("UCase$", &[s("abc")]).unwrap(), s("ABC"));
        assert_eq!(
            call("StrConv", &[s("hELLO wORLD"), l(3)]).unwrap(),
            s("Hello World")
        );
        assert_eq!(call("StrReverse", &[s("abc")]).unwrap(), s("cba"));
    }

    #[test]
    fn replace_honors_start_count_and_mode() {
        assert_eq!(
            call("Replace", &[s("aXbxc"), s("x"), s("-")]).unwrap(),
            s("a-b-c")
        );
        assert_eq!(
            call("Replace", &[s("aXbxc"), s("x"), s("-"), l(1), l(-1), l(0)]).unwrap(),
            s("aXb-c")
        );
        assert_eq!(
            call("Replace", &[s("abcabc"), s("b"), s(""), l(3), l(1)]).unwrap(),
            s("cac")
        );
    }
}
