//! # Date and Time Functions
//!
//! ## Clock
//! - `Date()`, `Time()`, `Now()`: current date, time, both (second precision)
//! - `Timer()`: seconds since midnight
//!
//! The clock is read through [`EvalContext::now`], so tests can pin it.
//!
//! ## Construction and Extraction
//! - `DateSerial(y, m, d)`, `TimeSerial(h, n, s)`: out-of-range parts roll
//!   over into the next larger unit (`DateSerial(2024, 14, 1)` is Feb 2025)
//! - `DateValue(x)`, `TimeValue(x)`: date or time half of a value
//! - `Year Month Day Hour Minute Second Weekday`
//! - `WeekdayName(n[, abbreviate[, firstday]])`, `MonthName(n[, abbreviate])`
//!
//! ## Intervals
//! `DateAdd`, `DateDiff` and `DatePart` take an interval code:
//!
//! | Code   | Unit         |
//! |--------|--------------|
//! | `yyyy` | year         |
//! | `q`    | quarter      |
//! | `m`    | month        |
//! | `y`    | day of year  |
//! | `d`    | day          |
//! | `w`    | weekday      |
//! | `ww`   | week         |
//! | `h`    | hour         |
//! | `n`    | minute       |
//! | `s`    | second       |
//!
//! `DateDiff` counts unit boundaries crossed, not elapsed whole units:
//! Dec 31 to Jan 1 is one year. Adding months clamps the day to the end of
//! the target month.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::{arg_long, opt, opt_long, Function, FunctionRegistry};
use crate::config::LocaleContext;
use crate::error::EvalError;
use crate::expr::EvalContext;
use crate::types::temporal::{epoch_date, weekday_number, MONTH_NAMES, WEEKDAY_NAMES};
use crate::types::Value;

const MIN_YEAR: i32 = 100;
const MAX_YEAR: i32 = 9999;

/// `vbUseSystemDayOfWeek` / `vbUseSystem`.
const USE_SYSTEM: i32 = 0;
const SUNDAY: i32 = 1;

const FIRST_JAN_1: i32 = 1;
const FIRST_FOUR_DAYS: i32 = 2;
const FIRST_FULL_WEEK: i32 = 3;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_builtin(Function::new("Date", 0, 0, date).impure());
    registry.add_builtin(Function::new("Time", 0, 0, time).impure());
    registry.add_builtin(Function::new("Now", 0, 0, now).impure());
    registry.add_builtin(Function::new("Timer", 0, 0, timer).impure());

    registry.add_builtin(Function::new("DateValue", 1, 1, date_value));
    registry.add_builtin(Function::new("TimeValue", 1, 1, time_value));
    registry.add_builtin(Function::new("DateSerial", 3, 3, date_serial));
    registry.add_builtin(Function::new("TimeSerial", 3, 3, time_serial));

    registry.add_builtin(Function::new("Year", 1, 1, |ctx, args| {
        part(ctx, args, |dt| dt.year())
    }));
    registry.add_builtin(Function::new("Month", 1, 1, |ctx, args| {
        part(ctx, args, |dt| dt.month() as i32)
    }));
    registry.add_builtin(Function::new("Day", 1, 1, |ctx, args| {
        part(ctx, args, |dt| dt.day() as i32)
    }));
    registry.add_builtin(Function::new("Hour", 1, 1, |ctx, args| {
        part(ctx, args, |dt| dt.hour() as i32)
    }));
    registry.add_builtin(Function::new("Minute", 1, 1, |ctx, args| {
        part(ctx, args, |dt| dt.minute() as i32)
    }));
    registry.add_builtin(Function::new("Second", 1, 1, |ctx, args| {
        part(ctx, args, |dt| dt.second() as i32)
    }));
    registry.add_builtin(Function::new("Weekday", 1, 2, weekday));
    registry.add_builtin(Function::new("WeekdayName", 1, 3, weekday_name));
    registry.add_builtin(Function::new("MonthName", 1, 2, month_name));

    registry.add_builtin(Function::new("DateAdd", 3, 3, date_add));
    registry.add_builtin(Function::new("DateDiff", 3, 5, date_diff));
    registry.add_builtin(Function::new("DatePart", 2, 4, date_part));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interval {
    Year,
    Quarter,
    Month,
    DayOfYear,
    Day,
    Weekday,
    Week,
    Hour,
    Minute,
    Second,
}

impl Interval {
    fn parse(v: &Value, locale: &LocaleContext) -> Result<Self, EvalError> {
        let code = v.as_string(locale);
        Ok(match code.to_ascii_lowercase().as_str() {
            "yyyy" => Interval::Year,
            "q" => Interval::Quarter,
            "m" => Interval::Month,
            "y" => Interval::DayOfYear,
            "d" => Interval::Day,
            "w" => Interval::Weekday,
            "ww" => Interval::Week,
            "h" => Interval::Hour,
            "n" => Interval::Minute,
            "s" => Interval::Second,
            _ => return Err(EvalError::invalid(format!("invalid interval '{}'", code))),
        })
    }
}

fn truncate_to_seconds(t: NaiveTime) -> NaiveTime {
    t.with_nanosecond(0).unwrap_or(t)
}

fn date(ctx: &mut EvalContext<'_>, _args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Date(ctx.now().date()))
}

fn time(ctx: &mut EvalContext<'_>, _args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Time(truncate_to_seconds(ctx.now().time())))
}

fn now(ctx: &mut EvalContext<'_>, _args: &[Value]) -> Result<Value, EvalError> {
    let now = ctx.now();
    Ok(Value::DateTime(
        now.date().and_time(truncate_to_seconds(now.time())),
    ))
}

fn timer(ctx: &mut EvalContext<'_>, _args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Double(crate::types::seconds_of_day(ctx.now().time())))
}

fn date_value(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Date(args[0].as_date_time(ctx.locale())?.date()))
}

fn time_value(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Time(args[0].as_date_time(ctx.locale())?.time()))
}

fn check_range(dt: NaiveDateTime) -> Result<NaiveDateTime, EvalError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&dt.year()) {
        Ok(dt)
    } else {
        Err(EvalError::invalid("date out of range"))
    }
}

fn out_of_range() -> EvalError {
    EvalError::invalid("date out of range")
}

/// Two-digit years are expanded with the locale's century cutoff before the
/// month and day roll over.
fn date_serial(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let mut year = arg_long(args, 0, locale)?;
    let month = arg_long(args, 1, locale)?;
    let day = arg_long(args, 2, locale)?;
    if (0..=99).contains(&year) {
        year = locale.temporal().expand_two_digit_year(year as u32);
    }

    let total = year as i64 * 12 + month as i64 - 1;
    let year = i32::try_from(total.div_euclid(12)).map_err(|_| out_of_range())?;
    let month0 = total.rem_euclid(12) as u32;
    let date = NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .and_then(|first| first.checked_add_signed(Duration::days(day as i64 - 1)))
        .ok_or_else(out_of_range)?;
    check_range(date.and_time(NaiveTime::MIN))?;
    Ok(Value::Date(date))
}

fn time_serial(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let total = arg_long(args, 0, locale)? as i64 * 3600
        + arg_long(args, 1, locale)? as i64 * 60
        + arg_long(args, 2, locale)? as i64;
    let dt = epoch_date()
        .and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::seconds(total))
        .ok_or_else(out_of_range)?;
    Ok(Value::from_date_time(check_range(dt)?))
}

fn part(
    ctx: &mut EvalContext<'_>,
    args: &[Value],
    f: fn(NaiveDateTime) -> i32,
) -> Result<Value, EvalError> {
    Ok(Value::Long(f(args[0].as_date_time(ctx.locale())?)))
}

fn first_day_arg(args: &[Value], i: usize, locale: &LocaleContext) -> Result<u32, EvalError> {
    match opt_long(args, i, SUNDAY, locale)? {
        USE_SYSTEM => Ok(SUNDAY as u32),
        d @ 1..=7 => Ok(d as u32),
        other => Err(EvalError::invalid(format!("invalid first day of week {}", other))),
    }
}

fn first_week_arg(args: &[Value], i: usize, locale: &LocaleContext) -> Result<i32, EvalError> {
    match opt_long(args, i, FIRST_JAN_1, locale)? {
        USE_SYSTEM => Ok(FIRST_JAN_1),
        w @ FIRST_JAN_1..=FIRST_FULL_WEEK => Ok(w),
        other => Err(EvalError::invalid(format!("invalid first week of year {}", other))),
    }
}

fn weekday(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let date = args[0].as_date_time(locale)?.date();
    let first_day = first_day_arg(args, 1, locale)?;
    Ok(Value::Long(weekday_number(date, first_day) as i32))
}

fn abbreviate(args: &[Value], i: usize) -> bool {
    opt(args, i).is_some_and(Value::as_bool)
}

fn weekday_name(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let n = arg_long(args, 0, locale)?;
    if !(1..=7).contains(&n) {
        return Err(EvalError::invalid(format!("invalid weekday {}", n)));
    }
    let first_day = first_day_arg(args, 2, locale)? as i32;
    let name = WEEKDAY_NAMES[((n - 1 + first_day - 1) % 7) as usize];
    Ok(Value::string(if abbreviate(args, 1) {
        &name[..3]
    } else {
        name
    }))
}

fn month_name(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let n = arg_long(args, 0, ctx.locale())?;
    if !(1..=12).contains(&n) {
        return Err(EvalError::invalid(format!("invalid month {}", n)));
    }
    let name = MONTH_NAMES[n as usize - 1];
    Ok(Value::string(if abbreviate(args, 1) {
        &name[..3]
    } else {
        name
    }))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|&d| NaiveDate::from_ymd_opt(year, month, d).is_some())
        .unwrap_or(28)
}

fn add_months(dt: NaiveDateTime, months: i64) -> Result<NaiveDateTime, EvalError> {
    let total = dt.year() as i64 * 12 + dt.month0() as i64 + months;
    let year = i32::try_from(total.div_euclid(12)).map_err(|_| out_of_range())?;
    let month = total.rem_euclid(12) as u32 + 1;
    let day = dt.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| d.and_time(dt.time()))
        .ok_or_else(out_of_range)
}

fn date_add(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let interval = Interval::parse(&args[0], locale)?;
    let n = arg_long(args, 1, locale)? as i64;
    let dt = args[2].as_date_time(locale)?;

    let shifted = match interval {
        Interval::Year => add_months(dt, n * 12)?,
        Interval::Quarter => add_months(dt, n * 3)?,
        Interval::Month => add_months(dt, n)?,
        Interval::DayOfYear | Interval::Day | Interval::Weekday => shift(dt, Duration::days(n))?,
        Interval::Week => shift(dt, Duration::weeks(n))?,
        Interval::Hour => shift(dt, Duration::hours(n))?,
        Interval::Minute => shift(dt, Duration::minutes(n))?,
        Interval::Second => shift(dt, Duration::seconds(n))?,
    };
    Ok(Value::from_date_time(check_range(shifted)?))
}

fn shift(dt: NaiveDateTime, by: Duration) -> Result<NaiveDateTime, EvalError> {
    dt.checked_add_signed(by).ok_or_else(out_of_range)
}

/// Start of the week containing `date`.
fn week_start(date: NaiveDate, first_day: u32) -> NaiveDate {
    let offset = weekday_number(date, first_day) as i64 - 1;
    date - Duration::days(offset)
}

fn seconds(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

fn long_or_double(n: i64) -> Value {
    match i32::try_from(n) {
        Ok(l) => Value::Long(l),
        Err(_) => Value::Double(n as f64),
    }
}

fn date_diff(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let interval = Interval::parse(&args[0], locale)?;
    let a = args[1].as_date_time(locale)?;
    let b = args[2].as_date_time(locale)?;
    let first_day = first_day_arg(args, 3, locale)?;
    first_week_arg(args, 4, locale)?;

    let months = |dt: NaiveDateTime| dt.year() as i64 * 12 + dt.month0() as i64;
    let quarters = |dt: NaiveDateTime| dt.year() as i64 * 4 + (dt.month0() / 3) as i64;
    let days = (b.date() - a.date()).num_days();

    let diff = match interval {
        Interval::Year => (b.year() - a.year()) as i64,
        Interval::Quarter => quarters(b) - quarters(a),
        Interval::Month => months(b) - months(a),
        Interval::DayOfYear | Interval::Day => days,
        Interval::Weekday => days / 7,
        Interval::Week => {
            (week_start(b.date(), first_day) - week_start(a.date(), first_day)).num_days() / 7
        }
        Interval::Hour => seconds(b).div_euclid(3600) - seconds(a).div_euclid(3600),
        Interval::Minute => seconds(b).div_euclid(60) - seconds(a).div_euclid(60),
        Interval::Second => seconds(b) - seconds(a),
    };
    Ok(long_or_double(diff))
}

/// First day of week 1 of `year`.
fn first_week_start(year: i32, first_day: u32, rule: i32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let start = week_start(jan1, first_day);
    let days_in_year = 7 - (jan1 - start).num_days();
    let week1 = match rule {
        FIRST_FOUR_DAYS if days_in_year < 4 => start + Duration::days(7),
        FIRST_FULL_WEEK if days_in_year < 7 => start + Duration::days(7),
        _ => start,
    };
    Some(week1)
}

fn week_of_year(date: NaiveDate, first_day: u32, rule: i32) -> Option<i64> {
    let week1 = first_week_start(date.year(), first_day, rule)?;
    if date < week1 {
        let last_of_previous = NaiveDate::from_ymd_opt(date.year() - 1, 12, 31)?;
        return week_of_year(last_of_previous, first_day, rule);
    }
    Some((date - week1).num_days() / 7 + 1)
}

fn date_part(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let interval = Interval::parse(&args[0], locale)?;
    let dt = args[1].as_date_time(locale)?;
    let first_day = first_day_arg(args, 2, locale)?;
    let first_week = first_week_arg(args, 3, locale)?;

    let value = match interval {
        Interval::Year => dt.year() as i64,
        Interval::Quarter => (dt.month0() / 3 + 1) as i64,
        Interval::Month => dt.month() as i64,
        Interval::DayOfYear => dt.ordinal() as i64,
        Interval::Day => dt.day() as i64,
        Interval::Weekday => weekday_number(dt.date(), first_day) as i64,
        Interval::Week => {
            week_of_year(dt.date(), first_day, first_week).ok_or_else(out_of_range)?
        }
        Interval::Hour => dt.hour() as i64,
        Interval::Minute => dt.minute() as i64,
        Interval::Second => dt.second() as i64,
    };
    Ok(long_or_double(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dv(y: i32, m: u32, d: u32) -> Value {
        Value::Date(ymd(y, m, d))
    }

    fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let registry = FunctionRegistry::builtin();
        let now = ymd(2024, 7, 4).and_hms_milli_opt(15, 30, 45, 250).unwrap();
        let mut ctx = EvalContext::default().with_now(now);
        registry.functions[&name.to_ascii_uppercase()].call(&mut ctx, args)
    }

    fn s(v: &str) -> Value {
        Value::string(v)
    }

    fn l(n: i32) -> Value {
        Value::Long(n)
    }

    #[test]
    fn clock_reads_pinned_now() {
        assert_eq!(call("Date", &[]).unwrap(), dv(2024, 7, 4));
        assert_eq!(
            call("Time", &[]).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(15, 30, 45).unwrap())
        );
        assert_eq!(call("Timer", &[]).unwrap(), Value::Double(55845.25));
        let registry = FunctionRegistry::builtin();
        assert!(!registry.functions["NOW"].is_pure());
    }

    #[test]
    fn serial_constructors_roll_over() {
        assert_eq!(
            call("DateSerial", &[l(2024), l(14), l(1)]).unwrap(),
            dv(2025, 2, 1)
        );
        assert_eq!(
            call("DateSerial", &[l(2024), l(3), l(0)]).unwrap(),
            dv(2024, 2, 29)
        );
        assert_eq!(call("DateSerial", &[l(24), l(1), l(1)]).unwrap(), dv(2024, 1, 1));
        assert_eq!(call("DateSerial", &[l(95), l(1), l(1)]).unwrap(), dv(1995, 1, 1));
        assert_eq!(
            call("TimeSerial", &[l(13), l(75), l(0)]).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(14, 15, 0).unwrap())
        );
        assert!(call("DateSerial", &[l(10000), l(1), l(1)]).is_err());
    }

    #[test]
    fn parts() {
        let dt = Value::string("7/4/2024 3:05:09 PM");
        assert_eq!(call("Year", &[dt.clone()]).unwrap(), l(2024));
        assert_eq!(call("Minute", &[dt.clone()]).unwrap(), l(5));
        assert_eq!(call("Weekday", &[dt.clone()]).unwrap(), l(5));
        assert_eq!(call("Weekday", &[dt.clone(), l(2)]).unwrap(), l(4));
        assert_eq!(call("DatePart", &[s("q"), dt.clone()]).unwrap(), l(3));
        assert_eq!(call("DatePart", &[s("y"), dt.clone()]).unwrap(), l(186));
        assert_eq!(call("DatePart", &[s("ww"), dv(2024, 1, 6)]).unwrap(), l(1));
        assert_eq!(call("DatePart", &[s("ww"), dv(2024, 1, 7)]).unwrap(), l(2));
        assert_eq!(
            call("DatePart", &[s("ww"), dv(2021, 1, 1), l(2), l(2)]).unwrap(),
            l(53)
        );
        assert!(call("DatePart", &[s("x"), dt]).is_err());
    }

    #[test]
    fn names() {
        assert_eq!(call("WeekdayName", &[l(1)]).unwrap(), s("Sunday"));
        assert_eq!(call("WeekdayName", &[l(1), Value::TRUE, l(2)]).unwrap(), s("Mon"));
        assert_eq!(call("MonthName", &[l(2), Value::TRUE]).unwrap(), s("Feb"));
        assert!(call("MonthName", &[l(13)]).is_err());
    }

    #[test]
    fn date_add_clamps_month_end() {
        assert_eq!(
            call("DateAdd", &[s("m"), l(1), dv(2024, 1, 31)]).unwrap(),
            dv(2024, 2, 29)
        );
        assert_eq!(
            call("DateAdd", &[s("yyyy"), l(-1), dv(2024, 2, 29)]).unwrap(),
            dv(2023, 2, 28)
        );
        assert_eq!(
            call("DateAdd", &[s("h"), l(36), dv(2024, 1, 1)]).unwrap(),
            Value::DateTime(ymd(2024, 1, 2).and_hms_opt(12, 0, 0).unwrap())
        );
    }

    #[test]
    fn date_diff_counts_boundaries() {
        assert_eq!(
            call("DateDiff", &[s("yyyy"), dv(2023, 12, 31), dv(2024, 1, 1)]).unwrap(),
            l(1)
        );
        assert_eq!(
            call("DateDiff", &[s("d"), dv(2024, 3, 1), dv(2024, 2, 1)]).unwrap(),
            l(-29)
        );
        assert_eq!(
            call("DateDiff", &[s("m"), dv(2024, 1, 31), dv(2024, 2, 1)]).unwrap(),
            l(1)
        );
        // Sat Jan 6 to Sun Jan 7 crosses one Sunday week start
        assert_eq!(
            call("DateDiff", &[s("ww"), dv(2024, 1, 6), dv(2024, 1, 7)]).unwrap(),
            l(1)
        );
        assert_eq!(
            call("DateDiff", &[s("w"), dv(2024, 1, 6), dv(2024, 1, 7)]).unwrap(),
            l(0)
        );
    }
}
