//! # Date Doubles, Date Patterns and Date Parsing
//!
//! Access stores every date/time as a "date double": whole days since
//! 1899-12-30 in the integral part and the time of day as a fraction. For
//! dates before the epoch the integral part is negative but the fraction is
//! still a positive time of day, so `-1.25` is 1899-12-29 06:00:
//!
//! ```text
//!   -1.25          -1.0          0.0          0.5          1.0
//!     │              │            │            │            │
//! 12-29 06:00    12-29 00:00  12-30 00:00  12-30 12:00  12-31 00:00
//! ```
//!
//! Valid dates run from 100-01-01 to 9999-12-31. Converting a double outside
//! that range fails instead of wrapping.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::config::TemporalConfig;
use crate::error::EvalError;

/// `NaiveDate::num_days_from_ce` of 1899-12-30.
const EPOCH_DAYS_FROM_CE: i32 = 693_594;

const MIN_DATE_DOUBLE: f64 = -657_434.0;
const MAX_DATE_DOUBLE: f64 = 2_958_466.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn to_date_double(dt: NaiveDateTime) -> f64 {
    let days = dt.date().num_days_from_ce() - EPOCH_DAYS_FROM_CE;
    let time = dt.time();
    let millis = time.num_seconds_from_midnight() as f64 * 1000.0
        + (time.nanosecond() / 1_000_000) as f64;
    let frac = millis / MILLIS_PER_DAY;
    if days < 0 {
        days as f64 - frac
    } else {
        days as f64 + frac
    }
}

pub fn from_date_double(value: f64) -> Result<NaiveDateTime, EvalError> {
    if !value.is_finite() || value <= MIN_DATE_DOUBLE - 1.0 || value >= MAX_DATE_DOUBLE {
        return Err(EvalError::coercion(value, "Date"));
    }

    let mut days = value.trunc();
    let mut millis = ((value - days).abs() * MILLIS_PER_DAY).round();
    if millis >= MILLIS_PER_DAY {
        millis -= MILLIS_PER_DAY;
        days += value.signum();
    }

    let date = NaiveDate::from_num_days_from_ce_opt(days as i32 + EPOCH_DAYS_FROM_CE)
        .ok_or_else(|| EvalError::coercion(value, "Date"))?;
    let millis = millis as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        millis / 1000,
        (millis % 1000) * 1_000_000,
    )
    .ok_or_else(|| EvalError::coercion(value, "Date"))?;

    Ok(date.and_time(time))
}

pub fn epoch_date() -> NaiveDate {
    NaiveDate::from_num_days_from_ce_opt(EPOCH_DAYS_FROM_CE).unwrap_or_default()
}

/// Weekday number with Sunday = 1, shifted so that `first_day` = 1.
pub fn weekday_number(date: NaiveDate, first_day: u32) -> u32 {
    let sunday_based = date.weekday().num_days_from_sunday() + 1;
    (sunday_based + 7 - first_day) % 7 + 1
}

pub fn weekday_from_number(sunday_based: u32) -> Option<Weekday> {
    match sunday_based {
        1 => Some(Weekday::Sun),
        2 => Some(Weekday::Mon),
        3 => Some(Weekday::Tue),
        4 => Some(Weekday::Wed),
        5 => Some(Weekday::Thu),
        6 => Some(Weekday::Fri),
        7 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Renders `dt` with a pattern made of the tokens listed in
/// `config::LocaleContext`. `/` and `:` are replaced by the configured
/// separators; any other character is copied as-is.
pub fn format_pattern(dt: NaiveDateTime, pattern: &str, temporal: &TemporalConfig) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        match c {
            'y' => {
                if run >= 3 {
                    out.push_str(&format!("{:04}", dt.year()));
                } else {
                    out.push_str(&format!("{:02}", dt.year().rem_euclid(100)));
                }
            }
            'M' => match run {
                1 => out.push_str(&dt.month().to_string()),
                2 => out.push_str(&format!("{:02}", dt.month())),
                3 => out.push_str(&MONTH_NAMES[dt.month0() as usize][..3]),
                _ => out.push_str(MONTH_NAMES[dt.month0() as usize]),
            },
            'd' => {
                let weekday = WEEKDAY_NAMES[dt.weekday().num_days_from_sunday() as usize];
                match run {
                    1 => out.push_str(&dt.day().to_string()),
                    2 => out.push_str(&format!("{:02}", dt.day())),
                    3 => out.push_str(&weekday[..3]),
                    _ => out.push_str(weekday),
                }
            }
            'H' => push_number(&mut out, dt.hour(), run),
            'h' => {
                let hour = match dt.hour() % 12 {
                    0 => 12,
                    h => h,
                };
                push_number(&mut out, hour, run);
            }
            'm' => push_number(&mut out, dt.minute(), run),
            's' => push_number(&mut out, dt.second(), run),
            't' => {
                if dt.hour() < 12 {
                    out.push_str(temporal.am_designator());
                } else {
                    out.push_str(temporal.pm_designator());
                }
            }
            '/' => {
                for _ in 0..run {
                    out.push(temporal.date_separator());
                }
            }
            ':' => {
                for _ in 0..run {
                    out.push(temporal.time_separator());
                }
            }
            other => {
                for _ in 0..run {
                    out.push(other);
                }
            }
        }
        i += run;
    }

    out
}

fn push_number(out: &mut String, value: u32, run: usize) {
    if run >= 2 {
        out.push_str(&format!("{:02}", value));
    } else {
        out.push_str(&value.to_string());
    }
}

/// Result of parsing a date/time string: either half may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTemporal {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

/// Parses the permissive date/time forms Access accepts in `#...#` literals
/// and `CDate`: numeric dates in the locale's month/day order, ISO
/// `yyyy-mm-dd`, month names (`Jan 5, 2020`, `5 January 2020`), and
/// `h:mm[:ss] [AM|PM]` times. A date without a year takes `default_year`.
pub fn parse_date_time(
    input: &str,
    temporal: &TemporalConfig,
    default_year: i32,
) -> Option<ParsedTemporal> {
    let normalized = input.trim().replace(',', " ");
    if normalized.is_empty() {
        return None;
    }

    let mut pm = None;
    let mut date_chunks = Vec::new();
    let mut time_chunk = None;

    for chunk in normalized.split_whitespace() {
        if chunk.eq_ignore_ascii_case(temporal.am_designator()) || chunk.eq_ignore_ascii_case("AM")
        {
            pm = Some(false);
        } else if chunk.eq_ignore_ascii_case(temporal.pm_designator())
            || chunk.eq_ignore_ascii_case("PM")
        {
            pm = Some(true);
        } else if chunk.contains(':') || chunk.contains(temporal.time_separator()) {
            if time_chunk.is_some() {
                return None;
            }
            time_chunk = Some(chunk);
        } else {
            date_chunks.push(chunk);
        }
    }

    // "10AM" style suffixes without a space
    if time_chunk.is_none() && pm.is_none() && date_chunks.len() == 1 {
        let upper = date_chunks[0].to_ascii_uppercase();
        if let Some(hour) = upper
            .strip_suffix("AM")
            .or_else(|| upper.strip_suffix("PM"))
            .and_then(|h| h.parse::<u32>().ok())
        {
            let time = apply_meridiem(hour, 0, 0.0, Some(upper.ends_with("PM")))?;
            return Some(ParsedTemporal {
                date: None,
                time: Some(time),
            });
        }
    }

    let time = match time_chunk {
        Some(chunk) => Some(parse_time(chunk, temporal, pm)?),
        None if pm.is_some() => return None,
        None => None,
    };

    let date = if date_chunks.is_empty() {
        None
    } else {
        Some(parse_date(&date_chunks, temporal, default_year)?)
    };

    if date.is_none() && time.is_none() {
        return None;
    }

    Some(ParsedTemporal { date, time })
}

fn parse_time(chunk: &str, temporal: &TemporalConfig, pm: Option<bool>) -> Option<NaiveTime> {
    let parts: Vec<&str> = chunk
        .split(|c: char| c == ':' || c == temporal.time_separator())
        .collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let hour: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    let second: f64 = match parts.get(2) {
        Some(s) => s.parse().ok()?,
        None => 0.0,
    };
    apply_meridiem(hour, minute, second, pm)
}

fn apply_meridiem(hour: u32, minute: u32, second: f64, pm: Option<bool>) -> Option<NaiveTime> {
    let hour = match pm {
        Some(_) if hour == 0 || hour > 12 => return None,
        Some(false) if hour == 12 => 0,
        Some(true) if hour < 12 => hour + 12,
        _ => hour,
    };
    if !(0.0..60.0).contains(&second) {
        return None;
    }
    let whole = second.trunc() as u32;
    let millis = ((second - second.trunc()) * 1000.0).round() as u32;
    NaiveTime::from_hms_milli_opt(hour, minute, whole, millis.min(999))
}

fn parse_date(chunks: &[&str], temporal: &TemporalConfig, default_year: i32) -> Option<NaiveDate> {
    let mut numbers: Vec<&str> = Vec::new();
    let mut month_name = None;

    for chunk in chunks {
        for part in chunk.split(|c: char| c == '/' || c == '-' || c == '.' || c == temporal.date_separator())
        {
            if part.is_empty() {
                continue;
            }
            if part.chars().all(|c| c.is_ascii_digit()) {
                numbers.push(part);
            } else if let Some(month) = month_from_name(part) {
                if month_name.is_some() {
                    return None;
                }
                month_name = Some(month);
            } else if !is_weekday_name(part) {
                return None;
            }
        }
    }

    if let Some(month) = month_name {
        let day: u32 = numbers.first()?.parse().ok()?;
        let year = match numbers.get(1) {
            Some(y) => parse_year(y, temporal)?,
            None => default_year,
        };
        if numbers.len() > 2 {
            return None;
        }
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    match numbers.len() {
        3 if numbers[0].len() >= 3 => {
            let year = parse_year(numbers[0], temporal)?;
            NaiveDate::from_ymd_opt(year, numbers[1].parse().ok()?, numbers[2].parse().ok()?)
        }
        3 | 2 => {
            let order = field_order(temporal.short_date_pattern());
            let mut month = None;
            let mut day = None;
            let mut year = None;
            let mut idx = 0;
            for field in order {
                if field == 'y' && numbers.len() == 2 {
                    continue;
                }
                let text = numbers.get(idx)?;
                idx += 1;
                match field {
                    'M' => month = text.parse::<u32>().ok(),
                    'd' => day = text.parse::<u32>().ok(),
                    _ => year = parse_year(text, temporal),
                }
            }
            let year = if numbers.len() == 2 {
                default_year
            } else {
                year?
            };
            NaiveDate::from_ymd_opt(year, month?, day?)
        }
        _ => None,
    }
}

fn parse_year(text: &str, temporal: &TemporalConfig) -> Option<i32> {
    let value: u32 = text.parse().ok()?;
    if text.len() <= 2 {
        Some(temporal.expand_two_digit_year(value))
    } else {
        Some(value as i32)
    }
}

/// Order of the month, day and year fields in a short date pattern.
fn field_order(pattern: &str) -> [char; 3] {
    let mut order = Vec::with_capacity(3);
    for c in pattern.chars() {
        if matches!(c, 'M' | 'd' | 'y') && !order.contains(&c) {
            order.push(c);
        }
    }
    match order.as_slice() {
        [a, b, c] => [*a, *b, *c],
        _ => ['M', 'd', 'y'],
    }
}

pub fn month_from_name(name: &str) -> Option<u32> {
    if name.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|m| {
            m.len() >= name.len() && m[..name.len()].eq_ignore_ascii_case(name)
        })
        .map(|i| i as u32 + 1)
}

fn is_weekday_name(name: &str) -> bool {
    name.len() >= 3
        && WEEKDAY_NAMES
            .iter()
            .any(|w| w.len() >= name.len() && w[..name.len()].eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn epoch_and_known_dates() {
        assert_eq!(to_date_double(dt(1899, 12, 30, 0, 0, 0)), 0.0);
        assert_eq!(to_date_double(dt(1899, 12, 30, 12, 0, 0)), 0.5);
        assert_eq!(to_date_double(dt(2024, 1, 1, 0, 0, 0)), 45292.0);
        assert_eq!(from_date_double(45292.25).unwrap(), dt(2024, 1, 1, 6, 0, 0));
    }

    #[test]
    fn negative_dates_keep_positive_time_fraction() {
        assert_eq!(to_date_double(dt(1899, 12, 29, 6, 0, 0)), -1.25);
        assert_eq!(from_date_double(-1.25).unwrap(), dt(1899, 12, 29, 6, 0, 0));
        assert_eq!(from_date_double(-1.0).unwrap(), dt(1899, 12, 29, 0, 0, 0));
    }

    #[test]
    fn out_of_range_doubles_fail() {
        assert!(from_date_double(3_000_000.0).is_err());
        assert!(from_date_double(-700_000.0).is_err());
        assert!(from_date_double(f64::NAN).is_err());
        assert!(from_date_double(2_958_465.5).is_ok());
    }

    #[test]
    fn format_default_patterns() {
        let temporal = TemporalConfig::default();
        let value = dt(2024, 3, 7, 15, 4, 5);
        assert_eq!(format_pattern(value, "M/d/yyyy", &temporal), "3/7/2024");
        assert_eq!(format_pattern(value, "h:mm:ss tt", &temporal), "3:04:05 PM");
        assert_eq!(
            format_pattern(value, "dddd, MMMM d, yyyy", &temporal),
            "Thursday, March 7, 2024"
        );
        assert_eq!(format_pattern(value, "HH:mm", &temporal), "15:04");
    }

    #[test]
    fn parse_common_forms() {
        let temporal = TemporalConfig::default();
        let parsed = parse_date_time("3/7/2024", &temporal, 2000).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 3, 7));
        assert_eq!(parsed.time, None);

        let parsed = parse_date_time("2024-03-07 13:30", &temporal, 2000).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 3, 7));
        assert_eq!(parsed.time, NaiveTime::from_hms_opt(13, 30, 0));

        let parsed = parse_date_time("Jan 5, 2020 12:15:00 AM", &temporal, 2000).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2020, 1, 5));
        assert_eq!(parsed.time, NaiveTime::from_hms_opt(0, 15, 0));

        let parsed = parse_date_time("1/2/29", &temporal, 2000).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2029, 1, 2));

        assert!(parse_date_time("not a date", &temporal, 2000).is_none());
        assert!(parse_date_time("13/45/2020", &temporal, 2000).is_none());
    }

    #[test]
    fn weekday_numbers_honor_first_day() {
        let thursday = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(weekday_number(thursday, 1), 5);
        assert_eq!(weekday_number(thursday, 2), 4);
        assert_eq!(weekday_number(thursday, 5), 1);
    }
}
