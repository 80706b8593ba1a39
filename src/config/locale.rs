//! # Locale Configuration
//!
//! Expression evaluation formats and parses dates and numbers the way the
//! host locale dictates. `LocaleContext` bundles the two halves:
//!
//! - `TemporalConfig`: date/time patterns, AM/PM designators, 12/24-hour
//!   clock and the two-digit-year cutoff
//! - `NumericConfig`: decimal and grouping separators, currency symbol and
//!   default fractional digits
//!
//! ## Builder Pattern
//!
//! ```ignore
//! let locale = LocaleContext::builder()
//!     .decimal_separator(',')
//!     .grouping_separator('.')
//!     .short_date_pattern("dd.MM.yyyy")
//!     .build()?;
//! ```
//!
//! ## Pattern Tokens
//!
//! | Token        | Meaning                          |
//! |--------------|----------------------------------|
//! | `yyyy`/`yy`  | four / two digit year            |
//! | `MMMM`/`MMM` | month name / abbreviated name    |
//! | `MM`/`M`     | month number, padded / unpadded  |
//! | `dddd`/`ddd` | weekday name / abbreviated name  |
//! | `dd`/`d`     | day of month, padded / unpadded  |
//! | `HH`/`H`     | 24-hour clock                    |
//! | `hh`/`h`     | 12-hour clock                    |
//! | `mm`/`m`     | minutes                          |
//! | `ss`/`s`     | seconds                          |
//! | `tt`         | AM/PM designator                 |
//!
//! Defaults are US English.

use eyre::{ensure, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalConfig {
    short_date_pattern: String,
    long_date_pattern: String,
    long_time_pattern: String,
    short_time_pattern: String,
    am_designator: String,
    pm_designator: String,
    is_24_hour: bool,
    date_separator: char,
    time_separator: char,
    century_cutoff: u32,
}

impl TemporalConfig {
    pub fn short_date_pattern(&self) -> &str {
        &self.short_date_pattern
    }

    pub fn long_date_pattern(&self) -> &str {
        &self.long_date_pattern
    }

    /// Pattern used for `Time` values and the time part of general dates.
    pub fn long_time_pattern(&self) -> &str {
        &self.long_time_pattern
    }

    pub fn short_time_pattern(&self) -> &str {
        &self.short_time_pattern
    }

    /// General date pattern: short date followed by long time.
    pub fn general_pattern(&self) -> String {
        format!("{} {}", self.short_date_pattern, self.long_time_pattern)
    }

    pub fn am_designator(&self) -> &str {
        &self.am_designator
    }

    pub fn pm_designator(&self) -> &str {
        &self.pm_designator
    }

    pub fn is_24_hour(&self) -> bool {
        self.is_24_hour
    }

    pub fn date_separator(&self) -> char {
        self.date_separator
    }

    pub fn time_separator(&self) -> char {
        self.time_separator
    }

    /// Two-digit years below the cutoff land in the 2000s, the rest in the
    /// 1900s.
    pub fn expand_two_digit_year(&self, year: u32) -> i32 {
        if year < self.century_cutoff {
            2000 + year as i32
        } else {
            1900 + year as i32
        }
    }
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            short_date_pattern: "M/d/yyyy".to_string(),
            long_date_pattern: "dddd, MMMM d, yyyy".to_string(),
            long_time_pattern: "h:mm:ss tt".to_string(),
            short_time_pattern: "HH:mm".to_string(),
            am_designator: "AM".to_string(),
            pm_designator: "PM".to_string(),
            is_24_hour: false,
            date_separator: '/',
            time_separator: ':',
            century_cutoff: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericConfig {
    decimal_separator: char,
    grouping_separator: char,
    currency_symbol: String,
    fractional_digits: u32,
}

impl NumericConfig {
    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    pub fn grouping_separator(&self) -> char {
        self.grouping_separator
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    /// Digits after the decimal separator when a format function is not
    /// given an explicit count.
    pub fn fractional_digits(&self) -> u32 {
        self.fractional_digits
    }
}

impl Default for NumericConfig {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            grouping_separator: ',',
            currency_symbol: "$".to_string(),
            fractional_digits: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocaleContext {
    temporal: TemporalConfig,
    numeric: NumericConfig,
}

impl LocaleContext {
    pub fn builder() -> LocaleContextBuilder {
        LocaleContextBuilder::default()
    }

    pub fn temporal(&self) -> &TemporalConfig {
        &self.temporal
    }

    pub fn numeric(&self) -> &NumericConfig {
        &self.numeric
    }
}

#[derive(Debug, Default)]
pub struct LocaleContextBuilder {
    temporal: TemporalConfig,
    numeric: NumericConfig,
}

impl LocaleContextBuilder {
    pub fn short_date_pattern(mut self, pattern: &str) -> Self {
        self.temporal.short_date_pattern = pattern.to_string();
        self
    }

    pub fn long_date_pattern(mut self, pattern: &str) -> Self {
        self.temporal.long_date_pattern = pattern.to_string();
        self
    }

    pub fn long_time_pattern(mut self, pattern: &str) -> Self {
        self.temporal.long_time_pattern = pattern.to_string();
        self
    }

    pub fn short_time_pattern(mut self, pattern: &str) -> Self {
        self.temporal.short_time_pattern = pattern.to_string();
        self
    }

    pub fn am_pm(mut self, am: &str, pm: &str) -> Self {
        self.temporal.am_designator = am.to_string();
        self.temporal.pm_designator = pm.to_string();
        self
    }

    /// Switches the default time pattern to a 24-hour clock.
    pub fn use_24_hour(mut self, enabled: bool) -> Self {
        self.temporal.is_24_hour = enabled;
        if enabled {
            self.temporal.long_time_pattern = "H:mm:ss".to_string();
        }
        self
    }

    pub fn date_separator(mut self, sep: char) -> Self {
        self.temporal.date_separator = sep;
        self
    }

    pub fn time_separator(mut self, sep: char) -> Self {
        self.temporal.time_separator = sep;
        self
    }

    pub fn century_cutoff(mut self, cutoff: u32) -> Self {
        self.temporal.century_cutoff = cutoff;
        self
    }

    pub fn decimal_separator(mut self, sep: char) -> Self {
        self.numeric.decimal_separator = sep;
        self
    }

    pub fn grouping_separator(mut self, sep: char) -> Self {
        self.numeric.grouping_separator = sep;
        self
    }

    pub fn currency_symbol(mut self, symbol: &str) -> Self {
        self.numeric.currency_symbol = symbol.to_string();
        self
    }

    pub fn fractional_digits(mut self, digits: u32) -> Self {
        self.numeric.fractional_digits = digits;
        self
    }

    pub fn build(self) -> Result<LocaleContext> {
        ensure!(
            self.numeric.decimal_separator != self.numeric.grouping_separator,
            "decimal and grouping separators must differ (both '{}')",
            self.numeric.decimal_separator
        );
        ensure!(
            self.temporal.century_cutoff <= 100,
            "century cutoff {} must be at most 100",
            self.temporal.century_cutoff
        );
        ensure!(
            self.numeric.fractional_digits <= 28,
            "fractional digits {} exceed the decimal scale limit",
            self.numeric.fractional_digits
        );
        Ok(LocaleContext {
            temporal: self.temporal,
            numeric: self.numeric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_us_english() {
        let locale = LocaleContext::default();
        assert_eq!(locale.numeric().decimal_separator(), '.');
        assert_eq!(locale.temporal().short_date_pattern(), "M/d/yyyy");
        assert_eq!(locale.temporal().general_pattern(), "M/d/yyyy h:mm:ss tt");
    }

    #[test]
    fn builder_rejects_clashing_separators() {
        let result = LocaleContext::builder().decimal_separator(',').build();
        assert!(result.is_err());

        let locale = LocaleContext::builder()
            .decimal_separator(',')
            .grouping_separator('.')
            .build()
            .unwrap();
        assert_eq!(locale.numeric().grouping_separator(), '.');
    }

    #[test]
    fn two_digit_years_split_at_cutoff() {
        let temporal = TemporalConfig::default();
        assert_eq!(temporal.expand_two_digit_year(29), 2029);
        assert_eq!(temporal.expand_two_digit_year(30), 1930);
    }
}
