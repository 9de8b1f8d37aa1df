//! Numbers with optional decimal patterns (`###,##0`, `#,##0.00`, `0.0%`)
//!
//! Without a pattern, parsing is locale independent: an optional sign,
//! digits, one `.` and an optional exponent.

use super::{TextFormatter, TextParseError};
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

/// Primitive numbers a cell can be bound to.
pub trait Numeric: Copy + PartialEq + Display + FromStr + Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    const INTEGRAL: bool;

    /// Exact conversion; `None` when out of range or fractional for integers.
    fn from_f64(value: f64) -> Option<Self>;

    fn to_f64(self) -> f64;
}

macro_rules! integral_numeric {
    ($($t:ty),*) => {
        $(
            impl Numeric for $t {
                const TYPE_NAME: &'static str = stringify!($t);
                const INTEGRAL: bool = true;

                fn from_f64(value: f64) -> Option<Self> {
                    if !value.is_finite() || value.fract() != 0.0 {
                        return None;
                    }
                    if value < <$t>::MIN as f64 || value > <$t>::MAX as f64 {
                        return None;
                    }
                    Some(value as $t)
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

integral_numeric!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl Numeric for f32 {
    const TYPE_NAME: &'static str = "f32";
    const INTEGRAL: bool = false;

    fn from_f64(value: f64) -> Option<Self> {
        let narrowed = value as f32;
        (narrowed.is_finite() || !value.is_finite()).then_some(narrowed)
    }

    fn to_f64(self) -> f64 {
        // Through the shortest decimal form, so 0.1f32 becomes 0.1
        self.to_string().parse().unwrap_or(self as f64)
    }
}

impl Numeric for f64 {
    const TYPE_NAME: &'static str = "f64";
    const INTEGRAL: bool = false;

    fn from_f64(value: f64) -> Option<Self> {
        Some(value)
    }

    fn to_f64(self) -> f64 {
        self
    }
}

/// A decimal pattern in the `#,##0.00` family.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberPattern {
    prefix: String,
    suffix: String,
    grouping: Option<usize>,
    min_integer: usize,
    min_fraction: usize,
    max_fraction: usize,
    percent: bool,
}

impl NumberPattern {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        // Only the positive sub-pattern is used
        let positive = pattern.split(';').next().unwrap_or_default();
        let (prefix, rest) = take_literal(positive, |c| "#0,.".contains(c));
        let body_len = rest
            .find(|c: char| !"#0,.".contains(c))
            .unwrap_or(rest.len());
        let (body, tail) = rest.split_at(body_len);
        let (suffix, leftover) = take_literal(tail, |_| false);
        if body.is_empty() || !leftover.is_empty() {
            return Err(format!("invalid number pattern '{}'", pattern));
        }

        let (integer, fraction) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if fraction.contains('.') || fraction.contains(',') {
            return Err(format!("invalid number pattern '{}'", pattern));
        }
        let grouping = integer
            .rfind(',')
            .map(|at| integer.len() - at - 1)
            .filter(|size| *size > 0);

        Ok(Self {
            percent: prefix.contains('%') || suffix.contains('%'),
            prefix,
            suffix,
            grouping,
            min_integer: integer.chars().filter(|c| *c == '0').count(),
            min_fraction: fraction.chars().filter(|c| *c == '0').count(),
            max_fraction: fraction.len(),
        })
    }

    pub fn format(&self, value: f64) -> String {
        let scaled = if self.percent { value * 100.0 } else { value };
        let fixed = format!("{:.*}", self.max_fraction, scaled.abs());
        let (integer, fraction) = match fixed.split_once('.') {
            Some((i, f)) => (i.to_string(), f.to_string()),
            None => (fixed, String::new()),
        };

        let mut fraction = fraction;
        while fraction.len() > self.min_fraction && fraction.ends_with('0') {
            fraction.pop();
        }
        let mut integer = integer.trim_start_matches('0').to_string();
        while integer.len() < self.min_integer {
            integer.insert(0, '0');
        }
        if let Some(size) = self.grouping {
            integer = group_digits(&integer, size);
        }

        let negative = scaled < 0.0 && (integer.chars().any(|c| c.is_ascii_digit() && c != '0')
            || fraction.chars().any(|c| c != '0'));
        let mut text = String::new();
        if negative {
            text.push('-');
        }
        text.push_str(&self.prefix);
        text.push_str(&integer);
        if !fraction.is_empty() {
            text.push('.');
            text.push_str(&fraction);
        }
        text.push_str(&self.suffix);
        text
    }

    pub fn parse_value(&self, text: &str) -> Option<f64> {
        let text = text.trim();
        let (negative, text) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let text = text.strip_prefix(self.prefix.as_str())?;
        let text = text.strip_suffix(self.suffix.as_str())?;
        let digits: String = text.chars().filter(|c| *c != ',').collect();
        if digits.is_empty()
            || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
            || digits.matches('.').count() > 1
        {
            return None;
        }
        let mut value: f64 = digits.parse().ok()?;
        if self.percent {
            value /= 100.0;
        }
        Some(if negative { -value } else { value })
    }
}

/// Split off a leading literal run; `'...'` quotes protect pattern characters.
fn take_literal(text: &str, stop: impl Fn(char) -> bool) -> (String, &str) {
    let mut literal = String::new();
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        if c == '\'' {
            quoted = !quoted;
            continue;
        }
        if !quoted && stop(c) {
            return (literal, &text[i..]);
        }
        literal.push(c);
    }
    (literal, "")
}

fn group_digits(digits: &str, size: usize) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % size == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}

/// Parse/format a [`Numeric`] with an optional [`NumberPattern`].
#[derive(Debug, Clone)]
pub struct NumberFormatter<N> {
    pattern: Option<NumberPattern>,
    _marker: PhantomData<fn() -> N>,
}

impl<N: Numeric> Default for NumberFormatter<N> {
    fn default() -> Self {
        Self {
            pattern: None,
            _marker: PhantomData,
        }
    }
}

impl<N: Numeric> NumberFormatter<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(pattern: &str) -> Result<Self, String> {
        Ok(Self {
            pattern: Some(NumberPattern::parse(pattern)?),
            _marker: PhantomData,
        })
    }

    fn parse_plain(text: &str) -> Option<N> {
        text.parse::<N>().ok().or_else(|| {
            text.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .and_then(N::from_f64)
        })
    }
}

impl<N: Numeric> TextFormatter<N> for NumberFormatter<N> {
    fn parse(&self, text: &str) -> Result<N, TextParseError> {
        let trimmed = text.trim();
        let parsed = match &self.pattern {
            Some(pattern) => pattern
                .parse_value(trimmed)
                .and_then(N::from_f64)
                .or_else(|| Self::parse_plain(trimmed)),
            None => Self::parse_plain(trimmed),
        };
        parsed.ok_or_else(|| {
            let error = TextParseError::new(text, N::TYPE_NAME);
            if N::INTEGRAL {
                error.with_detail("not an integer in range")
            } else {
                error
            }
        })
    }

    fn format(&self, value: &N) -> String {
        match &self.pattern {
            Some(pattern) => pattern.format(value.to_f64()),
            None => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_pattern() {
        let formatter = NumberFormatter::<i32>::with_pattern("###,##0").unwrap();
        assert_eq!(formatter.format(&1234567), "1,234,567");
        assert_eq!(formatter.format(&0), "0");
        assert_eq!(formatter.parse("1,234").unwrap(), 1234);
        assert_eq!(formatter.parse("100").unwrap(), 100);
    }

    #[test]
    fn test_fraction_and_percent() {
        let money = NumberFormatter::<f64>::with_pattern("#,##0.00").unwrap();
        assert_eq!(money.format(&1234.5), "1,234.50");
        assert_eq!(money.format(&-3.0), "-3.00");

        let percent = NumberFormatter::<f64>::with_pattern("0.0%").unwrap();
        assert_eq!(percent.format(&0.125), "12.5%");
        assert_eq!(percent.parse("12.5%").unwrap(), 0.125);
    }

    #[test]
    fn test_literal_prefix_and_suffix() {
        let pattern = NumberPattern::parse("'#'0' pcs'").unwrap();
        assert_eq!(pattern.format(12.0), "#12 pcs");
        assert_eq!(pattern.parse_value("#12 pcs"), Some(12.0));
    }

    #[test]
    fn test_plain_parsing() {
        let formatter = NumberFormatter::<i64>::new();
        assert_eq!(formatter.parse(" 42 ").unwrap(), 42);
        assert_eq!(formatter.parse("100.0").unwrap(), 100);
        assert!(formatter.parse("1.5").is_err());
        assert!(formatter.parse("abc").is_err());

        let floats = NumberFormatter::<f64>::new();
        assert_eq!(floats.parse("1.5E+3").unwrap(), 1500.0);
    }

    #[test]
    fn test_integer_range_is_checked() {
        let formatter = NumberFormatter::<u8>::new();
        assert_eq!(formatter.parse("255").unwrap(), 255);
        let error = formatter.parse("300").unwrap_err();
        assert_eq!(error.type_name, "u8");
        assert_eq!(error.text, "300");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(NumberPattern::parse("abc").is_err());
        assert!(NumberPattern::parse("#.#.#").is_err());
    }
}
