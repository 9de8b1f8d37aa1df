//! Dates and times with `SimpleDateFormat`-style patterns (`yyyy/M/d HH:mm`)
//!
//! Every temporal target is projected onto `NaiveDateTime`, so one parser
//! and one formatter serve dates, times, date-times and UTC timestamps.
//! Parsing is strict: the whole text must match and calendar fields must be
//! valid.

use super::{TextFormatter, TextParseError};
use chrono::format::{parse, Item, Parsed, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::marker::PhantomData;

/// A temporal type a cell can be bound to.
pub trait Temporal: Copy + Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    const DEFAULT_PATTERN: &'static str;

    fn to_datetime(self) -> NaiveDateTime;

    fn from_datetime(value: NaiveDateTime) -> Self;
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

impl Temporal for NaiveDate {
    const TYPE_NAME: &'static str = "NaiveDate";
    const DEFAULT_PATTERN: &'static str = "yyyy-MM-dd";

    fn to_datetime(self) -> NaiveDateTime {
        self.and_time(NaiveTime::default())
    }

    fn from_datetime(value: NaiveDateTime) -> Self {
        value.date()
    }
}

impl Temporal for NaiveDateTime {
    const TYPE_NAME: &'static str = "NaiveDateTime";
    const DEFAULT_PATTERN: &'static str = "yyyy-MM-dd HH:mm:ss";

    fn to_datetime(self) -> NaiveDateTime {
        self
    }

    fn from_datetime(value: NaiveDateTime) -> Self {
        value
    }
}

impl Temporal for NaiveTime {
    const TYPE_NAME: &'static str = "NaiveTime";
    const DEFAULT_PATTERN: &'static str = "HH:mm:ss";

    fn to_datetime(self) -> NaiveDateTime {
        // Excel stores a bare time on day zero
        NaiveDate::from_ymd_opt(1899, 12, 31)
            .unwrap_or_default()
            .and_time(self)
    }

    fn from_datetime(value: NaiveDateTime) -> Self {
        value.time()
    }
}

impl Temporal for DateTime<Utc> {
    const TYPE_NAME: &'static str = "DateTime<Utc>";
    const DEFAULT_PATTERN: &'static str = "yyyy-MM-dd HH:mm:ss";

    fn to_datetime(self) -> NaiveDateTime {
        self.naive_utc()
    }

    fn from_datetime(value: NaiveDateTime) -> Self {
        value.and_utc()
    }
}

/// A date pattern translated to chrono items and to an Excel number format.
#[derive(Debug, Clone, PartialEq)]
pub struct DatePattern {
    source: String,
    chrono: String,
    excel: String,
    has_date: bool,
    has_time: bool,
}

impl DatePattern {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut chrono = String::new();
        let mut excel = String::new();
        let (mut has_date, mut has_time) = (false, false);
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '\'' {
                let mut literal = String::new();
                i += 1;
                if chars.get(i) == Some(&'\'') {
                    literal.push('\'');
                    i += 1;
                } else {
                    while i < chars.len() {
                        if chars[i] == '\'' {
                            if chars.get(i + 1) == Some(&'\'') {
                                literal.push('\'');
                                i += 2;
                                continue;
                            }
                            i += 1;
                            break;
                        }
                        literal.push(chars[i]);
                        i += 1;
                    }
                }
                chrono.push_str(&literal.replace('%', "%%"));
                excel.push_str(&format!("\"{}\"", literal));
                continue;
            }

            if !c.is_ascii_alphabetic() {
                if c == '%' {
                    chrono.push_str("%%");
                } else {
                    chrono.push(c);
                }
                excel.push(c);
                i += 1;
                continue;
            }

            let run = chars[i..].iter().take_while(|x| **x == c).count();
            i += run;
            let (item, cell) = match (c, run) {
                ('y', 2) => ("%y", "yy"),
                ('y', _) => ("%Y", "yyyy"),
                ('M', 1) => ("%-m", "m"),
                ('M', 2) => ("%m", "mm"),
                ('M', 3) => ("%b", "mmm"),
                ('M', _) => ("%B", "mmmm"),
                ('d', 1) => ("%-d", "d"),
                ('d', _) => ("%d", "dd"),
                ('H', 1) | ('k', 1) => ("%-H", "h"),
                ('H', _) | ('k', _) => ("%H", "hh"),
                ('h', 1) | ('K', 1) => ("%-I", "h"),
                ('h', _) | ('K', _) => ("%I", "hh"),
                ('m', 1) => ("%-M", "m"),
                ('m', _) => ("%M", "mm"),
                ('s', 1) => ("%-S", "s"),
                ('s', _) => ("%S", "ss"),
                ('S', _) => ("%3f", "000"),
                ('a', _) => ("%p", "AM/PM"),
                ('E', 1..=3) => ("%a", "ddd"),
                ('E', _) => ("%A", "dddd"),
                _ => {
                    return Err(format!(
                        "unsupported letter '{}' in date pattern '{}'",
                        c, pattern
                    ))
                }
            };
            match c {
                'y' | 'M' | 'd' | 'E' => has_date = true,
                'H' | 'k' | 'h' | 'K' | 'm' => has_time = true,
                _ => {}
            }
            chrono.push_str(item);
            excel.push_str(cell);
        }

        if StrftimeItems::new(&chrono).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid date pattern '{}'", pattern));
        }
        Ok(Self {
            source: pattern.to_string(),
            chrono,
            excel,
            has_date,
            has_time,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Equivalent Excel number format, used when none is configured.
    pub fn excel_format(&self) -> &str {
        &self.excel
    }

    pub fn parse_datetime(&self, text: &str) -> Option<NaiveDateTime> {
        let mut parsed = Parsed::new();
        parse(&mut parsed, text.trim(), StrftimeItems::new(&self.chrono)).ok()?;
        let date = if self.has_date {
            parsed.to_naive_date().ok()?
        } else {
            epoch()
        };
        let time = if self.has_time {
            parsed.to_naive_time().ok()?
        } else {
            NaiveTime::default()
        };
        Some(date.and_time(time))
    }

    pub fn format_datetime(&self, value: &NaiveDateTime) -> String {
        value.format(&self.chrono).to_string()
    }
}

/// Parse/format a [`Temporal`] with a [`DatePattern`].
#[derive(Debug, Clone)]
pub struct DateFormatter<D> {
    pattern: DatePattern,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Temporal> DateFormatter<D> {
    pub fn new() -> Self {
        Self {
            pattern: DatePattern::parse(D::DEFAULT_PATTERN)
                .unwrap_or_else(|_| DatePattern {
                    source: D::DEFAULT_PATTERN.to_string(),
                    chrono: "%Y-%m-%d %H:%M:%S".to_string(),
                    excel: "yyyy-mm-dd hh:mm:ss".to_string(),
                    has_date: true,
                    has_time: true,
                }),
            _marker: PhantomData,
        }
    }

    pub fn with_pattern(pattern: &str) -> Result<Self, String> {
        Ok(Self {
            pattern: DatePattern::parse(pattern)?,
            _marker: PhantomData,
        })
    }

    pub fn pattern(&self) -> &DatePattern {
        &self.pattern
    }
}

impl<D: Temporal> Default for DateFormatter<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Temporal> TextFormatter<D> for DateFormatter<D> {
    fn parse(&self, text: &str) -> Result<D, TextParseError> {
        self.pattern
            .parse_datetime(text)
            .map(D::from_datetime)
            .ok_or_else(|| {
                TextParseError::new(text, D::TYPE_NAME)
                    .with_detail(format!("expected pattern '{}'", self.pattern.source))
            })
    }

    fn format(&self, value: &D) -> String {
        self.pattern.format_datetime(&value.to_datetime())
    }
}
