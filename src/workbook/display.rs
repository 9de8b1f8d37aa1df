//! Formatted text of cells
//!
//! Renders a raw value through its number format the way Excel shows it.
//! Covers General, fixed/grouped decimals, percentages, text (`@`) and
//! date/time tokens. Scientific and fraction formats fall back to General.

use super::cell::{Cell, CellValue};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// User-visible text of a cell.
pub fn formatted_text(cell: &Cell, date1904: bool) -> String {
    render_value(&cell.value, cell.style.number_format.as_deref(), date1904)
}

pub fn render_value(value: &CellValue, format: Option<&str>, date1904: bool) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Bool(true) => "TRUE".to_string(),
        CellValue::Bool(false) => "FALSE".to_string(),
        CellValue::Error(e) => e.clone(),
        CellValue::Number(n) => render_number(*n, format, date1904),
        CellValue::DateTime(dt) => match format.map(|f| select_section(f, 1.0)) {
            Some((section, _)) if is_date_format(section) => render_date_pattern(dt, section),
            _ => default_datetime_text(dt),
        },
    }
}

/// Render a number through an Excel number format.
pub fn render_number(value: f64, format: Option<&str>, date1904: bool) -> String {
    let format = match format {
        Some(f) if !f.trim().is_empty() && !f.eq_ignore_ascii_case("general") => f,
        _ => return general_number(value),
    };
    let (section, own_negative) = select_section(format, value);
    if section.trim() == "@" || section.eq_ignore_ascii_case("general") {
        return general_number(value);
    }
    if is_date_format(section) {
        return match serial_to_datetime(value, date1904) {
            Some(dt) => render_date_pattern(&dt, section),
            None => general_number(value),
        };
    }
    render_numeric_pattern(value, section, own_negative)
}

/// Excel's General format: integers without decimals, others with up to
/// ten significant digits.
pub fn general_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{:.0}", value);
    }
    let magnitude = value.abs().log10().floor() as i32;
    if !(-9..15).contains(&magnitude) {
        return format!("{:E}", value);
    }
    let decimals = (9 - magnitude).clamp(0, 15) as usize;
    trim_decimals(&format!("{:.*}", decimals, value), 0)
}

/// Pick the format section for a value: `positive;negative;zero;text`.
/// The flag is true when the chosen section carries its own sign handling.
fn select_section(format: &str, value: f64) -> (&str, bool) {
    let sections = split_sections(format);
    match sections.len() {
        0 => ("", false),
        1 => (sections[0], false),
        _ if value < 0.0 => (sections[1], true),
        _ if value == 0.0 && sections.len() > 2 => (sections[2], false),
        _ => (sections[0], false),
    }
}

fn split_sections(format: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in format.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                sections.push(&format[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(&format[start..]);
    sections
}

/// True when the section contains date/time tokens outside literals.
pub fn is_date_format(section: &str) -> bool {
    let mut quoted = false;
    let mut bracket = false;
    let mut escaped = false;
    for c in section.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' | '_' | '*' if !quoted && !bracket => escaped = true,
            '"' if !bracket => quoted = !quoted,
            '[' if !quoted => bracket = true,
            ']' if !quoted => bracket = false,
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' if !quoted && !bracket => {
                return true
            }
            _ => {}
        }
    }
    false
}

/// Split a numeric section into literal prefix, placeholder digits and suffix.
fn render_numeric_pattern(value: f64, section: &str, own_negative: bool) -> String {
    let mut prefix = String::new();
    let mut suffix = String::new();
    let mut digits = String::new();
    let mut percent = false;
    let mut chars = section.chars().peekable();
    let mut digits_done = false;
    while let Some(c) = chars.next() {
        let literal: Option<String> = match c {
            '"' => {
                let mut text = String::new();
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                    text.push(q);
                }
                Some(text)
            }
            '\\' => chars.next().map(String::from),
            '_' => {
                chars.next();
                Some(" ".to_string())
            }
            '*' => {
                chars.next();
                None
            }
            '[' => {
                for q in chars.by_ref() {
                    if q == ']' {
                        break;
                    }
                }
                None
            }
            '%' => {
                percent = true;
                Some("%".to_string())
            }
            '0' | '#' | '?' | '.' => {
                digits.push(c);
                None
            }
            ',' if !digits.is_empty() && !digits_done => {
                digits.push(c);
                None
            }
            other => Some(other.to_string()),
        };
        if let Some(text) = literal {
            if digits.is_empty() {
                prefix.push_str(&text);
            } else {
                digits_done = true;
                suffix.push_str(&text);
            }
        }
    }

    if digits.is_empty() {
        return format!("{}{}", prefix, suffix);
    }

    let scaled = if percent { value * 100.0 } else { value };
    let (int_digits, frac_digits) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits.as_str(), ""),
    };
    let grouping = int_digits.trim_end_matches(',').contains(',');
    let min_int = int_digits.chars().filter(|c| *c == '0').count();
    let min_frac = frac_digits.chars().filter(|c| *c == '0').count();
    let max_frac = frac_digits
        .chars()
        .filter(|c| matches!(c, '0' | '#' | '?'))
        .count();

    let magnitude = scaled.abs();
    let rounded = format!("{:.*}", max_frac, magnitude);
    let rounded = trim_decimals(&rounded, min_frac);
    let (int_part, frac_part) = match rounded.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (rounded.clone(), None),
    };

    let mut whole = int_part.trim_start_matches('0').to_string();
    while whole.len() < min_int {
        whole.insert(0, '0');
    }
    if grouping {
        whole = group_thousands(&whole);
    }

    let mut body = whole;
    if let Some(frac) = frac_part {
        body.push('.');
        body.push_str(&frac);
    }
    let negative = value < 0.0 && !own_negative && body.chars().any(|c| c.is_ascii_digit() && c != '0');
    format!(
        "{}{}{}{}",
        if negative { "-" } else { "" },
        prefix,
        body,
        suffix
    )
}

/// Drop trailing zeros of a decimal string, keeping at least `keep` decimals.
fn trim_decimals(text: &str, keep: usize) -> String {
    let Some((int_part, frac)) = text.split_once('.') else {
        return text.to_string();
    };
    let mut frac = frac.to_string();
    while frac.len() > keep && frac.ends_with('0') {
        frac.pop();
    }
    if frac.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac)
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::new();
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn default_datetime_text(dt: &NaiveDateTime) -> String {
    let midnight = dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0;
    if dt.date() <= base_date(false) {
        dt.format("%H:%M:%S").to_string()
    } else if midnight {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum DateToken {
    Literal(String),
    Year(usize),
    /// Month or minute, decided after tokenizing.
    M(usize),
    Minute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    Fraction(usize),
    AmPm(bool),
}

fn tokenize_date_pattern(section: &str) -> Vec<DateToken> {
    let chars: Vec<char> = section.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let mut text = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    text.push(chars[i]);
                    i += 1;
                }
                tokens.push(DateToken::Literal(text));
                i += 1;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    tokens.push(DateToken::Literal(next.to_string()));
                }
                i += 2;
            }
            '_' => {
                tokens.push(DateToken::Literal(" ".to_string()));
                i += 2;
            }
            '*' => i += 2,
            '[' => {
                let close = chars[i..].iter().position(|c| *c == ']').map(|p| i + p);
                let inner: String = match close {
                    Some(end) => chars[i + 1..end].iter().collect(),
                    None => String::new(),
                };
                let lower = inner.to_ascii_lowercase();
                if !lower.is_empty() && lower.chars().all(|c| c == 'h') {
                    tokens.push(DateToken::Hour(lower.len()));
                } else if !lower.is_empty() && lower.chars().all(|c| c == 'm') {
                    tokens.push(DateToken::Minute(lower.len()));
                } else if !lower.is_empty() && lower.chars().all(|c| c == 's') {
                    tokens.push(DateToken::Second(lower.len()));
                }
                i = close.map(|end| end + 1).unwrap_or(chars.len());
            }
            '@' => i += 1,
            _ => {
                let rest: String = chars[i..].iter().collect();
                let upper = rest.to_ascii_uppercase();
                if upper.starts_with("AM/PM") {
                    tokens.push(DateToken::AmPm(true));
                    i += 5;
                    continue;
                }
                if upper.starts_with("A/P") {
                    tokens.push(DateToken::AmPm(false));
                    i += 3;
                    continue;
                }
                let lower = c.to_ascii_lowercase();
                if matches!(lower, 'y' | 'm' | 'd' | 'h' | 's' | 'e') {
                    let mut run = 1;
                    while i + run < chars.len() && chars[i + run].to_ascii_lowercase() == lower {
                        run += 1;
                    }
                    tokens.push(match lower {
                        'y' | 'e' => DateToken::Year(run),
                        'm' => DateToken::M(run),
                        'd' => DateToken::Day(run),
                        'h' => DateToken::Hour(run),
                        _ => DateToken::Second(run),
                    });
                    i += run;
                } else if c == '.'
                    && matches!(tokens.last(), Some(DateToken::Second(_)))
                    && chars.get(i + 1) == Some(&'0')
                {
                    let mut run = 0;
                    while chars.get(i + 1 + run) == Some(&'0') {
                        run += 1;
                    }
                    tokens.push(DateToken::Fraction(run));
                    i += 1 + run;
                } else {
                    tokens.push(DateToken::Literal(c.to_string()));
                    i += 1;
                }
            }
        }
    }

    // `m` is a minute when it follows an hour or precedes a second.
    let positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !matches!(t, DateToken::Literal(_)))
        .map(|(i, _)| i)
        .collect();
    for (p, &index) in positions.iter().enumerate() {
        if let DateToken::M(run) = tokens[index] {
            let after_hour = p > 0 && matches!(tokens[positions[p - 1]], DateToken::Hour(_));
            let before_second = positions
                .get(p + 1)
                .map(|&n| matches!(tokens[n], DateToken::Second(_)))
                .unwrap_or(false);
            if run <= 2 && (after_hour || before_second) {
                tokens[index] = DateToken::Minute(run);
            }
        }
    }
    tokens
}

const MONTHS: [&str; 12] = [
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
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Render a date/time through an Excel date pattern (first section).
pub fn render_date_pattern(dt: &NaiveDateTime, pattern: &str) -> String {
    let section = split_sections(pattern).first().copied().unwrap_or("");
    let tokens = tokenize_date_pattern(section);
    let twelve_hour = tokens.iter().any(|t| matches!(t, DateToken::AmPm(_)));
    let mut out = String::new();
    for token in &tokens {
        match token {
            DateToken::Literal(text) => out.push_str(text),
            DateToken::Year(n) if *n <= 2 => out.push_str(&format!("{:02}", dt.year() % 100)),
            DateToken::Year(_) => out.push_str(&format!("{:04}", dt.year())),
            DateToken::M(1) => out.push_str(&dt.month().to_string()),
            DateToken::M(2) => out.push_str(&format!("{:02}", dt.month())),
            DateToken::M(3) => out.push_str(&MONTHS[dt.month0() as usize][..3]),
            DateToken::M(4) => out.push_str(MONTHS[dt.month0() as usize]),
            DateToken::M(_) => out.push_str(&MONTHS[dt.month0() as usize][..1]),
            DateToken::Minute(1) => out.push_str(&dt.minute().to_string()),
            DateToken::Minute(_) => out.push_str(&format!("{:02}", dt.minute())),
            DateToken::Day(1) => out.push_str(&dt.day().to_string()),
            DateToken::Day(2) => out.push_str(&format!("{:02}", dt.day())),
            DateToken::Day(3) => {
                out.push_str(&WEEKDAYS[dt.weekday().num_days_from_monday() as usize][..3])
            }
            DateToken::Day(_) => {
                out.push_str(WEEKDAYS[dt.weekday().num_days_from_monday() as usize])
            }
            DateToken::Hour(n) => {
                let hour = if twelve_hour {
                    match dt.hour() % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    dt.hour()
                };
                if *n == 1 {
                    out.push_str(&hour.to_string());
                } else {
                    out.push_str(&format!("{:02}", hour));
                }
            }
            DateToken::Second(1) => out.push_str(&dt.second().to_string()),
            DateToken::Second(_) => out.push_str(&format!("{:02}", dt.second())),
            DateToken::Fraction(n) => {
                let millis = dt.nanosecond() / 1_000_000;
                let digits = format!("{:03}", millis);
                out.push('.');
                out.push_str(&digits[..(*n).min(3)]);
            }
            DateToken::AmPm(full) => {
                let am = dt.hour() < 12;
                out.push_str(match (full, am) {
                    (true, true) => "AM",
                    (true, false) => "PM",
                    (false, true) => "A",
                    (false, false) => "P",
                });
            }
        }
    }
    out
}

fn base_date(date1904: bool) -> NaiveDate {
    if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1).unwrap_or_default()
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 31).unwrap_or_default()
    }
}

/// Convert an Excel serial date to a civil date-time.
///
/// The 1900 system keeps Excel's phantom 1900-02-29 (serial 60).
pub fn serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    let base = if !date1904 && serial >= 60.0 {
        base_date(false).pred_opt()?
    } else {
        base_date(date1904)
    };
    base.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::milliseconds(millis))
}

/// Convert a civil date-time to an Excel serial date.
pub fn datetime_to_serial(dt: &NaiveDateTime, date1904: bool) -> f64 {
    let (base, adjust) = if date1904 {
        (base_date(true), 0.0)
    } else {
        (base_date(false).pred_opt().unwrap_or_default(), 1.0)
    };
    let start = base.and_hms_opt(0, 0, 0).unwrap_or_default();
    let millis = (*dt - start).num_milliseconds() as f64;
    let serial = millis / 86_400_000.0;
    if !date1904 && serial < 61.0 {
        serial - adjust
    } else {
        serial
    }
}
