//! Which cell values a target type can take directly
//!
//! Anything not listed natively goes through the cell's formatted text and
//! the target's text formatter.

use crate::workbook::display::{datetime_to_serial, serial_to_datetime};
use crate::workbook::CellValue;
use chrono::NaiveDateTime;

/// Broad shape of a bound type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Text,
    Boolean,
    Integer,
    Float,
    Temporal,
    Enum,
    Custom,
}

/// A cell value in the form a target accepts without parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Bool(bool),
    Number(f64),
    DateTime(NaiveDateTime),
}

/// How a cell value reaches a target of some kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    Native(Native),
    ViaText,
}

/// The coercion table.
///
/// | target      | bool   | number          | datetime        | text/error |
/// |-------------|--------|-----------------|-----------------|------------|
/// | Text        | text   | text            | text            | text       |
/// | Boolean     | native | text            | text            | text       |
/// | Integer     | text   | native          | native (serial) | text       |
/// | Float       | text   | native          | native (serial) | text       |
/// | Temporal    | text   | native (serial) | native          | text       |
/// | Enum/Custom | text   | text            | text            | text       |
pub fn coerce(kind: TargetKind, value: &CellValue, date1904: bool) -> Coercion {
    let native = match (kind, value) {
        (TargetKind::Boolean, CellValue::Bool(b)) => Some(Native::Bool(*b)),
        (TargetKind::Integer | TargetKind::Float, CellValue::Number(n)) => Some(Native::Number(*n)),
        (TargetKind::Integer | TargetKind::Float, CellValue::DateTime(dt)) => {
            Some(Native::Number(datetime_to_serial(dt, date1904)))
        }
        (TargetKind::Temporal, CellValue::DateTime(dt)) => Some(Native::DateTime(*dt)),
        (TargetKind::Temporal, CellValue::Number(n)) => {
            serial_to_datetime(*n, date1904).map(Native::DateTime)
        }
        _ => None,
    };
    match native {
        Some(native) => Coercion::Native(native),
        None => Coercion::ViaText,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_numbers_are_native_for_numeric_targets() {
        assert_eq!(
            coerce(TargetKind::Integer, &CellValue::Number(3.0), false),
            Coercion::Native(Native::Number(3.0))
        );
        assert_eq!(
            coerce(TargetKind::Text, &CellValue::Number(3.0), false),
            Coercion::ViaText
        );
        assert_eq!(
            coerce(TargetKind::Boolean, &CellValue::Number(1.0), false),
            Coercion::ViaText
        );
    }

    #[test]
    fn test_serial_numbers_become_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            coerce(TargetKind::Temporal, &CellValue::Number(45292.0), false),
            Coercion::Native(Native::DateTime(expected))
        );
    }

    #[test]
    fn test_text_always_goes_through_formatter() {
        for kind in [TargetKind::Integer, TargetKind::Temporal, TargetKind::Boolean] {
            assert_eq!(
                coerce(kind, &CellValue::Text("x".into()), false),
                Coercion::ViaText
            );
        }
    }
}
