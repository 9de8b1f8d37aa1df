//! Text formatters
//!
//! Per-type `parse`/`format` of the textual form of a value. Cell converters
//! wrap these with the cell-level concerns (defaults, trimming, formulas).

pub mod boolean;
pub mod date;
pub mod enumeration;
pub mod number;
pub mod string;

pub use boolean::BooleanFormatter;
pub use date::{DateFormatter, DatePattern, Temporal};
pub use enumeration::{EnumFormatter, XlsEnum};
pub use number::{NumberFormatter, NumberPattern, Numeric};
pub use string::StringFormatter;

use thiserror::Error;

/// Text that could not be parsed into the requested type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot parse '{text}' as {type_name}{}", .detail.as_ref().map(|d| format!(" ({})", d)).unwrap_or_default())]
pub struct TextParseError {
    pub text: String,
    pub type_name: String,
    pub detail: Option<String>,
}

impl TextParseError {
    pub fn new(text: &str, type_name: &str) -> Self {
        Self {
            text: text.to_string(),
            type_name: type_name.to_string(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Encode/decode the textual form of `T`.
pub trait TextFormatter<T>: Send + Sync {
    fn parse(&self, text: &str) -> Result<T, TextParseError>;

    fn format(&self, value: &T) -> String;
}
