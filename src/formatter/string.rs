//! Strings pass through unchanged

use super::{TextFormatter, TextParseError};

#[derive(Debug, Clone, Copy, Default)]
pub struct StringFormatter;

impl TextFormatter<String> for StringFormatter {
    fn parse(&self, text: &str) -> Result<String, TextParseError> {
        Ok(text.to_string())
    }

    fn format(&self, value: &String) -> String {
        value.clone()
    }
}
