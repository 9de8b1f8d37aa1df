//! Booleans read from configurable literal lists

use super::{TextFormatter, TextParseError};

#[derive(Debug, Clone)]
pub struct BooleanFormatter {
    true_literals: Vec<String>,
    false_literals: Vec<String>,
    ignore_case: bool,
    fail_to_false: bool,
}

impl BooleanFormatter {
    pub fn new(true_literals: Vec<String>, false_literals: Vec<String>) -> Self {
        Self {
            true_literals,
            false_literals,
            ignore_case: true,
            fail_to_false: false,
        }
    }

    pub fn with_ignore_case(mut self, value: bool) -> Self {
        self.ignore_case = value;
        self
    }

    /// Read unknown text as `false` instead of failing.
    pub fn with_fail_to_false(mut self, value: bool) -> Self {
        self.fail_to_false = value;
        self
    }

    fn matches(&self, literals: &[String], text: &str) -> bool {
        literals.iter().any(|literal| {
            if self.ignore_case {
                literal.to_lowercase() == text.to_lowercase()
            } else {
                literal == text
            }
        })
    }
}

impl TextFormatter<bool> for BooleanFormatter {
    fn parse(&self, text: &str) -> Result<bool, TextParseError> {
        let trimmed = text.trim();
        if self.matches(&self.true_literals, trimmed) {
            Ok(true)
        } else if self.matches(&self.false_literals, trimmed) || self.fail_to_false {
            Ok(false)
        } else {
            Err(TextParseError::new(text, "bool").with_detail(format!(
                "expected one of {:?} or {:?}",
                self.true_literals, self.false_literals
            )))
        }
    }

    fn format(&self, value: &bool) -> String {
        let literals = if *value {
            &self.true_literals
        } else {
            &self.false_literals
        };
        literals
            .first()
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }
}
