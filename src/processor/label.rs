//! Label search
//!
//! Labels are compared exactly, after stripping whitespace
//! (`normalize_label_text`), or as a whole-text regular expression when
//! written as `/pattern/` and `regex_label_text` is on. Cells are scanned
//! top-to-bottom, then left-to-right; the first match wins.

use crate::address::CellAddress;
use crate::config::MapperConfig;
use crate::error::{SheetMapError, SheetMapResult};
use crate::workbook::Sheet;
use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Regex(Regex),
}

/// A compiled label.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    matcher: Matcher,
    normalize: bool,
}

pub fn normalize(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

impl LabelMatcher {
    pub fn new(label: &str, config: &MapperConfig, field: &str) -> SheetMapResult<Self> {
        let normalize = config.normalize_label_text;
        let is_pattern = config.regex_label_text
            && label.chars().count() > 2
            && label.starts_with('/')
            && label.ends_with('/');
        let matcher = if is_pattern {
            let pattern = &label[1..label.len() - 1];
            let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                SheetMapError::annotation(field, format!("invalid label pattern '{}': {}", label, e))
            })?;
            Matcher::Regex(regex)
        } else if normalize {
            Matcher::Exact(self::normalize(label))
        } else {
            Matcher::Exact(label.to_string())
        };
        Ok(Self { matcher, normalize })
    }

    pub fn is_match(&self, text: &str) -> bool {
        let text = if self.normalize {
            normalize(text)
        } else {
            text.to_string()
        };
        match &self.matcher {
            Matcher::Exact(label) => *label == text,
            Matcher::Regex(regex) => regex.is_match(&text),
        }
    }
}

/// Label lookups on one sheet.
pub struct LabelFinder<'a> {
    sheet: &'a Sheet,
    config: &'a MapperConfig,
}

impl<'a> LabelFinder<'a> {
    pub fn new(sheet: &'a Sheet, config: &'a MapperConfig) -> Self {
        Self { sheet, config }
    }

    pub fn matches(&self, text: &str, label: &str, field: &str) -> SheetMapResult<bool> {
        Ok(LabelMatcher::new(label, self.config, field)?.is_match(text))
    }

    /// First cell carrying `label`.
    pub fn find(&self, label: &str, field: &str) -> SheetMapResult<Option<CellAddress>> {
        self.find_where(label, field, |_| true)
    }

    /// First cell carrying `label` strictly after `after` in scan order.
    pub fn find_after(
        &self,
        label: &str,
        after: CellAddress,
        field: &str,
    ) -> SheetMapResult<Option<CellAddress>> {
        self.find_where(label, field, |address| address > after)
    }

    fn find_where(
        &self,
        label: &str,
        field: &str,
        accept: impl Fn(CellAddress) -> bool,
    ) -> SheetMapResult<Option<CellAddress>> {
        let matcher = LabelMatcher::new(label, self.config, field)?;
        let mut found = self
            .sheet
            .cells()
            .map(|(address, _)| *address)
            .filter(|address| accept(*address))
            .filter(|address| {
                let text = self.sheet.formatted_text(*address);
                !text.is_empty() && matcher.is_match(&text)
            });

        let first = match found.next() {
            Some(first) => first,
            None => return Ok(None),
        };
        if let Some(second) = found.next() {
            if self.config.error_on_multiple_label_match {
                return Err(SheetMapError::cell_not_found(
                    self.sheet.name(),
                    field,
                    format!("label '{}' matches several cells ({}, {})", label, first, second),
                ));
            }
            warn!(
                "Label '{}' matches several cells, using {} (also {})",
                label, first, second
            );
        }
        Ok(Some(first))
    }
}
