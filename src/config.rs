//! Mapper configuration
//!
//! Global switches that change how labels are matched and how failures are
//! reported. Loaded from YAML or built in code.

use crate::error::SheetMapResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Strip spaces, tabs and newlines from labels before comparing.
    pub normalize_label_text: bool,

    /// Treat labels written as `/pattern/` as regular expressions.
    pub regex_label_text: bool,

    /// Fail with `CellNotFound` when a label matches more than one cell.
    pub error_on_multiple_label_match: bool,

    /// Merge adjacent equal values of merged arrays/columns after writing.
    pub merge_cell_on_save: bool,

    /// A missing sheet skips the record instead of failing.
    pub ignore_sheet_not_found: bool,

    /// Accumulate conversion failures (true) or fail on the first one.
    pub continue_type_bind_failure: bool,

    /// Drop conversion failures entirely; the field keeps its zero value.
    pub skip_type_bind_failure: bool,

    /// Evaluate formulas and store their cached results when saving.
    pub recalculate_formulas_on_save: bool,

    /// Literals read as `true` (case-insensitive). The first is written.
    pub boolean_true_literals: Vec<String>,

    /// Literals read as `false` (case-insensitive). The first is written.
    pub boolean_false_literals: Vec<String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            normalize_label_text: false,
            regex_label_text: false,
            error_on_multiple_label_match: false,
            merge_cell_on_save: false,
            ignore_sheet_not_found: false,
            continue_type_bind_failure: true,
            skip_type_bind_failure: false,
            recalculate_formulas_on_save: true,
            boolean_true_literals: ["true", "1", "yes", "○"].map(String::from).to_vec(),
            boolean_false_literals: ["false", "0", "no", "×"].map(String::from).to_vec(),
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(text: &str) -> SheetMapResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> SheetMapResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn with_normalize_label_text(mut self, value: bool) -> Self {
        self.normalize_label_text = value;
        self
    }

    pub fn with_regex_label_text(mut self, value: bool) -> Self {
        self.regex_label_text = value;
        self
    }

    pub fn with_error_on_multiple_label_match(mut self, value: bool) -> Self {
        self.error_on_multiple_label_match = value;
        self
    }

    pub fn with_merge_cell_on_save(mut self, value: bool) -> Self {
        self.merge_cell_on_save = value;
        self
    }

    pub fn with_ignore_sheet_not_found(mut self, value: bool) -> Self {
        self.ignore_sheet_not_found = value;
        self
    }

    pub fn with_continue_type_bind_failure(mut self, value: bool) -> Self {
        self.continue_type_bind_failure = value;
        self
    }

    pub fn with_skip_type_bind_failure(mut self, value: bool) -> Self {
        self.skip_type_bind_failure = value;
        self
    }

    pub fn with_recalculate_formulas_on_save(mut self, value: bool) -> Self {
        self.recalculate_formulas_on_save = value;
        self
    }
}
