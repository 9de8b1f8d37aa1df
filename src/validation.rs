//! Load outcomes and accumulated field errors

use crate::accessor::FieldMetadata;
use crate::address::CellAddress;
use crate::error::SheetMapError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Cell text could not be converted to the field type.
    Conversion,
    CellNotFound,
    SheetNotFound,
    AnnotationInvalid,
    Formula,
    Other,
}

/// One failure attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub sheet_name: String,
    /// `name`, `items[3]`, `rows[2].price`, `rows[0].attendance[May]`.
    pub field_path: String,
    pub address: Option<CellAddress>,
    pub label: Option<String>,
    pub kind: ErrorKind,
    pub type_name: Option<String>,
    pub observed_text: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(
        sheet_name: impl Into<String>,
        field_path: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            field_path: field_path.into(),
            address: None,
            label: None,
            kind,
            type_name: None,
            observed_text: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, address: CellAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>, observed_text: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self.observed_text = Some(observed_text.into());
        self
    }
}

impl FieldError {
    /// Record a fatal error that aborted one sheet of a multi-sheet load.
    pub fn from_fatal(sheet_name: &str, error: SheetMapError) -> Self {
        let message = error.to_string();
        match error {
            SheetMapError::TypeBind(error) => error,
            SheetMapError::AnnotationInvalid { field, .. } => {
                FieldError::new(sheet_name, field, ErrorKind::AnnotationInvalid, message)
            }
            SheetMapError::CellNotFound { field, .. } => {
                FieldError::new(sheet_name, field, ErrorKind::CellNotFound, message)
            }
            SheetMapError::Formula { field, .. } => {
                FieldError::new(sheet_name, field, ErrorKind::Formula, message)
            }
            SheetMapError::SheetNotFound(_) => {
                FieldError::new(sheet_name, "", ErrorKind::SheetNotFound, message)
            }
            SheetMapError::BadAddress(_) => {
                FieldError::new(sheet_name, "", ErrorKind::AnnotationInvalid, message)
            }
            _ => FieldError::new(sheet_name, "", ErrorKind::Other, message),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.sheet_name)?;
        if let Some(address) = &self.address {
            write!(f, "!{}", address)?;
        }
        write!(f, "] {}", self.field_path)?;
        if let Some(label) = &self.label {
            write!(f, " ({})", label)?;
        }
        match (&self.type_name, &self.observed_text) {
            (Some(type_name), Some(text)) => {
                write!(f, ": '{}' is not a valid {}", text, type_name)
            }
            _ => write!(f, ": {}", self.message),
        }
    }
}

/// Result of loading one sheet: the record plus everything learned on the way.
#[derive(Debug, Clone)]
pub struct SheetBindingErrors<R> {
    target: R,
    sheet_name: Option<String>,
    errors: Vec<FieldError>,
    metadata: FieldMetadata,
}

impl<R> SheetBindingErrors<R> {
    pub fn new(
        target: R,
        sheet_name: Option<String>,
        errors: Vec<FieldError>,
        metadata: FieldMetadata,
    ) -> Self {
        Self {
            target,
            sheet_name,
            errors,
            metadata,
        }
    }

    /// Outcome for a sheet that was skipped (missing and ignored).
    pub fn skipped(target: R) -> Self {
        Self::new(target, None, Vec::new(), FieldMetadata::default())
    }

    pub fn target(&self) -> &R {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut R {
        &mut self.target
    }

    pub fn into_target(self) -> R {
        self.target
    }

    /// `None` when the sheet was skipped.
    pub fn sheet_name(&self) -> Option<&str> {
        self.sheet_name.as_deref()
    }

    pub fn is_skipped(&self) -> bool {
        self.sheet_name.is_none()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn field_errors<'a>(&'a self, field_path: &'a str) -> impl Iterator<Item = &'a FieldError> {
        self.errors.iter().filter(move |e| e.field_path == field_path)
    }

    pub fn cell_errors(&self, address: CellAddress) -> impl Iterator<Item = &FieldError> {
        self.errors.iter().filter(move |e| e.address == Some(address))
    }

    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }
}

/// Result of saving one record.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    sheet_name: Option<String>,
    metadata: FieldMetadata,
}

impl SaveReport {
    pub fn new(sheet_name: Option<String>, metadata: FieldMetadata) -> Self {
        Self {
            sheet_name,
            metadata,
        }
    }

    /// `None` when the sheet was skipped.
    pub fn sheet_name(&self) -> Option<&str> {
        self.sheet_name.as_deref()
    }

    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_conversion_error() {
        let error = FieldError::new("Sheet1", "rows[2].price", ErrorKind::Conversion, "bad")
            .at("C6".parse().unwrap())
            .with_label(Some("単価".into()))
            .with_type("i32", "abc");
        assert_eq!(
            error.to_string(),
            "[Sheet1!C6] rows[2].price (単価): 'abc' is not a valid i32"
        );
    }

    #[test]
    fn test_lookup_by_path_and_cell() {
        let c6: CellAddress = "C6".parse().unwrap();
        let outcome = SheetBindingErrors::new(
            (),
            Some("Sheet1".into()),
            vec![
                FieldError::new("Sheet1", "a", ErrorKind::Conversion, "x").at(c6),
                FieldError::new("Sheet1", "b", ErrorKind::CellNotFound, "y"),
            ],
            FieldMetadata::default(),
        );
        assert!(outcome.has_errors());
        assert_eq!(outcome.field_errors("a").count(), 1);
        assert_eq!(outcome.cell_errors(c6).count(), 1);
        assert!(!outcome.is_skipped());
        assert!(SheetBindingErrors::skipped(()).is_skipped());
    }
}
