use crate::validation::FieldError;
use thiserror::Error;

pub type SheetMapResult<T> = Result<T, SheetMapError>;

/// Fatal errors. Per-field conversion failures are accumulated in
/// [`crate::validation::SheetBindingErrors`] instead, unless the mapper is
/// configured to fail fast.
#[derive(Error, Debug)]
pub enum SheetMapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid cell address '{0}'")]
    BadAddress(String),

    #[error("Invalid mapping for '{field}': {message}")]
    AnnotationInvalid { field: String, message: String },

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Cell not found in sheet '{sheet}' for '{field}': {message}")]
    CellNotFound {
        sheet: String,
        field: String,
        message: String,
    },

    #[error("Type bind failure: {0}")]
    TypeBind(FieldError),

    #[error("Formula error for '{field}': {message}")]
    Formula { field: String, message: String },

    #[error("Workbook error: {0}")]
    Workbook(String),
}

impl SheetMapError {
    pub fn annotation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SheetMapError::AnnotationInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn cell_not_found(
        sheet: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SheetMapError::CellNotFound {
            sheet: sheet.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn formula(field: impl Into<String>, message: impl Into<String>) -> Self {
        SheetMapError::Formula {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for errors that only abort the current sheet when several sheets
    /// are processed in one call.
    pub fn is_sheet_level(&self) -> bool {
        !matches!(
            self,
            SheetMapError::Io(_)
                | SheetMapError::Workbook(_)
                | SheetMapError::Config(_)
                | SheetMapError::Json(_)
        )
    }
}

impl From<calamine::Error> for SheetMapError {
    fn from(error: calamine::Error) -> Self {
        SheetMapError::Workbook(format!("Failed to read workbook: {}", error))
    }
}

impl From<rust_xlsxwriter::XlsxError> for SheetMapError {
    fn from(error: rust_xlsxwriter::XlsxError) -> Self {
        SheetMapError::Workbook(format!("Failed to write workbook: {}", error))
    }
}

impl From<zip::result::ZipError> for SheetMapError {
    fn from(error: zip::result::ZipError) -> Self {
        SheetMapError::Workbook(format!("Failed to read xlsx package: {}", error))
    }
}

impl From<quick_xml::Error> for SheetMapError {
    fn from(error: quick_xml::Error) -> Self {
        SheetMapError::Workbook(format!("Malformed xlsx part: {}", error))
    }
}

impl From<quick_xml::events::attributes::AttrError> for SheetMapError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        SheetMapError::Workbook(format!("Malformed xlsx attribute: {}", error))
    }
}

impl From<quick_xml::encoding::EncodingError> for SheetMapError {
    fn from(error: quick_xml::encoding::EncodingError) -> Self {
        SheetMapError::Workbook(format!("Malformed xlsx text: {}", error))
    }
}
