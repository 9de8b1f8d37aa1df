//! Cell primitives: values, borders and styles

use chrono::NaiveDateTime;
use serde::Serialize;

/// Raw value held by a cell. Formula cells hold their cached result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "blank",
            CellValue::Text(_) => "text",
            CellValue::Number(_) => "number",
            CellValue::Bool(_) => "boolean",
            CellValue::DateTime(_) => "datetime",
            CellValue::Error(_) => "error",
        }
    }
}

/// Border line styles, named as in SpreadsheetML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BorderLine {
    #[default]
    None,
    Thin,
    Medium,
    Dashed,
    Dotted,
    Thick,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderLine {
    /// Parse the `style` attribute of a `<left>`/`<right>`/... element.
    pub fn from_xml(style: &str) -> Self {
        match style {
            "thin" => BorderLine::Thin,
            "medium" => BorderLine::Medium,
            "dashed" => BorderLine::Dashed,
            "dotted" => BorderLine::Dotted,
            "thick" => BorderLine::Thick,
            "double" => BorderLine::Double,
            "hair" => BorderLine::Hair,
            "mediumDashed" => BorderLine::MediumDashed,
            "dashDot" => BorderLine::DashDot,
            "mediumDashDot" => BorderLine::MediumDashDot,
            "dashDotDot" => BorderLine::DashDotDot,
            "mediumDashDotDot" => BorderLine::MediumDashDotDot,
            "slantDashDot" => BorderLine::SlantDashDot,
            _ => BorderLine::None,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == BorderLine::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Borders {
    pub left: BorderLine,
    pub right: BorderLine,
    pub top: BorderLine,
    pub bottom: BorderLine,
}

impl Borders {
    pub fn all(line: BorderLine) -> Self {
        Self {
            left: line,
            right: line,
            top: line,
            bottom: line,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none() && self.top.is_none() && self.bottom.is_none()
    }
}

/// The part of a cell's style that survives a load/save cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CellStyle {
    pub number_format: Option<String>,
    pub borders: Borders,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        self.number_format.is_none() && self.borders.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Cell {
    pub value: CellValue,
    /// Formula without the leading `=`.
    pub formula: Option<String>,
    pub style: CellStyle,
    pub comment: Option<String>,
}

impl Cell {
    pub fn with_value(value: CellValue) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    /// A cell with nothing worth keeping.
    pub fn is_vacant(&self) -> bool {
        self.value == CellValue::Empty
            && self.formula.is_none()
            && self.style.is_default()
            && self.comment.is_none()
    }
}
