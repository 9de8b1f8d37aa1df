//! Mapping model
//!
//! A record type describes where its fields live by returning a list of
//! [`FieldBinding`]s: a mapping descriptor (where) plus accessors (what).
//! Rows of a record table do the same with [`ColumnBinding`]s.
//!
//! ```
//! use royalbit_sheetmap::mapping::*;
//!
//! #[derive(Default)]
//! struct Sample {
//!     message: Option<String>,
//! }
//!
//! impl Record for Sample {}
//!
//! impl SheetRecord for Sample {
//!     fn sheet() -> SheetSelector {
//!         SheetSelector::name("Sheet1")
//!     }
//!
//!     fn fields() -> Vec<FieldBinding<Self>> {
//!         vec![FieldBinding::cell(
//!             "message",
//!             CellMapping::at("B4"),
//!             |r: &Sample| r.message.clone(),
//!             |r: &mut Sample, v| r.message = v,
//!         )]
//!     }
//! }
//! ```

use crate::accessor::{
    ArrayAccess, ArrayField, FieldMetadata, MapAccess, MapField, ScalarAccess, ScalarField,
    SideChannels,
};
use crate::address::{CellAddress, Direction};
use crate::converter::{CellConvert, FieldOptions};
use crate::error::{SheetMapError, SheetMapResult};
use crate::processor::records::{RecordsAccess, RecordsField};
use std::collections::BTreeMap;
use std::fmt;

/// Anything the mapper fills: sheet records and table rows.
pub trait Record: Default + 'static {
    /// Side-channel maps kept by the record itself, if any.
    fn metadata(&self) -> Option<&FieldMetadata> {
        None
    }

    /// Returning `Some` routes positions, labels and comments into the map.
    fn metadata_mut(&mut self) -> Option<&mut FieldMetadata> {
        None
    }
}

/// A record bound to one sheet.
pub trait SheetRecord: Record {
    fn sheet() -> SheetSelector;

    fn fields() -> Vec<FieldBinding<Self>>;

    /// Name of the sheet this record was read from or should be written to.
    fn sheet_name(&self) -> Option<&str> {
        None
    }

    fn set_sheet_name(&mut self, _name: &str) {}

    fn pre_load(&mut self) {}

    fn post_load(&mut self) {}

    fn pre_save(&mut self) {}

    fn post_save(&mut self) {}
}

/// One row (or column) of a record table.
pub trait RowRecord: Record {
    fn columns() -> Vec<ColumnBinding<Self>>;

    fn post_load(&mut self) {}

    fn pre_save(&mut self) {}
}

/// How a record finds its sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Name(String),
    Index(usize),
    /// Whole-name match.
    Regex(String),
}

impl SheetSelector {
    pub fn name(name: impl Into<String>) -> Self {
        SheetSelector::Name(name.into())
    }

    pub fn index(index: usize) -> Self {
        SheetSelector::Index(index)
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        SheetSelector::Regex(pattern.into())
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::Name(name) => write!(f, "'{}'", name),
            SheetSelector::Index(index) => write!(f, "#{}", index),
            SheetSelector::Regex(pattern) => write!(f, "/{}/", pattern),
        }
    }
}

/// A fixed cell, by `A1` address or by zero-based row and column.
#[derive(Debug, Clone, PartialEq)]
pub struct CellMapping {
    pub address: Option<String>,
    pub row: i64,
    pub column: i64,
}

impl CellMapping {
    pub fn at(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            row: -1,
            column: -1,
        }
    }

    pub fn row_column(row: i64, column: i64) -> Self {
        Self {
            address: None,
            row,
            column,
        }
    }

    /// The address text wins when present and non-empty.
    pub fn resolve(&self, field: &str) -> SheetMapResult<CellAddress> {
        match self.address.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text
                .parse()
                .map_err(|_| SheetMapError::annotation(field, format!("invalid address '{}'", text))),
            _ => CellAddress::from_row_column(self.row, self.column).map_err(|_| {
                SheetMapError::annotation(
                    field,
                    format!("invalid position (row={}, column={})", self.row, self.column),
                )
            }),
        }
    }
}

/// Where the value sits relative to its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelPosition {
    Left,
    #[default]
    Right,
    Up,
    Down,
}

/// A value found next to a label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledCellMapping {
    pub label: Option<String>,
    /// Fixed label cell instead of a search.
    pub label_address: Option<String>,
    pub position: LabelPosition,
    /// Cells skipped between the label and the value.
    pub skip: u32,
    /// Cells scanned for the first non-blank value.
    pub range: u32,
    /// Only labels after this heading are considered.
    pub header_label: Option<String>,
    /// Step over the whole merged label cell.
    pub label_merged: bool,
    pub optional: bool,
}

impl LabelledCellMapping {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            label_address: None,
            position: LabelPosition::Right,
            skip: 0,
            range: 1,
            header_label: None,
            label_merged: true,
            optional: false,
        }
    }

    pub fn at_label_address(address: impl Into<String>) -> Self {
        Self {
            label: None,
            label_address: Some(address.into()),
            ..Self::new("")
        }
    }

    pub fn position(mut self, position: LabelPosition) -> Self {
        self.position = position;
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    pub fn range(mut self, range: u32) -> Self {
        self.range = range;
        self
    }

    pub fn header_label(mut self, label: impl Into<String>) -> Self {
        self.header_label = Some(label.into());
        self
    }

    pub fn label_merged(mut self, value: bool) -> Self {
        self.label_merged = value;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayOver {
    /// Write what fits and drop the rest.
    #[default]
    Break,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayRemained {
    /// Leave unused cells as they are.
    #[default]
    None,
    Clear,
}

/// A run of cells bound to a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayMapping {
    pub anchor: CellMapping,
    pub size: i64,
    pub direction: Direction,
    /// One element per merged region instead of per cell.
    pub item_merged: bool,
    pub over: ArrayOver,
    pub remained: ArrayRemained,
}

impl ArrayMapping {
    pub fn new(address: impl Into<String>, size: i64) -> Self {
        Self::with_anchor(CellMapping::at(address), size)
    }

    pub fn with_anchor(anchor: CellMapping, size: i64) -> Self {
        Self {
            anchor,
            size,
            direction: Direction::Horizontal,
            item_merged: false,
            over: ArrayOver::Break,
            remained: ArrayRemained::None,
        }
    }

    pub fn vertical(mut self) -> Self {
        self.direction = Direction::Vertical;
        self
    }

    pub fn item_merged(mut self) -> Self {
        self.item_merged = true;
        self
    }

    pub fn on_over(mut self, over: ArrayOver) -> Self {
        self.over = over;
        self
    }

    pub fn on_remained(mut self, remained: ArrayRemained) -> Self {
        self.remained = remained;
        self
    }
}

/// How the end of a record table is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordTerminal {
    /// A line whose mapped cells are all blank.
    #[default]
    Empty,
    /// The first column (or row) loses its outer border.
    Border,
    /// Exactly `range` records.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOver {
    #[default]
    Break,
    /// Copy the last line's style over the following lines.
    Copy,
    /// Insert new lines, shifting what follows.
    Insert,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordRemained {
    #[default]
    None,
    Clear,
    Delete,
}

/// A table with a header line and one record per following line.
///
/// `Horizontal` tables have headers along a row and records below it;
/// `Vertical` tables have headers down a column and records to the right.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordsMapping {
    pub direction: Direction,
    pub table_label: Option<String>,
    /// Distance from the table label to the header line.
    pub table_label_offset: u32,
    pub header_address: Option<String>,
    pub terminal: RecordTerminal,
    /// Record count for [`RecordTerminal::Count`].
    pub range: u32,
    /// Maximum header cells read; 0 for no limit.
    pub header_limit: u32,
    /// Blank header cells tolerated before the header line ends.
    pub header_blank_limit: u32,
    /// A cell with this text ends the table.
    pub terminate_label: Option<String>,
    pub ignore_empty_record: bool,
    pub optional: bool,
    pub over: RecordOver,
    pub remained: RecordRemained,
}

impl RecordsMapping {
    pub fn horizontal() -> Self {
        Self {
            direction: Direction::Horizontal,
            table_label: None,
            table_label_offset: 1,
            header_address: None,
            terminal: RecordTerminal::Empty,
            range: 1,
            header_limit: 0,
            header_blank_limit: 1,
            terminate_label: None,
            ignore_empty_record: false,
            optional: false,
            over: RecordOver::Break,
            remained: RecordRemained::None,
        }
    }

    pub fn vertical() -> Self {
        Self {
            direction: Direction::Vertical,
            ..Self::horizontal()
        }
    }

    pub fn table_label(mut self, label: impl Into<String>) -> Self {
        self.table_label = Some(label.into());
        self
    }

    pub fn table_label_offset(mut self, offset: u32) -> Self {
        self.table_label_offset = offset;
        self
    }

    pub fn header_address(mut self, address: impl Into<String>) -> Self {
        self.header_address = Some(address.into());
        self
    }

    pub fn terminal(mut self, terminal: RecordTerminal) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn count(mut self, range: u32) -> Self {
        self.terminal = RecordTerminal::Count;
        self.range = range;
        self
    }

    pub fn header_limit(mut self, limit: u32) -> Self {
        self.header_limit = limit;
        self
    }

    pub fn header_blank_limit(mut self, limit: u32) -> Self {
        self.header_blank_limit = limit;
        self
    }

    pub fn terminate_label(mut self, label: impl Into<String>) -> Self {
        self.terminate_label = Some(label.into());
        self
    }

    pub fn ignore_empty_record(mut self) -> Self {
        self.ignore_empty_record = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn on_over(mut self, over: RecordOver) -> Self {
        self.over = over;
        self
    }

    pub fn on_remained(mut self, remained: RecordRemained) -> Self {
        self.remained = remained;
        self
    }
}

/// A record field under one header.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub column_name: String,
    /// Offset inside a merged header spanning several columns.
    pub header_merged: u32,
    /// Blank cells take the value of the merged region (or line) above.
    pub merged: bool,
    pub optional: bool,
}

impl ColumnMapping {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            header_merged: 0,
            merged: false,
            optional: false,
        }
    }

    pub fn header_merged(mut self, offset: u32) -> Self {
        self.header_merged = offset;
        self
    }

    pub fn merged(mut self) -> Self {
        self.merged = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Every header after `previous_column_name` (up to `next_column_name`),
/// keyed by header text.
#[derive(Debug, Clone, PartialEq)]
pub struct MapColumnsMapping {
    pub previous_column_name: String,
    pub next_column_name: Option<String>,
    pub optional: bool,
}

impl MapColumnsMapping {
    pub fn after(previous_column_name: impl Into<String>) -> Self {
        Self {
            previous_column_name: previous_column_name.into(),
            next_column_name: None,
            optional: false,
        }
    }

    pub fn before(mut self, next_column_name: impl Into<String>) -> Self {
        self.next_column_name = Some(next_column_name.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A list spread over several columns of a record.
///
/// Either `size` cells starting under `column_name`, or, with
/// `next_column_name`, every cell strictly between the two headers.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayColumnsMapping {
    pub column_name: String,
    pub size: u32,
    pub next_column_name: Option<String>,
    pub item_merged: bool,
    pub optional: bool,
}

impl ArrayColumnsMapping {
    pub fn new(column_name: impl Into<String>, size: u32) -> Self {
        Self {
            column_name: column_name.into(),
            size,
            next_column_name: None,
            item_merged: false,
            optional: false,
        }
    }

    pub fn between(previous_column_name: impl Into<String>, next_column_name: impl Into<String>) -> Self {
        Self {
            next_column_name: Some(next_column_name.into()),
            ..Self::new(previous_column_name, 0)
        }
    }

    pub fn item_merged(mut self) -> Self {
        self.item_merged = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

pub enum FieldKind<R> {
    Cell(CellMapping, Box<dyn ScalarAccess<R>>),
    LabelledCell(LabelledCellMapping, Box<dyn ScalarAccess<R>>),
    Array(ArrayMapping, Box<dyn ArrayAccess<R>>),
    Records(RecordsMapping, Box<dyn RecordsAccess<R>>),
}

/// One mapped field of a sheet record.
pub struct FieldBinding<R> {
    name: String,
    options: FieldOptions,
    kind: FieldKind<R>,
    channels: SideChannels<R>,
}

impl<R: Record> FieldBinding<R> {
    fn new(name: &str, kind: FieldKind<R>) -> Self {
        Self {
            name: name.to_string(),
            options: FieldOptions::default(),
            kind,
            channels: SideChannels::default(),
        }
    }

    pub fn cell<T, G, S>(name: &str, mapping: CellMapping, get: G, set: S) -> Self
    where
        T: CellConvert,
        G: Fn(&R) -> Option<T> + Send + Sync + 'static,
        S: Fn(&mut R, Option<T>) + Send + Sync + 'static,
    {
        Self::new(name, FieldKind::Cell(mapping, Box::new(ScalarField::new(get, set))))
    }

    pub fn labelled_cell<T, G, S>(name: &str, mapping: LabelledCellMapping, get: G, set: S) -> Self
    where
        T: CellConvert,
        G: Fn(&R) -> Option<T> + Send + Sync + 'static,
        S: Fn(&mut R, Option<T>) + Send + Sync + 'static,
    {
        Self::new(
            name,
            FieldKind::LabelledCell(mapping, Box::new(ScalarField::new(get, set))),
        )
    }

    pub fn array<T, G, S>(name: &str, mapping: ArrayMapping, get: G, set: S) -> Self
    where
        T: CellConvert,
        G: Fn(&R) -> Vec<Option<T>> + Send + Sync + 'static,
        S: Fn(&mut R, Vec<Option<T>>) + Send + Sync + 'static,
    {
        Self::new(name, FieldKind::Array(mapping, Box::new(ArrayField::new(get, set))))
    }

    pub fn records<W, F>(name: &str, mapping: RecordsMapping, rows: F) -> Self
    where
        W: RowRecord,
        F: Fn(&mut R) -> &mut Vec<W> + Send + Sync + 'static,
    {
        Self::new(name, FieldKind::Records(mapping, Box::new(RecordsField::new(rows))))
    }

    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }

    pub fn on_position(mut self, setter: impl Fn(&mut R, &str, CellAddress) + Send + Sync + 'static) -> Self {
        self.channels.on_position(setter);
        self
    }

    pub fn on_label(mut self, setter: impl Fn(&mut R, &str, &str) + Send + Sync + 'static) -> Self {
        self.channels.on_label(setter);
        self
    }

    pub fn on_comment(mut self, setter: impl Fn(&mut R, &str, &str) + Send + Sync + 'static) -> Self {
        self.channels.on_comment(setter);
        self
    }

    pub fn comment_source(
        mut self,
        getter: impl Fn(&R, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.channels.comment_source(getter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    pub fn kind(&self) -> &FieldKind<R> {
        &self.kind
    }

    pub fn channels(&self) -> &SideChannels<R> {
        &self.channels
    }
}

pub enum ColumnKind<W> {
    Column(ColumnMapping, Box<dyn ScalarAccess<W>>),
    MapColumns(MapColumnsMapping, Box<dyn MapAccess<W>>),
    ArrayColumns(ArrayColumnsMapping, Box<dyn ArrayAccess<W>>),
}

/// One mapped field of a table row.
pub struct ColumnBinding<W> {
    name: String,
    options: FieldOptions,
    kind: ColumnKind<W>,
    channels: SideChannels<W>,
}

impl<W: Record> ColumnBinding<W> {
    fn new(name: &str, kind: ColumnKind<W>) -> Self {
        Self {
            name: name.to_string(),
            options: FieldOptions::default(),
            kind,
            channels: SideChannels::default(),
        }
    }

    pub fn column<T, G, S>(name: &str, mapping: ColumnMapping, get: G, set: S) -> Self
    where
        T: CellConvert,
        G: Fn(&W) -> Option<T> + Send + Sync + 'static,
        S: Fn(&mut W, Option<T>) + Send + Sync + 'static,
    {
        Self::new(name, ColumnKind::Column(mapping, Box::new(ScalarField::new(get, set))))
    }

    pub fn map_columns<T, G, S>(name: &str, mapping: MapColumnsMapping, get: G, set: S) -> Self
    where
        T: CellConvert,
        G: Fn(&W) -> BTreeMap<String, Option<T>> + Send + Sync + 'static,
        S: Fn(&mut W, BTreeMap<String, Option<T>>) + Send + Sync + 'static,
    {
        Self::new(name, ColumnKind::MapColumns(mapping, Box::new(MapField::new(get, set))))
    }

    pub fn array_columns<T, G, S>(name: &str, mapping: ArrayColumnsMapping, get: G, set: S) -> Self
    where
        T: CellConvert,
        G: Fn(&W) -> Vec<Option<T>> + Send + Sync + 'static,
        S: Fn(&mut W, Vec<Option<T>>) + Send + Sync + 'static,
    {
        Self::new(
            name,
            ColumnKind::ArrayColumns(mapping, Box::new(ArrayField::new(get, set))),
        )
    }

    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }

    pub fn on_position(mut self, setter: impl Fn(&mut W, &str, CellAddress) + Send + Sync + 'static) -> Self {
        self.channels.on_position(setter);
        self
    }

    pub fn on_label(mut self, setter: impl Fn(&mut W, &str, &str) + Send + Sync + 'static) -> Self {
        self.channels.on_label(setter);
        self
    }

    pub fn on_comment(mut self, setter: impl Fn(&mut W, &str, &str) + Send + Sync + 'static) -> Self {
        self.channels.on_comment(setter);
        self
    }

    pub fn comment_source(
        mut self,
        getter: impl Fn(&W, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.channels.comment_source(getter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    pub fn kind(&self) -> &ColumnKind<W> {
        &self.kind
    }

    pub fn channels(&self) -> &SideChannels<W> {
        &self.channels
    }
}
