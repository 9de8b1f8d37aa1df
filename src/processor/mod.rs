//! Field processors
//!
//! One processor per mapping kind. Each resolves the cells of a field on the
//! sheet and moves values through the field's accessor, in both directions:
//!
//! - [`cell`]: a fixed address
//! - [`labelled`]: next to a label
//! - [`array`]: a run of cells
//! - [`records`]: a header line with records below (or to the right)

pub mod array;
pub mod cell;
pub mod label;
pub mod labelled;
pub mod records;

use crate::accessor::{FieldMetadata, ScalarAccess, SideChannels};
use crate::address::{CellAddress, CellRange, Direction};
use crate::config::MapperConfig;
use crate::converter::{ConvertContext, ConvertError, ConverterRegistry, FieldOptions};
use crate::error::{SheetMapError, SheetMapResult};
use crate::mapping::{FieldBinding, FieldKind, Record, SheetRecord};
use crate::validation::{ErrorKind, FieldError};
use crate::workbook::Sheet;
use tracing::{debug, warn};

/// State shared by the processors while one sheet is loaded.
pub struct LoadScope<'a> {
    pub sheet: &'a Sheet,
    pub config: &'a MapperConfig,
    pub registry: &'a ConverterRegistry,
    pub errors: Vec<FieldError>,
    pub metadata: FieldMetadata,
}

impl<'a> LoadScope<'a> {
    pub fn new(sheet: &'a Sheet, config: &'a MapperConfig, registry: &'a ConverterRegistry) -> Self {
        Self {
            sheet,
            config,
            registry,
            errors: Vec::new(),
            metadata: FieldMetadata::default(),
        }
    }

    pub fn cx(&self) -> ConvertContext<'a> {
        ConvertContext {
            registry: self.registry,
            config: self.config,
        }
    }

    /// Apply the failure mode: drop, accumulate, or abort.
    pub fn conversion_failed(
        &mut self,
        path: &str,
        address: CellAddress,
        label: Option<&str>,
        error: ConvertError,
    ) -> SheetMapResult<()> {
        match error {
            ConvertError::Formula(message) => Err(SheetMapError::formula(path, message)),
            ConvertError::TypeMismatch {
                type_name,
                observed_text,
                message,
            } => {
                let error = FieldError::new(self.sheet.name(), path, ErrorKind::Conversion, message)
                    .at(address)
                    .with_label(label.map(String::from))
                    .with_type(type_name, observed_text);
                if self.config.skip_type_bind_failure {
                    debug!("Skipped conversion failure: {}", error);
                    Ok(())
                } else if self.config.continue_type_bind_failure {
                    warn!("{}", error);
                    self.errors.push(error);
                    Ok(())
                } else {
                    Err(SheetMapError::TypeBind(error))
                }
            }
        }
    }
}

/// State shared by the processors while one sheet is written.
pub struct SaveScope<'a> {
    pub sheet: &'a mut Sheet,
    pub config: &'a MapperConfig,
    pub registry: &'a ConverterRegistry,
    pub metadata: FieldMetadata,
}

impl<'a> SaveScope<'a> {
    pub fn new(
        sheet: &'a mut Sheet,
        config: &'a MapperConfig,
        registry: &'a ConverterRegistry,
    ) -> Self {
        Self {
            sheet,
            config,
            registry,
            metadata: FieldMetadata::default(),
        }
    }

    pub fn cx(&self) -> ConvertContext<'a> {
        ConvertContext {
            registry: self.registry,
            config: self.config,
        }
    }

    pub fn sheet_name(&self) -> String {
        self.sheet.name().to_string()
    }
}

/// A save-side conversion failure is fatal for the field.
pub fn save_error(path: &str, error: ConvertError) -> SheetMapError {
    match error {
        ConvertError::Formula(message) => SheetMapError::formula(path, message),
        ConvertError::TypeMismatch { message, .. } => SheetMapError::annotation(path, message),
    }
}

/// Where a single value was found.
pub struct Located<'s> {
    /// Key inside the owning record.
    pub key: &'s str,
    /// Full path reported in outcomes and errors.
    pub path: &'s str,
    /// The mapped cell.
    pub address: CellAddress,
    /// The cell the value is read from (the top-left of a merged region).
    pub value_address: CellAddress,
    pub label: Option<&'s str>,
}

/// Report position and label to the record and the outcome.
pub fn note_location<R: Record>(
    channels: &SideChannels<R>,
    record: &mut R,
    outcome: &mut FieldMetadata,
    at: &Located<'_>,
) {
    channels.set_position(record, at.key, at.address);
    outcome.positions.insert(at.path.to_string(), at.address);
    if let Some(label) = at.label {
        channels.set_label(record, at.key, label);
        outcome.labels.insert(at.path.to_string(), label.to_string());
    }
}

/// Pick up the note attached to a loaded cell.
pub fn read_comment<R: Record>(
    channels: &SideChannels<R>,
    record: &mut R,
    sheet: &Sheet,
    outcome: &mut FieldMetadata,
    at: &Located<'_>,
) {
    if let Some(comment) = sheet.cell(at.value_address).comment.as_deref() {
        channels.set_comment(record, at.key, comment);
        outcome.comments.insert(at.path.to_string(), comment.to_string());
    }
}

/// Attach the record's comment for `at.key` to the written cell.
pub fn write_comment<R: Record>(
    channels: &SideChannels<R>,
    record: &R,
    sheet: &mut Sheet,
    outcome: &mut FieldMetadata,
    at: &Located<'_>,
) {
    if let Some(comment) = channels.comment(record, at.key) {
        sheet.set_comment(at.value_address, Some(&comment));
        outcome.comments.insert(at.path.to_string(), comment);
    }
}

/// Load one value and report its position, label and comment.
pub fn load_scalar<R: Record>(
    access: &dyn ScalarAccess<R>,
    options: &FieldOptions,
    channels: &SideChannels<R>,
    record: &mut R,
    scope: &mut LoadScope<'_>,
    at: Located<'_>,
) -> SheetMapResult<()> {
    note_location(channels, record, &mut scope.metadata, &at);
    read_comment(channels, record, scope.sheet, &mut scope.metadata, &at);
    if let Err(error) = access.load(record, scope.sheet, at.value_address, options, scope.cx()) {
        scope.conversion_failed(at.path, at.address, at.label, error)?;
    }
    Ok(())
}

/// Write one value plus its comment, and report where it went.
pub fn save_scalar<R: Record>(
    access: &dyn ScalarAccess<R>,
    options: &FieldOptions,
    channels: &SideChannels<R>,
    record: &mut R,
    scope: &mut SaveScope<'_>,
    at: Located<'_>,
) -> SheetMapResult<()> {
    let cx = scope.cx();
    access
        .save(record, scope.sheet, at.value_address, options, cx)
        .map_err(|e| save_error(at.path, e))?;
    write_comment(channels, record, scope.sheet, &mut scope.metadata, &at);
    note_location(channels, record, &mut scope.metadata, &at);
    Ok(())
}

/// Merge runs of adjacent cells along `direction` that hold the same
/// non-empty text. `cells` must be consecutive along `direction`.
pub fn merge_equal_runs(sheet: &mut Sheet, direction: Direction, cells: &[(CellAddress, Option<String>)]) {
    let mut start = 0;
    while start < cells.len() {
        let mut end = start;
        while end + 1 < cells.len()
            && cells[start].1.as_deref().is_some_and(|t| !t.is_empty())
            && cells[end + 1].1 == cells[start].1
            && cells[end].0.step(direction, 1) == Some(cells[end + 1].0)
        {
            end += 1;
        }
        if end > start {
            let region = CellRange::new(cells[start].0, cells[end].0);
            debug!("Merging equal values into {}", region);
            for (address, _) in &cells[start + 1..=end] {
                sheet.clear(*address);
            }
            sheet.add_merged_region(region);
        }
        start = end + 1;
    }
}

pub fn load_field<R: SheetRecord>(
    binding: &FieldBinding<R>,
    record: &mut R,
    scope: &mut LoadScope<'_>,
) -> SheetMapResult<()> {
    match binding.kind() {
        FieldKind::Cell(mapping, access) => cell::load(binding, mapping, access.as_ref(), record, scope),
        FieldKind::LabelledCell(mapping, access) => {
            labelled::load(binding, mapping, access.as_ref(), record, scope)
        }
        FieldKind::Array(mapping, access) => array::load(binding, mapping, access.as_ref(), record, scope),
        FieldKind::Records(mapping, access) => access.load(record, binding, mapping, scope),
    }
}

pub fn save_field<R: SheetRecord>(
    binding: &FieldBinding<R>,
    record: &mut R,
    scope: &mut SaveScope<'_>,
) -> SheetMapResult<()> {
    match binding.kind() {
        FieldKind::Cell(mapping, access) => cell::save(binding, mapping, access.as_ref(), record, scope),
        FieldKind::LabelledCell(mapping, access) => {
            labelled::save(binding, mapping, access.as_ref(), record, scope)
        }
        FieldKind::Array(mapping, access) => array::save(binding, mapping, access.as_ref(), record, scope),
        FieldKind::Records(mapping, access) => access.save(record, binding, mapping, scope),
    }
}
