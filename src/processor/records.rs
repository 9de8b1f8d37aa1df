//! Record tables
//!
//! A header line located by a table label (or an address) names the
//! columns; every following line is one record. `Horizontal` tables read
//! headers left-to-right and records top-to-bottom, `Vertical` tables are
//! the same rotated.
//!
//! The table ends at the first line that is all blank (`Empty`), that lost
//! its outer border (`Border`), after `range` records (`Count`), at a
//! `terminate_label` cell, or past the last used line of the sheet.

use super::array::{checked_size, slots};
use super::label::{LabelFinder, LabelMatcher};
use super::{
    load_scalar, merge_equal_runs, note_location, read_comment, save_error, save_scalar,
    write_comment, LoadScope, Located, SaveScope,
};
use crate::accessor::{indexed, keyed, nested, FieldMetadata};
use crate::address::{CellAddress, Direction};
use crate::config::MapperConfig;
use crate::error::{SheetMapError, SheetMapResult};
use crate::mapping::{
    ColumnBinding, ColumnKind, FieldBinding, Record, RecordOver, RecordRemained, RecordTerminal,
    RecordsMapping, RowRecord,
};
use crate::workbook::Sheet;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// A records field of a sheet record, with the row type erased.
pub trait RecordsAccess<R>: Send + Sync {
    fn load(
        &self,
        record: &mut R,
        binding: &FieldBinding<R>,
        mapping: &RecordsMapping,
        scope: &mut LoadScope<'_>,
    ) -> SheetMapResult<()>;

    fn save(
        &self,
        record: &mut R,
        binding: &FieldBinding<R>,
        mapping: &RecordsMapping,
        scope: &mut SaveScope<'_>,
    ) -> SheetMapResult<()>;
}

/// Binds a `Vec<W>` of the sheet record to a table.
pub struct RecordsField<R, W, F> {
    rows: F,
    _marker: PhantomData<fn(&mut R) -> W>,
}

impl<R, W, F> RecordsField<R, W, F>
where
    W: RowRecord,
    F: Fn(&mut R) -> &mut Vec<W> + Send + Sync,
{
    pub fn new(rows: F) -> Self {
        Self {
            rows,
            _marker: PhantomData,
        }
    }
}

impl<R, W, F> RecordsAccess<R> for RecordsField<R, W, F>
where
    R: Record,
    W: RowRecord,
    F: Fn(&mut R) -> &mut Vec<W> + Send + Sync,
{
    fn load(
        &self,
        record: &mut R,
        binding: &FieldBinding<R>,
        mapping: &RecordsMapping,
        scope: &mut LoadScope<'_>,
    ) -> SheetMapResult<()> {
        let Some(table) = Table::locate(scope.sheet, scope.config, mapping, binding.name())? else {
            return Ok(());
        };
        let rows = load_rows::<W>(binding.name(), mapping, &table, scope)?;
        *(self.rows)(record) = rows;
        note_table(binding, record, &mut scope.metadata, &table);
        Ok(())
    }

    fn save(
        &self,
        record: &mut R,
        binding: &FieldBinding<R>,
        mapping: &RecordsMapping,
        scope: &mut SaveScope<'_>,
    ) -> SheetMapResult<()> {
        let Some(table) = Table::locate(scope.sheet, scope.config, mapping, binding.name())? else {
            return Ok(());
        };
        save_rows::<W>(binding.name(), mapping, &table, (self.rows)(record), scope)?;
        note_table(binding, record, &mut scope.metadata, &table);
        Ok(())
    }
}

fn along(direction: Direction, address: CellAddress) -> u32 {
    match direction {
        Direction::Horizontal => address.column(),
        Direction::Vertical => address.row(),
    }
}

/// One header cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub label: String,
    pub address: CellAddress,
    /// Cells the header covers along the header line.
    pub span: u32,
}

/// A located table: its label, header line and orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub label: Option<(CellAddress, String)>,
    /// First cell of the header line.
    pub start: CellAddress,
    pub headers: Vec<Header>,
    /// Direction records follow each other in.
    pub record_direction: Direction,
    /// Direction headers follow each other in.
    pub header_direction: Direction,
    /// Distance from the header line to the first record.
    pub data_offset: u32,
}

impl Table {
    /// Find the header line; `None` for a missing optional table.
    pub fn locate(
        sheet: &Sheet,
        config: &MapperConfig,
        mapping: &RecordsMapping,
        field: &str,
    ) -> SheetMapResult<Option<Self>> {
        let header_direction = mapping.direction;
        let record_direction = header_direction.rotate();

        let (label, start) = if let Some(address) =
            mapping.header_address.as_deref().filter(|a| !a.trim().is_empty())
        {
            let start = address.parse().map_err(|_| {
                SheetMapError::annotation(field, format!("invalid header address '{}'", address))
            })?;
            (None, start)
        } else if let Some(table_label) = mapping.table_label.as_deref() {
            match LabelFinder::new(sheet, config).find(table_label, field)? {
                Some(label_cell) => {
                    let start = label_cell
                        .step(record_direction, mapping.table_label_offset)
                        .ok_or_else(|| {
                            SheetMapError::cell_not_found(
                                sheet.name(),
                                field,
                                format!("no header line below table label at {}", label_cell),
                            )
                        })?;
                    (Some((label_cell, sheet.formatted_text(label_cell))), start)
                }
                None if mapping.optional => {
                    warn!(
                        "Optional table '{}' not found in '{}'",
                        table_label,
                        sheet.name()
                    );
                    return Ok(None);
                }
                None => {
                    return Err(SheetMapError::cell_not_found(
                        sheet.name(),
                        field,
                        format!("table label '{}' not found", table_label),
                    ))
                }
            }
        } else {
            return Err(SheetMapError::annotation(
                field,
                "either table_label or header_address is required",
            ));
        };

        let headers = read_headers(sheet, start, mapping);
        let data_offset = headers
            .iter()
            .filter_map(|h| sheet.merged_region(h.address))
            .map(|r| along(record_direction, r.last) + 1 - along(record_direction, start))
            .max()
            .unwrap_or(1)
            .max(1);
        debug!(
            "Table '{}' header at {} with {} column(s)",
            field,
            start,
            headers.len()
        );

        Ok(Some(Self {
            label,
            start,
            headers,
            record_direction,
            header_direction,
            data_offset,
        }))
    }

    /// The cell of record line `index` under the header cell `header`.
    pub fn cell(&self, header: CellAddress, index: usize) -> Option<CellAddress> {
        let offset = u32::try_from(index).ok()?.checked_add(self.data_offset)?;
        header.step(self.record_direction, offset)
    }
}

fn read_headers(sheet: &Sheet, start: CellAddress, mapping: &RecordsMapping) -> Vec<Header> {
    let direction = mapping.direction;
    let mut headers = Vec::new();
    let mut blanks = 0;
    let mut offset = 0;
    while mapping.header_limit == 0 || headers.len() < mapping.header_limit as usize {
        let Some(address) = start.step(direction, offset) else {
            break;
        };
        let (label, span) = match sheet.merged_region(address) {
            Some(region) => (
                sheet.formatted_text(region.first),
                along(direction, region.last) - along(direction, address) + 1,
            ),
            None => (sheet.formatted_text(address), 1),
        };
        if label.is_empty() {
            blanks += 1;
            if blanks > mapping.header_blank_limit {
                break;
            }
        } else {
            blanks = 0;
            headers.push(Header {
                label,
                address,
                span,
            });
        }
        offset += span;
    }
    headers
}

/// Where each column binding lives in the header line.
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Column {
        header: CellAddress,
        label: String,
    },
    Map {
        entries: Vec<(String, CellAddress)>,
    },
    Array {
        anchor: CellAddress,
        size: u32,
        item_merged: bool,
    },
    Missing,
}

impl Resolved {
    /// Mapped cells of record line `index`.
    fn cells(&self, table: &Table, index: usize) -> Vec<CellAddress> {
        match self {
            Resolved::Column { header, .. } => table.cell(*header, index).into_iter().collect(),
            Resolved::Map { entries } => entries
                .iter()
                .filter_map(|(_, header)| table.cell(*header, index))
                .collect(),
            Resolved::Array { anchor, size, .. } => table
                .cell(*anchor, index)
                .map(|first| {
                    (0..*size)
                        .filter_map(|i| first.step(table.header_direction, i))
                        .collect()
                })
                .unwrap_or_default(),
            Resolved::Missing => Vec::new(),
        }
    }
}

fn resolve_columns<W: Record>(
    columns: &[ColumnBinding<W>],
    table: &Table,
    sheet: &Sheet,
    config: &MapperConfig,
    field: &str,
) -> SheetMapResult<Vec<Resolved>> {
    let position = |label: &str, from: usize, path: &str| -> SheetMapResult<Option<usize>> {
        let matcher = LabelMatcher::new(label, config, path)?;
        Ok(table
            .headers
            .iter()
            .skip(from)
            .position(|h| matcher.is_match(&h.label))
            .map(|i| i + from))
    };
    let missing = |optional: bool, path: &str, label: &str| -> SheetMapResult<Resolved> {
        if optional {
            debug!("Optional column '{}' not found for '{}'", label, path);
            Ok(Resolved::Missing)
        } else {
            Err(SheetMapError::cell_not_found(
                sheet.name(),
                path,
                format!("header '{}' not found", label),
            ))
        }
    };

    columns
        .iter()
        .map(|column| {
            let path = nested(field, column.name());
            match column.kind() {
                ColumnKind::Column(mapping, _) => {
                    let Some(index) = position(&mapping.column_name, 0, &path)? else {
                        return missing(mapping.optional, &path, &mapping.column_name);
                    };
                    let header = &table.headers[index];
                    match header.address.step(table.header_direction, mapping.header_merged) {
                        Some(address) => Ok(Resolved::Column {
                            header: address,
                            label: header.label.clone(),
                        }),
                        None => missing(false, &path, &mapping.column_name),
                    }
                }
                ColumnKind::MapColumns(mapping, _) => {
                    let Some(first) = position(&mapping.previous_column_name, 0, &path)? else {
                        return missing(mapping.optional, &path, &mapping.previous_column_name);
                    };
                    let end = match &mapping.next_column_name {
                        Some(next) => match position(next, first + 1, &path)? {
                            Some(end) => end,
                            None => return missing(mapping.optional, &path, next),
                        },
                        None => table.headers.len(),
                    };
                    Ok(Resolved::Map {
                        entries: table.headers[first + 1..end]
                            .iter()
                            .map(|h| (h.label.clone(), h.address))
                            .collect(),
                    })
                }
                ColumnKind::ArrayColumns(mapping, _) => {
                    let Some(first) = position(&mapping.column_name, 0, &path)? else {
                        return missing(mapping.optional, &path, &mapping.column_name);
                    };
                    let header = &table.headers[first];
                    match &mapping.next_column_name {
                        Some(next) => {
                            let Some(end) = position(next, first + 1, &path)? else {
                                return missing(mapping.optional, &path, next);
                            };
                            let direction = table.header_direction;
                            let size = along(direction, table.headers[end].address)
                                .saturating_sub(along(direction, header.address) + header.span);
                            Ok(Resolved::Array {
                                anchor: header
                                    .address
                                    .step(direction, header.span)
                                    .unwrap_or(header.address),
                                size,
                                item_merged: mapping.item_merged,
                            })
                        }
                        None => Ok(Resolved::Array {
                            anchor: header.address,
                            size: checked_size(i64::from(mapping.size), &path)?,
                            item_merged: mapping.item_merged,
                        }),
                    }
                }
            }
        })
        .collect()
}

fn has_outer_border(sheet: &Sheet, cell: CellAddress, header_direction: Direction) -> bool {
    match header_direction {
        Direction::Horizontal => {
            !sheet.cell(cell).style.borders.left.is_none()
                || cell
                    .offset(0, -1)
                    .is_some_and(|c| !sheet.cell(c).style.borders.right.is_none())
        }
        Direction::Vertical => {
            !sheet.cell(cell).style.borders.top.is_none()
                || cell
                    .offset(-1, 0)
                    .is_some_and(|c| !sheet.cell(c).style.borders.bottom.is_none())
        }
    }
}

/// Number of record lines the sheet currently holds.
fn count_lines(
    sheet: &Sheet,
    config: &MapperConfig,
    mapping: &RecordsMapping,
    table: &Table,
    resolved: &[Resolved],
    field: &str,
) -> SheetMapResult<usize> {
    let terminator = mapping
        .terminate_label
        .as_deref()
        .map(|label| LabelMatcher::new(label, config, field))
        .transpose()?;
    let last_line = sheet
        .used_range()
        .map(|r| along(table.record_direction, r.last));

    let mut count = 0;
    loop {
        let Some(first) = table.cell(table.start, count) else {
            break;
        };
        if mapping.terminal == RecordTerminal::Count {
            if count >= mapping.range as usize {
                break;
            }
        } else if last_line.map_or(true, |last| along(table.record_direction, first) > last) {
            break;
        }

        let cells: Vec<CellAddress> = resolved.iter().flat_map(|r| r.cells(table, count)).collect();
        if let Some(terminator) = &terminator {
            let terminated = std::iter::once(first).chain(cells.iter().copied()).any(|c| {
                let text = sheet.formatted_text(c);
                !text.is_empty() && terminator.is_match(&text)
            });
            if terminated {
                debug!("Table '{}' terminated by label at line {}", field, count);
                break;
            }
        }
        match mapping.terminal {
            RecordTerminal::Border if !has_outer_border(sheet, first, table.header_direction) => break,
            RecordTerminal::Empty if cells.iter().all(|c| sheet.is_blank(*c)) => break,
            _ => {}
        }
        count += 1;
    }
    Ok(count)
}

fn note_table<R: Record>(
    binding: &FieldBinding<R>,
    record: &mut R,
    outcome: &mut FieldMetadata,
    table: &Table,
) {
    let (address, label) = match &table.label {
        Some((address, label)) => (*address, Some(label.as_str())),
        None => (table.start, None),
    };
    note_location(
        binding.channels(),
        record,
        outcome,
        &Located {
            key: binding.name(),
            path: binding.name(),
            address,
            value_address: address,
            label,
        },
    );
}

fn load_rows<W: RowRecord>(
    name: &str,
    mapping: &RecordsMapping,
    table: &Table,
    scope: &mut LoadScope<'_>,
) -> SheetMapResult<Vec<W>> {
    let columns = W::columns();
    let resolved = resolve_columns(&columns, table, scope.sheet, scope.config, name)?;
    let lines = count_lines(scope.sheet, scope.config, mapping, table, &resolved, name)?;
    debug!("Table '{}' has {} record line(s)", name, lines);

    let mut rows = Vec::with_capacity(lines);
    let mut carried: Vec<Option<CellAddress>> = vec![None; columns.len()];
    for line in 0..lines {
        if mapping.ignore_empty_record
            && resolved
                .iter()
                .flat_map(|r| r.cells(table, line))
                .all(|c| scope.sheet.is_blank(c))
        {
            debug!("Skipping empty record line {} of '{}'", line, name);
            continue;
        }
        let prefix = indexed(name, rows.len());
        let mut row = W::default();
        for ((column, resolved), carried) in columns.iter().zip(&resolved).zip(carried.iter_mut()) {
            load_column(column, resolved, table, line, &prefix, carried, &mut row, scope)?;
        }
        row.post_load();
        rows.push(row);
    }
    Ok(rows)
}

#[allow(clippy::too_many_arguments)]
fn load_column<W: RowRecord>(
    column: &ColumnBinding<W>,
    resolved: &Resolved,
    table: &Table,
    line: usize,
    prefix: &str,
    carried: &mut Option<CellAddress>,
    row: &mut W,
    scope: &mut LoadScope<'_>,
) -> SheetMapResult<()> {
    let channels = column.channels();
    match (column.kind(), resolved) {
        (ColumnKind::Column(mapping, access), Resolved::Column { header, label }) => {
            let Some(address) = table.cell(*header, line) else {
                return Ok(());
            };
            let mut value_address = address;
            if mapping.merged {
                value_address = scope.sheet.merged_value_address(address);
                match *carried {
                    Some(previous) if scope.sheet.is_blank(value_address) => value_address = previous,
                    _ => *carried = Some(value_address),
                }
            }
            let path = nested(prefix, column.name());
            load_scalar(
                access.as_ref(),
                column.options(),
                channels,
                row,
                scope,
                Located {
                    key: column.name(),
                    path: &path,
                    address,
                    value_address,
                    label: Some(label.as_str()),
                },
            )
        }
        (ColumnKind::MapColumns(_, access), Resolved::Map { entries }) => {
            let mut located = Vec::with_capacity(entries.len());
            let mut values = Vec::with_capacity(entries.len());
            for (label, header) in entries {
                let Some(address) = table.cell(*header, line) else {
                    continue;
                };
                let key = keyed(column.name(), label);
                let path = nested(prefix, &key);
                let at = Located {
                    key: &key,
                    path: &path,
                    address,
                    value_address: address,
                    label: Some(label.as_str()),
                };
                note_location(channels, row, &mut scope.metadata, &at);
                read_comment(channels, row, scope.sheet, &mut scope.metadata, &at);
                located.push((label.clone(), address));
                values.push((label.clone(), scope.sheet.merged_value_address(address)));
            }
            let failures = access.load(row, scope.sheet, &values, column.options(), scope.cx());
            for (label, error) in failures {
                let address = located
                    .iter()
                    .find(|(l, _)| *l == label)
                    .map_or(table.start, |(_, a)| *a);
                let path = nested(prefix, &keyed(column.name(), &label));
                scope.conversion_failed(&path, address, Some(label.as_str()), error)?;
            }
            Ok(())
        }
        (
            ColumnKind::ArrayColumns(_, access),
            Resolved::Array {
                anchor,
                size,
                item_merged,
            },
        ) => {
            let Some(first) = table.cell(*anchor, line) else {
                return Ok(());
            };
            let slots = slots(scope.sheet, first, *size, table.header_direction, *item_merged);
            let keys: Vec<String> = (0..slots.len()).map(|i| indexed(column.name(), i)).collect();
            let paths: Vec<String> = keys.iter().map(|k| nested(prefix, k)).collect();
            for ((slot, key), path) in slots.iter().zip(&keys).zip(&paths) {
                let at = Located {
                    key,
                    path,
                    address: slot.address,
                    value_address: slot.value_address,
                    label: None,
                };
                note_location(channels, row, &mut scope.metadata, &at);
                read_comment(channels, row, scope.sheet, &mut scope.metadata, &at);
            }
            let values: Vec<CellAddress> = slots.iter().map(|s| s.value_address).collect();
            let failures = access.load(row, scope.sheet, &values, column.options(), scope.cx());
            for (index, error) in failures {
                scope.conversion_failed(&paths[index], slots[index].address, None, error)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Make room for `wanted` records when the table holds `capacity` lines,
/// by restyling (or inserting) lines after the last one.
fn extend_lines(sheet: &mut Sheet, table: &Table, capacity: usize, wanted: usize, insert: bool) {
    let base = capacity.max(1);
    if wanted <= base {
        return;
    }
    let Some(sample) = table.cell(table.start, base - 1) else {
        return;
    };
    let direction = table.record_direction;
    let sample_line = along(direction, sample);
    let count = u32::try_from(wanted - base).unwrap_or(u32::MAX);
    if insert {
        debug!("Inserting {} line(s) after line {}", count, sample_line + 1);
        sheet.insert_lines(direction, sample_line + 1, count);
    }
    let Some(used) = sheet.used_range() else {
        return;
    };
    let span = along(table.header_direction, used.first)..=along(table.header_direction, used.last);
    for offset in 1..=count {
        let Some(target) = sample_line.checked_add(offset) else {
            break;
        };
        sheet.copy_line_style(direction, sample_line, target, span.clone());
        sheet.copy_line_merges(direction, sample_line, target);
    }
}

fn save_rows<W: RowRecord>(
    name: &str,
    mapping: &RecordsMapping,
    table: &Table,
    rows: &mut [W],
    scope: &mut SaveScope<'_>,
) -> SheetMapResult<()> {
    let columns = W::columns();
    let resolved = resolve_columns(&columns, table, scope.sheet, scope.config, name)?;
    let existing = count_lines(scope.sheet, scope.config, mapping, table, &resolved, name)?;

    let mut written = rows.len();
    if rows.len() > existing {
        match mapping.over {
            RecordOver::Copy => extend_lines(scope.sheet, table, existing, rows.len(), false),
            RecordOver::Insert => extend_lines(scope.sheet, table, existing, rows.len(), true),
            // Blank lines past the last record are free to write.
            _ if mapping.terminal == RecordTerminal::Empty => {}
            RecordOver::Break => {
                debug!(
                    "Table '{}' truncated to {} of {} record(s)",
                    name,
                    existing,
                    rows.len()
                );
                written = existing;
            }
            RecordOver::Error => {
                return Err(SheetMapError::annotation(
                    name,
                    format!(
                        "records ({}) exceed the table capacity ({})",
                        rows.len(),
                        existing
                    ),
                ))
            }
        }
    }

    for (index, row) in rows.iter_mut().enumerate().take(written) {
        row.pre_save();
        let prefix = indexed(name, index);
        for (column, resolved) in columns.iter().zip(&resolved) {
            save_column(column, resolved, table, index, &prefix, row, scope)?;
        }
    }

    if written < existing {
        match mapping.remained {
            RecordRemained::None => {}
            RecordRemained::Clear => {
                for line in written..existing {
                    for cell in resolved.iter().flat_map(|r| r.cells(table, line)) {
                        scope.sheet.clear(cell);
                    }
                }
            }
            RecordRemained::Delete => {
                if let Some(first) = table.cell(table.start, written) {
                    let count = u32::try_from(existing - written).unwrap_or(u32::MAX);
                    debug!("Deleting {} unused line(s) of '{}'", count, name);
                    scope.sheet.delete_lines(
                        table.record_direction,
                        along(table.record_direction, first),
                        count,
                    );
                }
            }
        }
    }

    if scope.config.merge_cell_on_save {
        let cx = scope.cx();
        for (column, resolved) in columns.iter().zip(&resolved) {
            if let (ColumnKind::Column(mapping, access), Resolved::Column { header, .. }) =
                (column.kind(), resolved)
            {
                if !mapping.merged {
                    continue;
                }
                let cells: Vec<(CellAddress, Option<String>)> = rows
                    .iter()
                    .take(written)
                    .enumerate()
                    .filter_map(|(i, row)| {
                        table
                            .cell(*header, i)
                            .map(|a| (a, access.text(row, column.options(), cx)))
                    })
                    .collect();
                merge_equal_runs(scope.sheet, table.record_direction, &cells);
            }
        }
    }
    Ok(())
}

fn save_column<W: RowRecord>(
    column: &ColumnBinding<W>,
    resolved: &Resolved,
    table: &Table,
    line: usize,
    prefix: &str,
    row: &mut W,
    scope: &mut SaveScope<'_>,
) -> SheetMapResult<()> {
    let channels = column.channels();
    match (column.kind(), resolved) {
        (ColumnKind::Column(_, access), Resolved::Column { header, label }) => {
            let Some(address) = table.cell(*header, line) else {
                return Ok(());
            };
            let path = nested(prefix, column.name());
            save_scalar(
                access.as_ref(),
                column.options(),
                channels,
                row,
                scope,
                Located {
                    key: column.name(),
                    path: &path,
                    address,
                    value_address: address,
                    label: Some(label.as_str()),
                },
            )
        }
        (ColumnKind::MapColumns(_, access), Resolved::Map { entries }) => {
            let located: Vec<(String, CellAddress)> = entries
                .iter()
                .filter_map(|(label, header)| table.cell(*header, line).map(|a| (label.clone(), a)))
                .collect();
            let cx = scope.cx();
            access
                .save(row, scope.sheet, &located, column.options(), cx)
                .map_err(|(label, e)| save_error(&nested(prefix, &keyed(column.name(), &label)), e))?;
            for (label, address) in &located {
                let key = keyed(column.name(), label);
                let path = nested(prefix, &key);
                let at = Located {
                    key: &key,
                    path: &path,
                    address: *address,
                    value_address: *address,
                    label: Some(label.as_str()),
                };
                write_comment(channels, row, scope.sheet, &mut scope.metadata, &at);
                note_location(channels, row, &mut scope.metadata, &at);
            }
            Ok(())
        }
        (
            ColumnKind::ArrayColumns(_, access),
            Resolved::Array {
                anchor,
                size,
                item_merged,
            },
        ) => {
            let Some(first) = table.cell(*anchor, line) else {
                return Ok(());
            };
            let slots = slots(scope.sheet, first, *size, table.header_direction, *item_merged);
            let addresses: Vec<CellAddress> = slots.iter().map(|s| s.address).collect();
            let cx = scope.cx();
            let count = access.texts(row, column.options(), cx).len().min(addresses.len());
            access
                .save(row, scope.sheet, &addresses, column.options(), cx)
                .map_err(|(index, e)| save_error(&nested(prefix, &indexed(column.name(), index)), e))?;
            for (index, address) in addresses.iter().enumerate().take(count) {
                let key = indexed(column.name(), index);
                let path = nested(prefix, &key);
                let at = Located {
                    key: &key,
                    path: &path,
                    address: *address,
                    value_address: *address,
                    label: None,
                };
                write_comment(channels, row, scope.sheet, &mut scope.metadata, &at);
                note_location(channels, row, &mut scope.metadata, &at);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{BorderLine, Borders, CellValue};

    fn addr(text: &str) -> CellAddress {
        text.parse().unwrap()
    }

    fn text(sheet: &mut Sheet, address: &str, value: &str) {
        sheet.set_value(addr(address), CellValue::Text(value.into()));
    }

    fn column(table: &Table, label: &str) -> Resolved {
        let header = table.headers.iter().find(|h| h.label == label).unwrap();
        Resolved::Column {
            header: header.address,
            label: header.label.clone(),
        }
    }

    #[test]
    fn test_headers_below_table_label() {
        let mut sheet = Sheet::new("Sheet1");
        text(&mut sheet, "A3", "名簿");
        text(&mut sheet, "A4", "ID");
        text(&mut sheet, "B4", "氏名");
        text(&mut sheet, "C4", "住所");
        sheet.add_merged_region("C4:D4".parse().unwrap());
        text(&mut sheet, "F4", "備考");
        text(&mut sheet, "I4", "stray");

        let mapping = RecordsMapping::horizontal().table_label("名簿");
        let table = Table::locate(&sheet, &MapperConfig::default(), &mapping, "rows")
            .unwrap()
            .unwrap();
        assert_eq!(table.start, addr("A4"));
        assert_eq!(table.label, Some((addr("A3"), "名簿".to_string())));
        let labels: Vec<&str> = table.headers.iter().map(|h| h.label.as_str()).collect();
        // One blank cell (E4) is tolerated, two (G4:H4) end the line
        assert_eq!(labels, vec!["ID", "氏名", "住所", "備考"]);
        assert_eq!(table.headers[2].span, 2);
        assert_eq!(table.data_offset, 1);

        let limited = mapping.clone().header_limit(2);
        let table = Table::locate(&sheet, &MapperConfig::default(), &limited, "rows")
            .unwrap()
            .unwrap();
        assert_eq!(table.headers.len(), 2);
    }

    #[test]
    fn test_missing_table() {
        let sheet = Sheet::new("Sheet1");
        let config = MapperConfig::default();
        let optional = RecordsMapping::horizontal().table_label("x").optional();
        assert!(Table::locate(&sheet, &config, &optional, "rows").unwrap().is_none());
        assert!(matches!(
            Table::locate(&sheet, &config, &RecordsMapping::horizontal().table_label("x"), "rows"),
            Err(SheetMapError::CellNotFound { .. })
        ));
        assert!(matches!(
            Table::locate(&sheet, &config, &RecordsMapping::horizontal(), "rows"),
            Err(SheetMapError::AnnotationInvalid { .. })
        ));
    }

    #[test]
    fn test_empty_and_count_terminals() {
        let mut sheet = Sheet::new("Sheet1");
        text(&mut sheet, "A1", "ID");
        text(&mut sheet, "B1", "Name");
        for (row, name) in ["a", "b", "c"].iter().enumerate() {
            sheet.set_value(CellAddress::new(row as u32 + 1, 0), CellValue::Number(row as f64 + 1.0));
            sheet.set_value(CellAddress::new(row as u32 + 1, 1), CellValue::Text(name.to_string()));
        }
        text(&mut sheet, "B6", "after the gap");

        let config = MapperConfig::default();
        let mapping = RecordsMapping::horizontal().header_address("A1");
        let table = Table::locate(&sheet, &config, &mapping, "rows").unwrap().unwrap();
        let resolved = vec![column(&table, "ID"), column(&table, "Name")];
        assert_eq!(count_lines(&sheet, &config, &mapping, &table, &resolved, "rows").unwrap(), 3);

        let counted = mapping.clone().count(2);
        assert_eq!(count_lines(&sheet, &config, &counted, &table, &resolved, "rows").unwrap(), 2);

        let terminated = mapping.terminate_label("b");
        assert_eq!(count_lines(&sheet, &config, &terminated, &table, &resolved, "rows").unwrap(), 1);
    }

    #[test]
    fn test_border_terminal() {
        let mut sheet = Sheet::new("Sheet1");
        text(&mut sheet, "B2", "ID");
        for row in 2..6 {
            sheet.set_borders(CellAddress::new(row, 1), Borders::all(BorderLine::Thin));
        }
        let config = MapperConfig::default();
        let mapping = RecordsMapping::horizontal()
            .header_address("B2")
            .terminal(RecordTerminal::Border);
        let table = Table::locate(&sheet, &config, &mapping, "rows").unwrap().unwrap();
        let resolved = vec![column(&table, "ID")];
        assert_eq!(count_lines(&sheet, &config, &mapping, &table, &resolved, "rows").unwrap(), 4);
    }

    #[test]
    fn test_vertical_table_runs_right() {
        let mut sheet = Sheet::new("Sheet1");
        text(&mut sheet, "A1", "ID");
        text(&mut sheet, "A2", "Name");
        text(&mut sheet, "B1", "1");
        text(&mut sheet, "C1", "2");
        let config = MapperConfig::default();
        let mapping = RecordsMapping::vertical().header_address("A1");
        let table = Table::locate(&sheet, &config, &mapping, "cols").unwrap().unwrap();
        assert_eq!(table.headers.len(), 2);
        assert_eq!(table.cell(addr("A2"), 1), Some(addr("C2")));
        let resolved = vec![column(&table, "ID"), column(&table, "Name")];
        assert_eq!(count_lines(&sheet, &config, &mapping, &table, &resolved, "cols").unwrap(), 2);
    }
}
