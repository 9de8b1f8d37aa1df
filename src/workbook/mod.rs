//! In-memory workbook model
//!
//! The mapping engine reads and writes this model only. [`reader`] fills it
//! from a file (calamine for values and formulas, the xlsx layout pass for
//! merges, borders, formats and comments) and [`writer`] re-emits it with
//! rust_xlsxwriter.

pub mod cell;
pub mod display;
pub mod formula;
pub mod layout;
pub mod reader;
pub mod writer;

pub use cell::{BorderLine, Borders, Cell, CellStyle, CellValue};

use crate::address::{CellAddress, CellRange, Direction};
use crate::error::{SheetMapError, SheetMapResult};
use std::collections::BTreeMap;
use std::path::Path;

static EMPTY_CELL: Cell = Cell {
    value: CellValue::Empty,
    formula: None,
    style: CellStyle {
        number_format: None,
        borders: Borders {
            left: BorderLine::None,
            right: BorderLine::None,
            top: BorderLine::None,
            bottom: BorderLine::None,
        },
    },
    comment: None,
};

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    date1904: bool,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open any format calamine understands; xlsx also gets its layout.
    pub fn open<P: AsRef<Path>>(path: P) -> SheetMapResult<Self> {
        reader::read_path(path.as_ref())
    }

    pub fn from_bytes(bytes: &[u8]) -> SheetMapResult<Self> {
        reader::read_bytes(bytes)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> SheetMapResult<()> {
        let buffer = writer::write_to_buffer(self)?;
        std::fs::write(path, buffer)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> SheetMapResult<Vec<u8>> {
        writer::write_to_buffer(self)
    }

    pub fn date1904(&self) -> bool {
        self.date1904
    }

    pub fn set_date1904(&mut self, value: bool) {
        self.date1904 = value;
        for sheet in &mut self.sheets {
            sheet.date1904 = value;
        }
    }

    /// Append a sheet; an existing sheet with the same name is returned as is.
    pub fn add_sheet(&mut self, name: &str) -> &mut Sheet {
        let index = match self.sheet_index(name) {
            Some(index) => index,
            None => {
                let mut sheet = Sheet::new(name);
                sheet.date1904 = self.date1904;
                self.sheets.push(sheet);
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_at_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    /// Fill missing cached results of formula cells.
    pub fn recalculate(&mut self) {
        for sheet in &mut self.sheets {
            formula::recalculate_sheet(sheet);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<CellAddress, Cell>,
    merged: Vec<CellRange>,
    date1904: bool,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date1904(&self) -> bool {
        self.date1904
    }

    /// The cell at `address`, or a shared empty cell.
    pub fn cell(&self, address: CellAddress) -> &Cell {
        self.cells.get(&address).unwrap_or(&EMPTY_CELL)
    }

    pub fn cell_mut(&mut self, address: CellAddress) -> &mut Cell {
        self.cells.entry(address).or_default()
    }

    /// Stored cells in scan order (top-to-bottom, then left-to-right).
    pub fn cells(&self) -> impl Iterator<Item = (&CellAddress, &Cell)> {
        self.cells.iter()
    }

    pub fn value(&self, address: CellAddress) -> &CellValue {
        &self.cell(address).value
    }

    pub fn formatted_text(&self, address: CellAddress) -> String {
        display::formatted_text(self.cell(address), self.date1904)
    }

    pub fn is_blank(&self, address: CellAddress) -> bool {
        self.formatted_text(address).is_empty()
    }

    /// Set a literal value, dropping any formula.
    pub fn set_value(&mut self, address: CellAddress, value: CellValue) {
        let cell = self.cell_mut(address);
        cell.value = value;
        cell.formula = None;
    }

    /// Set a formula; the cached result is filled on recalculation.
    pub fn set_formula(&mut self, address: CellAddress, formula: &str) {
        let cell = self.cell_mut(address);
        cell.formula = Some(formula.trim_start_matches('=').to_string());
        cell.value = CellValue::Empty;
    }

    pub fn set_number_format(&mut self, address: CellAddress, format: Option<&str>) {
        self.cell_mut(address).style.number_format = format.map(String::from);
    }

    pub fn set_borders(&mut self, address: CellAddress, borders: Borders) {
        self.cell_mut(address).style.borders = borders;
    }

    pub fn set_comment(&mut self, address: CellAddress, comment: Option<&str>) {
        self.cell_mut(address).comment = comment.map(String::from);
    }

    /// Blank the value and formula; style and comment stay.
    pub fn clear(&mut self, address: CellAddress) {
        if let Some(cell) = self.cells.get_mut(&address) {
            cell.value = CellValue::Empty;
            cell.formula = None;
        }
    }

    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged
    }

    pub fn merged_region(&self, address: CellAddress) -> Option<&CellRange> {
        self.merged.iter().find(|r| r.contains(address))
    }

    /// Register a merged region, replacing any region it overlaps.
    pub fn add_merged_region(&mut self, range: CellRange) {
        if range.is_single() {
            return;
        }
        self.merged.retain(|r| !r.intersects(&range));
        self.merged.push(range);
    }

    pub fn remove_merged_region(&mut self, range: &CellRange) {
        self.merged.retain(|r| r != range);
    }

    /// Value seen at `address`, taken from the top-left cell of its merged
    /// region when it has one.
    pub fn merged_value_address(&self, address: CellAddress) -> CellAddress {
        self.merged_region(address)
            .map(|r| r.first)
            .unwrap_or(address)
    }

    /// Bounding box of stored, non-vacant cells.
    pub fn used_range(&self) -> Option<CellRange> {
        let mut occupied = self.cells.iter().filter(|(_, c)| !c.is_vacant()).map(|(a, _)| *a);
        let first = occupied.next()?;
        let (mut top, mut left, mut bottom, mut right) =
            (first.row(), first.column(), first.row(), first.column());
        for address in occupied {
            top = top.min(address.row());
            left = left.min(address.column());
            bottom = bottom.max(address.row());
            right = right.max(address.column());
        }
        Some(CellRange::new(
            CellAddress::new(top, left),
            CellAddress::new(bottom, right),
        ))
    }

    /// Insert `count` empty lines before `at`, shifting cells and merged
    /// regions. `Vertical` inserts rows, `Horizontal` inserts columns.
    /// Formula references are not rewritten.
    pub fn insert_lines(&mut self, direction: Direction, at: u32, count: u32) {
        if count == 0 {
            return;
        }
        let shift = |a: CellAddress| -> CellAddress {
            match direction {
                Direction::Vertical if a.row() >= at => CellAddress::new(a.row() + count, a.column()),
                Direction::Horizontal if a.column() >= at => {
                    CellAddress::new(a.row(), a.column() + count)
                }
                _ => a,
            }
        };
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells.into_iter().map(|(a, c)| (shift(a), c)).collect();
        for range in &mut self.merged {
            *range = CellRange::new(shift(range.first), shift(range.last));
        }
    }

    /// Remove `count` lines starting at `at`, shifting the rest back.
    pub fn delete_lines(&mut self, direction: Direction, at: u32, count: u32) {
        if count == 0 {
            return;
        }
        let coordinate = |a: &CellAddress| match direction {
            Direction::Vertical => a.row(),
            Direction::Horizontal => a.column(),
        };
        let shift = |a: CellAddress| -> CellAddress {
            match direction {
                Direction::Vertical if a.row() >= at + count => {
                    CellAddress::new(a.row() - count, a.column())
                }
                Direction::Horizontal if a.column() >= at + count => {
                    CellAddress::new(a.row(), a.column() - count)
                }
                _ => a,
            }
        };
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .filter(|(a, _)| !(at..at + count).contains(&coordinate(a)))
            .map(|(a, c)| (shift(a), c))
            .collect();
        self.merged.retain(|r| {
            let (lo, hi) = (coordinate(&r.first), coordinate(&r.last));
            hi < at || lo >= at + count
        });
        for range in &mut self.merged {
            *range = CellRange::new(shift(range.first), shift(range.last));
        }
    }

    /// Copy the styles of line `from` onto line `to` for the given span of
    /// perpendicular coordinates.
    pub fn copy_line_style(
        &mut self,
        direction: Direction,
        from: u32,
        to: u32,
        span: std::ops::RangeInclusive<u32>,
    ) {
        for other in span {
            let (source, target) = match direction {
                Direction::Vertical => (CellAddress::new(from, other), CellAddress::new(to, other)),
                Direction::Horizontal => {
                    (CellAddress::new(other, from), CellAddress::new(other, to))
                }
            };
            let style = self.cell(source).style.clone();
            if style.is_default() && !self.cells.contains_key(&target) {
                continue;
            }
            self.cell_mut(target).style = style;
        }
    }

    /// Merged regions lying entirely on line `from`, translated onto `to`.
    pub fn copy_line_merges(&mut self, direction: Direction, from: u32, to: u32) {
        let copies: Vec<CellRange> = self
            .merged
            .iter()
            .filter(|r| match direction {
                Direction::Vertical => r.first.row() == from && r.last.row() == from,
                Direction::Horizontal => r.first.column() == from && r.last.column() == from,
            })
            .map(|r| match direction {
                Direction::Vertical => CellRange::new(
                    CellAddress::new(to, r.first.column()),
                    CellAddress::new(to, r.last.column()),
                ),
                Direction::Horizontal => CellRange::new(
                    CellAddress::new(r.first.row(), to),
                    CellAddress::new(r.last.row(), to),
                ),
            })
            .collect();
        for range in copies {
            self.add_merged_region(range);
        }
    }
}

/// Resolve a sheet by name, failing with `SheetNotFound`.
pub fn require_sheet<'a>(workbook: &'a Workbook, name: &str) -> SheetMapResult<&'a Sheet> {
    workbook
        .sheet(name)
        .ok_or_else(|| SheetMapError::SheetNotFound(name.to_string()))
}
