//! Cell addresses, directions and ranges
//!
//! Addresses are zero-based `(row, column)` internally and `A1`-style on the
//! outside. Column letters are base-26 without a zero digit (`A`..`Z`, `AA`..).

use crate::error::{SheetMapError, SheetMapResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Last column Excel accepts (`XFD`).
pub const MAX_COLUMN: u32 = 16_383;
/// Last row Excel accepts (row 1048576).
pub const MAX_ROW: u32 = 1_048_575;

/// A zero-based cell address.
///
/// Ordering is row-major, which is also the label scan order:
/// top-to-bottom, then left-to-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellAddress {
    row: u32,
    column: u32,
}

/// Graphical point view of an address: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl CellAddress {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Build from signed `(row, column)` values, rejecting negatives.
    pub fn from_row_column(row: i64, column: i64) -> SheetMapResult<Self> {
        if row < 0 || column < 0 || row > MAX_ROW as i64 || column > MAX_COLUMN as i64 {
            return Err(SheetMapError::BadAddress(format!("({}, {})", row, column)));
        }
        Ok(Self::new(row as u32, column as u32))
    }

    /// Build from a graphical `(x, y)` pair, i.e. `(column, row)`.
    pub fn from_point(x: i64, y: i64) -> SheetMapResult<Self> {
        Self::from_row_column(y, x)
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// 1-based row number as shown by Excel.
    pub fn row_number(&self) -> u32 {
        self.row + 1
    }

    /// 1-based column number.
    pub fn column_number(&self) -> u32 {
        self.column + 1
    }

    pub fn column_alpha(&self) -> String {
        column_to_letters(self.column)
    }

    pub fn to_point(&self) -> Point {
        Point {
            x: self.column,
            y: self.row,
        }
    }

    /// `(row, column)` as the xlsx writer expects it.
    pub fn to_xlsx(&self) -> (u32, u16) {
        (self.row, self.column.min(MAX_COLUMN) as u16)
    }

    /// Move by a signed offset. `None` when the result leaves the sheet.
    pub fn offset(&self, rows: i64, columns: i64) -> Option<Self> {
        Self::from_row_column(self.row as i64 + rows, self.column as i64 + columns).ok()
    }

    /// Step `count` cells along `direction`.
    pub fn step(&self, direction: Direction, count: u32) -> Option<Self> {
        match direction {
            Direction::Horizontal => self.offset(0, count as i64),
            Direction::Vertical => self.offset(count as i64, 0),
        }
    }
}

impl From<Point> for CellAddress {
    fn from(point: Point) -> Self {
        CellAddress::new(point.y, point.x)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.column), self.row + 1)
    }
}

impl FromStr for CellAddress {
    type Err = SheetMapError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bad = || SheetMapError::BadAddress(text.to_string());
        let trimmed = text.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_alphabetic())
            .ok_or_else(bad)?;
        let (letters, digits) = trimmed.split_at(split);
        if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(bad());
        }
        let column = letters_to_column(letters).ok_or_else(bad)?;
        let row: u32 = digits.parse().map_err(|_| bad())?;
        if row == 0 || row - 1 > MAX_ROW {
            return Err(bad());
        }
        Ok(CellAddress::new(row - 1, column))
    }
}

impl From<CellAddress> for String {
    fn from(address: CellAddress) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for CellAddress {
    type Error = SheetMapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Convert a zero-based column index to letters (0 → A, 26 → AA).
pub fn column_to_letters(column: u32) -> String {
    let mut result = String::new();
    let mut n = column + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        result.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    result
}

/// Convert column letters (case-insensitive) to a zero-based index.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let column = index - 1;
    (column <= MAX_COLUMN).then_some(column)
}

/// Orientation of arrays and record tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Horizontal,
    Vertical,
}

impl Direction {
    pub fn rotate(self) -> Self {
        match self {
            Direction::Horizontal => Direction::Vertical,
            Direction::Vertical => Direction::Horizontal,
        }
    }
}

/// Inclusive rectangle of cells, normalised so `first` is top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub first: CellAddress,
    pub last: CellAddress,
}

impl CellRange {
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            first: CellAddress::new(a.row.min(b.row), a.column.min(b.column)),
            last: CellAddress::new(a.row.max(b.row), a.column.max(b.column)),
        }
    }

    pub fn single(address: CellAddress) -> Self {
        Self::new(address, address)
    }

    pub fn contains(&self, address: CellAddress) -> bool {
        (self.first.row..=self.last.row).contains(&address.row)
            && (self.first.column..=self.last.column).contains(&address.column)
    }

    pub fn intersects(&self, other: &CellRange) -> bool {
        self.first.row <= other.last.row
            && other.first.row <= self.last.row
            && self.first.column <= other.last.column
            && other.first.column <= self.last.column
    }

    pub fn height(&self) -> u32 {
        self.last.row - self.first.row + 1
    }

    pub fn width(&self) -> u32 {
        self.last.column - self.first.column + 1
    }

    pub fn is_single(&self) -> bool {
        self.first == self.last
    }

    /// Number of cells the range spans along `direction`.
    pub fn span(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Horizontal => self.width(),
            Direction::Vertical => self.height(),
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

impl FromStr for CellRange {
    type Err = SheetMapError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.split_once(':') {
            Some((a, b)) => Ok(CellRange::new(a.parse()?, b.parse()?)),
            None => Ok(CellRange::single(text.parse()?)),
        }
    }
}
