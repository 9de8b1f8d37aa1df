//! Workbook reader (calamine + xlsx layout)

use super::cell::{Cell, CellValue};
use super::display::serial_to_datetime;
use super::layout::{read_layout, WorkbookLayout};
use super::Workbook;
use crate::address::CellAddress;
use crate::error::SheetMapResult;
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;

pub fn read_path(path: &Path) -> SheetMapResult<Workbook> {
    let layout = if is_zip_file(path)? {
        read_layout(BufReader::new(File::open(path)?))?
    } else {
        None
    };
    let mut sheets = open_workbook_auto(path)?;
    debug!("Opened workbook {}", path.display());
    build(&mut sheets, layout)
}

pub fn read_bytes(bytes: &[u8]) -> SheetMapResult<Workbook> {
    let layout = if bytes.starts_with(b"PK") {
        read_layout(Cursor::new(bytes))?
    } else {
        None
    };
    let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    build(&mut sheets, layout)
}

fn is_zip_file(path: &Path) -> SheetMapResult<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    Ok(file.read(&mut magic)? == 2 && &magic == b"PK")
}

fn build<RS: Read + Seek>(
    sheets: &mut Sheets<RS>,
    layout: Option<WorkbookLayout>,
) -> SheetMapResult<Workbook> {
    let mut layout = layout.unwrap_or_default();
    let mut workbook = Workbook::new();
    workbook.set_date1904(layout.date1904);

    for name in sheets.sheet_names() {
        let values = sheets.worksheet_range(&name)?;
        let formulas = sheets.worksheet_formula(&name).ok();
        let date1904 = layout.date1904;
        let sheet = workbook.add_sheet(&name);

        if let Some((top, left)) = values.start() {
            for (row, column, data) in values.used_cells() {
                let address = CellAddress::new(top + row as u32, left + column as u32);
                let value = to_cell_value(data, date1904);
                if value != CellValue::Empty {
                    *sheet.cell_mut(address) = Cell::with_value(value);
                }
            }
        }
        if let Some(formulas) = formulas {
            if let Some((top, left)) = formulas.start() {
                for (row, column, formula) in formulas.used_cells() {
                    if formula.is_empty() {
                        continue;
                    }
                    let address = CellAddress::new(top + row as u32, left + column as u32);
                    sheet.cell_mut(address).formula =
                        Some(formula.trim_start_matches('=').to_string());
                }
            }
        }

        if let Some(sheet_layout) = layout.sheets.remove(&name) {
            for (address, style) in sheet_layout.styles {
                sheet.cell_mut(address).style = style;
            }
            for (address, comment) in sheet_layout.comments {
                sheet.cell_mut(address).comment = Some(comment);
            }
            for range in sheet_layout.merged {
                sheet.add_merged_region(range);
            }
        }
    }
    Ok(workbook)
}

fn to_cell_value(data: &Data, date1904: bool) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match serial_to_datetime(dt.as_f64(), date1904) {
            Some(value) => CellValue::DateTime(value),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(text) => parse_iso(text)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(text.clone())),
        Data::DurationIso(text) => CellValue::Text(text.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

fn parse_iso(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .ok()
                .and_then(|t| NaiveDate::from_ymd_opt(1899, 12, 31).map(|d| d.and_time(t)))
        })
}
