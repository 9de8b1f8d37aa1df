//! Workbook writer (rust_xlsxwriter)
//!
//! The whole workbook is rendered into a buffer first; callers write the
//! buffer to its destination only once rendering succeeded. Output always
//! uses the 1900 date system.

use super::cell::{BorderLine, Cell, CellStyle, CellValue};
use super::display::{datetime_to_serial, general_number};
use super::{Sheet, Workbook};
use crate::address::CellAddress;
use crate::error::SheetMapResult;
use chrono::Timelike;
use rust_xlsxwriter::{Format, FormatBorder, Formula, Note, Worksheet};

const DEFAULT_DATE_FORMAT: &str = "yyyy-mm-dd";
const DEFAULT_DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

pub fn write_to_buffer(workbook: &Workbook) -> SheetMapResult<Vec<u8>> {
    let mut output = rust_xlsxwriter::Workbook::new();
    for sheet in workbook.sheets() {
        let worksheet = output.add_worksheet();
        worksheet.set_name(sheet.name())?;
        write_sheet(worksheet, sheet)?;
    }
    if workbook.sheets().is_empty() {
        output.add_worksheet();
    }
    Ok(output.save_to_buffer()?)
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> SheetMapResult<()> {
    for range in sheet.merged_regions() {
        let top_left = sheet.cell(range.first);
        let (first_row, first_col) = range.first.to_xlsx();
        let (last_row, last_col) = range.last.to_xlsx();
        worksheet.merge_range(
            first_row,
            first_col,
            last_row,
            last_col,
            "",
            &to_format(&top_left.style, &top_left.value),
        )?;
    }

    for (address, cell) in sheet.cells() {
        write_cell(worksheet, *address, cell)?;
    }
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    address: CellAddress,
    cell: &Cell,
) -> SheetMapResult<()> {
    let (row, col) = address.to_xlsx();
    let format = to_format(&cell.style, &cell.value);

    if let Some(formula) = &cell.formula {
        let mut formula = Formula::new(format!("={}", formula));
        if let Some(result) = cached_result(&cell.value) {
            formula = formula.set_result(result);
        }
        worksheet.write_formula_with_format(row, col, formula, &format)?;
    } else {
        match &cell.value {
            CellValue::Empty => {
                if !cell.style.is_default() {
                    worksheet.write_blank(row, col, &format)?;
                }
            }
            CellValue::Text(text) | CellValue::Error(text) => {
                worksheet.write_string_with_format(row, col, text, &format)?;
            }
            CellValue::Number(n) => {
                worksheet.write_number_with_format(row, col, *n, &format)?;
            }
            CellValue::Bool(b) => {
                worksheet.write_boolean_with_format(row, col, *b, &format)?;
            }
            CellValue::DateTime(dt) => {
                worksheet.write_number_with_format(
                    row,
                    col,
                    datetime_to_serial(dt, false),
                    &format,
                )?;
            }
        }
    }

    if let Some(comment) = &cell.comment {
        worksheet.insert_note(row, col, &Note::new(comment))?;
    }
    Ok(())
}

fn cached_result(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Empty => None,
        CellValue::Text(s) | CellValue::Error(s) => Some(s.clone()),
        CellValue::Number(n) => Some(general_number(*n)),
        CellValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        CellValue::DateTime(dt) => Some(datetime_to_serial(dt, false).to_string()),
    }
}

fn to_format(style: &CellStyle, value: &CellValue) -> Format {
    let mut format = Format::new();
    match (&style.number_format, value) {
        (Some(number_format), _) => format = format.set_num_format(number_format),
        (None, CellValue::DateTime(dt)) => {
            let pattern = if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 {
                DEFAULT_DATE_FORMAT
            } else {
                DEFAULT_DATETIME_FORMAT
            };
            format = format.set_num_format(pattern);
        }
        _ => {}
    }
    let borders = &style.borders;
    if !borders.left.is_none() {
        format = format.set_border_left(to_border(borders.left));
    }
    if !borders.right.is_none() {
        format = format.set_border_right(to_border(borders.right));
    }
    if !borders.top.is_none() {
        format = format.set_border_top(to_border(borders.top));
    }
    if !borders.bottom.is_none() {
        format = format.set_border_bottom(to_border(borders.bottom));
    }
    format
}

fn to_border(line: BorderLine) -> FormatBorder {
    match line {
        BorderLine::None => FormatBorder::None,
        BorderLine::Thin => FormatBorder::Thin,
        BorderLine::Medium => FormatBorder::Medium,
        BorderLine::Dashed => FormatBorder::Dashed,
        BorderLine::Dotted => FormatBorder::Dotted,
        BorderLine::Thick => FormatBorder::Thick,
        BorderLine::Double => FormatBorder::Double,
        BorderLine::Hair => FormatBorder::Hair,
        BorderLine::MediumDashed => FormatBorder::MediumDashed,
        BorderLine::DashDot => FormatBorder::DashDot,
        BorderLine::MediumDashDot => FormatBorder::MediumDashDot,
        BorderLine::DashDotDot => FormatBorder::DashDotDot,
        BorderLine::MediumDashDotDot => FormatBorder::MediumDashDotDot,
        BorderLine::SlantDashDot => FormatBorder::SlantDashDot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::Borders;

    fn addr(text: &str) -> CellAddress {
        text.parse().unwrap()
    }

    #[test]
    fn test_round_trip_through_buffer() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("Data");
        sheet.set_value(addr("A1"), CellValue::Text("名前".into()));
        sheet.set_value(addr("B2"), CellValue::Number(1234.5));
        sheet.set_number_format(addr("B2"), Some("#,##0.00"));
        sheet.set_value(addr("C3"), CellValue::Bool(true));
        sheet.set_borders(addr("D4"), Borders::all(BorderLine::Thin));
        sheet.set_value(addr("E5"), CellValue::Text("merged".into()));
        sheet.add_merged_region("E5:F5".parse().unwrap());
        sheet.set_comment(addr("A1"), Some("header"));

        let bytes = workbook.to_bytes().unwrap();
        let loaded = Workbook::from_bytes(&bytes).unwrap();
        let sheet = loaded.sheet("Data").unwrap();

        assert_eq!(sheet.value(addr("A1")), &CellValue::Text("名前".into()));
        assert_eq!(sheet.formatted_text(addr("B2")), "1,234.50");
        assert_eq!(sheet.value(addr("C3")), &CellValue::Bool(true));
        assert_eq!(sheet.cell(addr("D4")).style.borders.left, BorderLine::Thin);
        assert_eq!(sheet.merged_regions()[0].to_string(), "E5:F5");
        assert_eq!(sheet.value(addr("E5")), &CellValue::Text("merged".into()));
        let comment = sheet.cell(addr("A1")).comment.clone().unwrap_or_default();
        assert!(comment.ends_with("header"), "comment was '{}'", comment);
    }

    #[test]
    fn test_formula_cached_result_is_read_back() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("Sheet1");
        sheet.set_formula(addr("B5"), "ROW()-4");
        workbook.recalculate();

        let loaded = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
        let cell = loaded.sheet("Sheet1").unwrap().cell(addr("B5"));
        assert_eq!(cell.formula.as_deref(), Some("ROW()-4"));
        assert_eq!(cell.value, CellValue::Number(1.0));
    }
}
