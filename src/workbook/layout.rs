//! xlsx layout reader
//!
//! calamine exposes values and formulas only. Template handling also needs
//! merged regions, borders (the `Border` table terminator), number formats
//! and cell comments, so this pass walks the zip package with quick-xml:
//! `workbook.xml` and its rels for the sheet parts, `styles.xml` for the
//! cell formats, each worksheet for `s` indexes and `<mergeCell>`, and the
//! worksheet rels for the comments part.

use super::cell::{BorderLine, Borders, CellStyle};
use crate::address::{CellAddress, CellRange};
use crate::error::SheetMapResult;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::{Decoder, Reader};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Default)]
pub struct SheetLayout {
    pub merged: Vec<CellRange>,
    pub styles: BTreeMap<CellAddress, CellStyle>,
    pub comments: BTreeMap<CellAddress, String>,
}

#[derive(Debug, Default)]
pub struct WorkbookLayout {
    pub date1904: bool,
    /// Keyed by sheet name.
    pub sheets: HashMap<String, SheetLayout>,
}

/// Read the layout of an xlsx package. `None` when the zip is not an
/// SpreadsheetML package (ods, xlsb).
pub fn read_layout<RS: Read + Seek>(reader: RS) -> SheetMapResult<Option<WorkbookLayout>> {
    let mut zip = ZipArchive::new(reader)?;
    let Some(workbook_xml) = read_part(&mut zip, "xl/workbook.xml")? else {
        return Ok(None);
    };
    let relationships = match read_part(&mut zip, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => parse_relationships(&xml, "xl")?,
        None => HashMap::new(),
    };
    let (sheets, date1904) = parse_workbook(&workbook_xml)?;
    let styles = match read_part(&mut zip, "xl/styles.xml")? {
        Some(xml) => parse_styles(&xml)?,
        None => Vec::new(),
    };

    let mut layout = WorkbookLayout {
        date1904,
        sheets: HashMap::new(),
    };
    for (name, id) in sheets {
        let Some((_, path)) = relationships.get(&id) else {
            continue;
        };
        let Some(sheet_xml) = read_part(&mut zip, path)? else {
            continue;
        };
        let mut sheet = parse_worksheet(&sheet_xml, &styles)?;

        let (dir, file) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
        let rels_path = format!("{}/_rels/{}.rels", dir, file);
        if let Some(rels_xml) = read_part(&mut zip, &rels_path)? {
            let sheet_rels = parse_relationships(&rels_xml, dir)?;
            for (kind, target) in sheet_rels.values() {
                if kind.ends_with("/comments") {
                    if let Some(comments_xml) = read_part(&mut zip, target)? {
                        sheet.comments = parse_comments(&comments_xml)?;
                    }
                }
            }
        }
        layout.sheets.insert(name, sheet);
    }
    Ok(Some(layout))
}

fn read_part<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    name: &str,
) -> SheetMapResult<Option<String>> {
    let path = zip
        .file_names()
        .find(|file_name| name.eq_ignore_ascii_case(file_name))
        .map(|file_name| file_name.to_owned());
    let Some(path) = path else {
        return Ok(None);
    };
    match zip.by_name(&path) {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            Ok(Some(content))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn xml_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let config = reader.config_mut();
    config.check_end_names = false;
    config.expand_empty_elements = true;
    config.trim_text(false);
    reader
}

fn attribute(event: &BytesStart, name: &str, decoder: Decoder) -> SheetMapResult<Option<String>> {
    match event.try_get_attribute(name)? {
        Some(attribute) => Ok(Some(attribute.decode_and_unescape_value(decoder)?.into_owned())),
        None => Ok(None),
    }
}

fn push_entity(text: &mut String, bytes: &BytesRef) -> SheetMapResult<()> {
    let raw = bytes.xml_content()?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => number.parse::<u32>().ok(),
        };
        if let Some(character) = code.and_then(char::from_u32) {
            text.push(character);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        text.push_str(entity);
    }
    Ok(())
}

/// Normalise a relationship target against the directory of its source.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// `Id` → (`Type`, resolved target path).
fn parse_relationships(xml: &str, base_dir: &str) -> SheetMapResult<HashMap<String, (String, String)>> {
    let mut reader = xml_reader(xml);
    let decoder = reader.decoder();
    let mut relationships = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(event) if event.local_name().as_ref() == b"Relationship" => {
                let id = attribute(&event, "Id", decoder)?;
                let kind = attribute(&event, "Type", decoder)?.unwrap_or_default();
                let target = attribute(&event, "Target", decoder)?;
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id, (kind, resolve_target(base_dir, &target)));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(relationships)
}

/// Sheet `(name, relationship id)` pairs and the 1904 flag.
fn parse_workbook(xml: &str) -> SheetMapResult<(Vec<(String, String)>, bool)> {
    let mut reader = xml_reader(xml);
    let decoder = reader.decoder();
    let mut sheets = Vec::new();
    let mut date1904 = false;
    loop {
        match reader.read_event()? {
            Event::Start(event) if event.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut id = None;
                for result in event.attributes() {
                    let attribute = result?;
                    match attribute.key.local_name().as_ref() {
                        b"name" => name = Some(attribute.decode_and_unescape_value(decoder)?.into_owned()),
                        b"id" => id = Some(attribute.decode_and_unescape_value(decoder)?.into_owned()),
                        _ => {}
                    }
                }
                if let Some(pair) = name.zip(id) {
                    sheets.push(pair);
                }
            }
            Event::Start(event) if event.local_name().as_ref() == b"workbookPr" => {
                date1904 = attribute(&event, "date1904", decoder)?
                    .map(|value| value == "1" || value == "true")
                    .unwrap_or(false);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok((sheets, date1904))
}

/// Format code of a built-in number format id.
pub fn builtin_number_format(id: u32) -> Option<&'static str> {
    Some(match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// Cell formats (`cellXfs`) resolved to styles, indexed by `s`.
fn parse_styles(xml: &str) -> SheetMapResult<Vec<CellStyle>> {
    let mut reader = xml_reader(xml);
    let decoder = reader.decoder();
    let mut custom_formats: HashMap<u32, String> = HashMap::new();
    let mut borders: Vec<Borders> = Vec::new();
    let mut cell_formats: Vec<(u32, usize)> = Vec::new();

    let mut in_borders = false;
    let mut in_cell_formats = false;
    let mut current_border: Option<Borders> = None;
    loop {
        match reader.read_event()? {
            Event::Start(event) => match event.local_name().as_ref() {
                b"numFmt" => {
                    let id = attribute(&event, "numFmtId", decoder)?.and_then(|v| v.parse().ok());
                    let code = attribute(&event, "formatCode", decoder)?;
                    if let Some((id, code)) = id.zip(code) {
                        custom_formats.insert(id, code);
                    }
                }
                b"borders" => in_borders = true,
                b"border" if in_borders => current_border = Some(Borders::default()),
                side @ (b"left" | b"right" | b"top" | b"bottom" | b"start" | b"end") => {
                    if let Some(border) = current_border.as_mut() {
                        let line = attribute(&event, "style", decoder)?
                            .map(|s| BorderLine::from_xml(&s))
                            .unwrap_or_default();
                        match side {
                            b"left" | b"start" => border.left = line,
                            b"right" | b"end" => border.right = line,
                            b"top" => border.top = line,
                            _ => border.bottom = line,
                        }
                    }
                }
                b"cellXfs" => in_cell_formats = true,
                b"xf" if in_cell_formats => {
                    let format_id = attribute(&event, "numFmtId", decoder)?
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let border_id = attribute(&event, "borderId", decoder)?
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    cell_formats.push((format_id, border_id));
                }
                _ => {}
            },
            Event::End(event) => match event.local_name().as_ref() {
                b"borders" => in_borders = false,
                b"border" => {
                    if let Some(border) = current_border.take() {
                        borders.push(border);
                    }
                }
                b"cellXfs" => in_cell_formats = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(cell_formats
        .into_iter()
        .map(|(format_id, border_id)| CellStyle {
            number_format: custom_formats
                .get(&format_id)
                .cloned()
                .or_else(|| builtin_number_format(format_id).map(String::from)),
            borders: borders.get(border_id).copied().unwrap_or_default(),
        })
        .collect())
}

fn parse_worksheet(xml: &str, styles: &[CellStyle]) -> SheetMapResult<SheetLayout> {
    let mut reader = xml_reader(xml);
    let decoder = reader.decoder();
    let mut layout = SheetLayout::default();
    let mut row_index: u32 = 0;
    let mut column_index: u32 = 0;
    loop {
        match reader.read_event()? {
            Event::Start(event) if event.local_name().as_ref() == b"row" => {
                if let Some(r) = attribute(&event, "r", decoder)?.and_then(|v| v.parse::<u32>().ok()) {
                    row_index = r.saturating_sub(1);
                }
                column_index = 0;
            }
            Event::End(event) if event.local_name().as_ref() == b"row" => {
                row_index += 1;
            }
            Event::Start(event) if event.local_name().as_ref() == b"c" => {
                let address = attribute(&event, "r", decoder)?
                    .and_then(|r| r.parse::<CellAddress>().ok())
                    .unwrap_or_else(|| CellAddress::new(row_index, column_index));
                column_index = address.column() + 1;
                let style = attribute(&event, "s", decoder)?
                    .and_then(|s| s.parse::<usize>().ok())
                    .and_then(|s| styles.get(s));
                if let Some(style) = style {
                    let style = CellStyle {
                        number_format: style
                            .number_format
                            .clone()
                            .filter(|f| !f.eq_ignore_ascii_case("general")),
                        borders: style.borders,
                    };
                    if !style.is_default() {
                        layout.styles.insert(address, style);
                    }
                }
            }
            Event::Start(event) if event.local_name().as_ref() == b"mergeCell" => {
                if let Some(range) = attribute(&event, "ref", decoder)?.and_then(|r| r.parse().ok()) {
                    layout.merged.push(range);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(layout)
}

fn parse_comments(xml: &str) -> SheetMapResult<BTreeMap<CellAddress, String>> {
    let mut reader = xml_reader(xml);
    let decoder = reader.decoder();
    let mut comments = BTreeMap::new();
    let mut current: Option<(CellAddress, String)> = None;
    let mut in_text = false;
    loop {
        match reader.read_event()? {
            Event::Start(event) if event.local_name().as_ref() == b"comment" => {
                current = attribute(&event, "ref", decoder)?
                    .and_then(|r| r.parse::<CellAddress>().ok())
                    .map(|address| (address, String::new()));
            }
            Event::End(event) if event.local_name().as_ref() == b"comment" => {
                if let Some((address, text)) = current.take() {
                    comments.insert(address, text);
                }
            }
            Event::Start(event) if event.local_name().as_ref() == b"t" => in_text = true,
            Event::End(event) if event.local_name().as_ref() == b"t" => in_text = false,
            Event::Text(text) if in_text => {
                if let Some((_, content)) = current.as_mut() {
                    content.push_str(&text.xml_content()?);
                }
            }
            Event::GeneralRef(reference) if in_text => {
                if let Some((_, content)) = current.as_mut() {
                    push_entity(content, &reference)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(comments)
}
