//! Value next to a label
//!
//! The label cell is searched (optionally after a heading label) or given by
//! address. The value sits `skip + 1` cells away in the configured
//! direction; with `range > 1` the first non-blank of the next `range`
//! cells is used. A merged label is stepped over as a whole unless
//! `label_merged` is off.

use super::label::LabelFinder;
use super::{load_scalar, save_scalar, LoadScope, Located, SaveScope};
use crate::accessor::ScalarAccess;
use crate::address::CellAddress;
use crate::config::MapperConfig;
use crate::error::{SheetMapError, SheetMapResult};
use crate::mapping::{FieldBinding, LabelPosition, LabelledCellMapping, Record};
use crate::workbook::Sheet;
use tracing::warn;

/// A resolved label and the cell holding its value.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledCell {
    pub label_address: CellAddress,
    pub label: String,
    pub address: CellAddress,
}

fn find_label_cell(
    sheet: &Sheet,
    config: &MapperConfig,
    mapping: &LabelledCellMapping,
    field: &str,
) -> SheetMapResult<Option<CellAddress>> {
    if let Some(address) = mapping.label_address.as_deref().filter(|a| !a.trim().is_empty()) {
        return address
            .parse()
            .map(Some)
            .map_err(|_| SheetMapError::annotation(field, format!("invalid label address '{}'", address)));
    }
    let label = mapping
        .label
        .as_deref()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| SheetMapError::annotation(field, "either label or label_address is required"))?;

    let finder = LabelFinder::new(sheet, config);
    match &mapping.header_label {
        Some(heading) => match finder.find(heading, field)? {
            Some(heading_cell) => finder.find_after(label, heading_cell, field),
            None => Ok(None),
        },
        None => finder.find(label, field),
    }
}

/// Resolve the label and value cell; `None` for a missing optional label.
pub fn resolve(
    sheet: &Sheet,
    config: &MapperConfig,
    mapping: &LabelledCellMapping,
    field: &str,
) -> SheetMapResult<Option<LabelledCell>> {
    let label_address = match find_label_cell(sheet, config, mapping, field)? {
        Some(address) => address,
        None if mapping.optional => {
            warn!("Optional label for '{}' not found in '{}'", field, sheet.name());
            return Ok(None);
        }
        None => {
            return Err(SheetMapError::cell_not_found(
                sheet.name(),
                field,
                format!(
                    "label '{}' not found",
                    mapping.label.as_deref().unwrap_or_default()
                ),
            ))
        }
    };

    let origin = match (mapping.label_merged, sheet.merged_region(label_address)) {
        (true, Some(region)) => match mapping.position {
            LabelPosition::Right => CellAddress::new(label_address.row(), region.last.column()),
            LabelPosition::Left => CellAddress::new(label_address.row(), region.first.column()),
            LabelPosition::Down => CellAddress::new(region.last.row(), label_address.column()),
            LabelPosition::Up => CellAddress::new(region.first.row(), label_address.column()),
        },
        _ => label_address,
    };

    let mut candidates: Vec<CellAddress> = Vec::new();
    for i in 0..mapping.range.max(1) {
        let distance = 1 + i64::from(mapping.skip) + i64::from(i);
        let next = match mapping.position {
            LabelPosition::Right => origin.offset(0, distance),
            LabelPosition::Left => origin.offset(0, -distance),
            LabelPosition::Down => origin.offset(distance, 0),
            LabelPosition::Up => origin.offset(-distance, 0),
        };
        let Some(next) = next else { break };
        let value_cell = sheet.merged_value_address(next);
        if !candidates
            .iter()
            .any(|c| sheet.merged_value_address(*c) == value_cell)
        {
            candidates.push(next);
        }
    }

    let address = candidates
        .iter()
        .copied()
        .find(|c| !sheet.is_blank(sheet.merged_value_address(*c)))
        .or_else(|| candidates.first().copied())
        .ok_or_else(|| {
            SheetMapError::cell_not_found(
                sheet.name(),
                field,
                format!("no cell {:?} of label at {}", mapping.position, label_address),
            )
        })?;

    Ok(Some(LabelledCell {
        label_address,
        label: sheet.formatted_text(label_address),
        address,
    }))
}

pub fn load<R: Record>(
    binding: &FieldBinding<R>,
    mapping: &LabelledCellMapping,
    access: &dyn ScalarAccess<R>,
    record: &mut R,
    scope: &mut LoadScope<'_>,
) -> SheetMapResult<()> {
    let Some(found) = resolve(scope.sheet, scope.config, mapping, binding.name())? else {
        return Ok(());
    };
    let value_address = scope.sheet.merged_value_address(found.address);
    load_scalar(
        access,
        binding.options(),
        binding.channels(),
        record,
        scope,
        Located {
            key: binding.name(),
            path: binding.name(),
            address: found.address,
            value_address,
            label: Some(found.label.as_str()),
        },
    )
}

pub fn save<R: Record>(
    binding: &FieldBinding<R>,
    mapping: &LabelledCellMapping,
    access: &dyn ScalarAccess<R>,
    record: &mut R,
    scope: &mut SaveScope<'_>,
) -> SheetMapResult<()> {
    let Some(found) = resolve(scope.sheet, scope.config, mapping, binding.name())? else {
        return Ok(());
    };
    let value_address = scope.sheet.merged_value_address(found.address);
    save_scalar(
        access,
        binding.options(),
        binding.channels(),
        record,
        scope,
        Located {
            key: binding.name(),
            path: binding.name(),
            address: found.address,
            value_address,
            label: Some(found.label.as_str()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellValue;

    fn addr(text: &str) -> CellAddress {
        text.parse().unwrap()
    }

    fn resolve_at(sheet: &Sheet, mapping: &LabelledCellMapping) -> Option<LabelledCell> {
        resolve(sheet, &MapperConfig::default(), mapping, "field").unwrap()
    }

    #[test]
    fn test_right_of_label_with_skip() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(addr("B2"), CellValue::Text("氏名".into()));
        let found = resolve_at(&sheet, &LabelledCellMapping::new("氏名")).unwrap();
        assert_eq!(found.address, addr("C2"));
        assert_eq!(found.label, "氏名");

        let skipped = resolve_at(&sheet, &LabelledCellMapping::new("氏名").skip(2)).unwrap();
        assert_eq!(skipped.address, addr("E2"));

        let below = LabelledCellMapping::new("氏名").position(LabelPosition::Down);
        assert_eq!(resolve_at(&sheet, &below).unwrap().address, addr("B3"));
    }

    #[test]
    fn test_merged_label_is_stepped_over() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(addr("B2"), CellValue::Text("住所".into()));
        sheet.add_merged_region("B2:C2".parse().unwrap());
        let mapping = LabelledCellMapping::new("住所");
        assert_eq!(resolve_at(&sheet, &mapping).unwrap().address, addr("D2"));

        let raw = LabelledCellMapping::new("住所").label_merged(false);
        assert_eq!(resolve_at(&sheet, &raw).unwrap().address, addr("C2"));
    }

    #[test]
    fn test_range_takes_first_non_blank() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(addr("A1"), CellValue::Text("備考".into()));
        sheet.set_value(addr("D1"), CellValue::Text("メモ".into()));
        let mapping = LabelledCellMapping::new("備考").range(4);
        assert_eq!(resolve_at(&sheet, &mapping).unwrap().address, addr("D1"));
    }

    #[test]
    fn test_header_label_scopes_search() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(addr("A1"), CellValue::Text("氏名".into()));
        sheet.set_value(addr("A3"), CellValue::Text("申請者".into()));
        sheet.set_value(addr("A4"), CellValue::Text("氏名".into()));
        let mapping = LabelledCellMapping::new("氏名").header_label("申請者");
        assert_eq!(resolve_at(&sheet, &mapping).unwrap().address, addr("B4"));
    }

    #[test]
    fn test_skip_past_the_sheet_edge_is_not_found() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(addr("A1"), CellValue::Text("氏名".into()));
        let mapping = LabelledCellMapping::new("氏名").skip(u32::MAX).range(2);
        assert!(matches!(
            resolve(&sheet, &MapperConfig::default(), &mapping, "f"),
            Err(SheetMapError::CellNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_label() {
        let sheet = Sheet::new("Sheet1");
        assert!(resolve_at(&sheet, &LabelledCellMapping::new("x").optional()).is_none());
        assert!(matches!(
            resolve(&sheet, &MapperConfig::default(), &LabelledCellMapping::new("x"), "f"),
            Err(SheetMapError::CellNotFound { .. })
        ));

        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(addr("A1"), CellValue::Text("x".into()));
        let left = LabelledCellMapping::new("x").position(LabelPosition::Left);
        assert!(resolve(&sheet, &MapperConfig::default(), &left, "f").is_err());
    }
}
