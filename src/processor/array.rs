//! Run of cells bound to a list
//!
//! `size` cells from the anchor along the direction. With `item_merged`, a
//! merged region counts as one element read from its top-left cell, so the
//! list gets shorter than `size`.

use super::{
    merge_equal_runs, note_location, read_comment, save_error, write_comment, LoadScope, Located,
    SaveScope,
};
use crate::accessor::{indexed, ArrayAccess};
use crate::address::{CellAddress, Direction};
use crate::error::{SheetMapError, SheetMapResult};
use crate::mapping::{ArrayMapping, ArrayOver, ArrayRemained, FieldBinding, Record};
use crate::workbook::Sheet;
use tracing::debug;

/// One element of an array: where it is mapped and where its value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub address: CellAddress,
    pub value_address: CellAddress,
}

/// Element cells of `size` cells from `anchor`, coalescing merged regions
/// when `item_merged` is set. Cells off the sheet end the run.
pub fn slots(
    sheet: &Sheet,
    anchor: CellAddress,
    size: u32,
    direction: Direction,
    item_merged: bool,
) -> Vec<Slot> {
    let mut slots = Vec::new();
    let mut offset = 0;
    while offset < size {
        let Some(address) = anchor.step(direction, offset) else {
            break;
        };
        match sheet.merged_region(address).filter(|_| item_merged) {
            Some(region) => {
                let (position, end) = match direction {
                    Direction::Horizontal => (address.column(), region.last.column()),
                    Direction::Vertical => (address.row(), region.last.row()),
                };
                slots.push(Slot {
                    address,
                    value_address: region.first,
                });
                offset += end - position + 1;
            }
            None => {
                slots.push(Slot {
                    address,
                    value_address: sheet.merged_value_address(address),
                });
                offset += 1;
            }
        }
    }
    slots
}

pub(crate) fn checked_size(size: i64, field: &str) -> SheetMapResult<u32> {
    if size <= 0 {
        return Err(SheetMapError::annotation(
            field,
            format!("size must be greater than 0, was {}", size),
        ));
    }
    u32::try_from(size).map_err(|_| SheetMapError::annotation(field, format!("size {} is too large", size)))
}

pub fn load<R: Record>(
    binding: &FieldBinding<R>,
    mapping: &ArrayMapping,
    access: &dyn ArrayAccess<R>,
    record: &mut R,
    scope: &mut LoadScope<'_>,
) -> SheetMapResult<()> {
    let name = binding.name();
    let size = checked_size(mapping.size, name)?;
    let anchor = mapping.anchor.resolve(name)?;
    let slots = slots(scope.sheet, anchor, size, mapping.direction, mapping.item_merged);
    debug!("Array '{}' from {} has {} element(s)", name, anchor, slots.len());

    let channels = binding.channels();
    let keys: Vec<String> = (0..slots.len()).map(|i| indexed(name, i)).collect();
    for (slot, key) in slots.iter().zip(&keys) {
        let at = Located {
            key,
            path: key,
            address: slot.address,
            value_address: slot.value_address,
            label: None,
        };
        note_location(channels, record, &mut scope.metadata, &at);
        read_comment(channels, record, scope.sheet, &mut scope.metadata, &at);
    }

    let value_addresses: Vec<CellAddress> = slots.iter().map(|s| s.value_address).collect();
    let failures = access.load(record, scope.sheet, &value_addresses, binding.options(), scope.cx());
    for (index, error) in failures {
        scope.conversion_failed(&keys[index], slots[index].address, None, error)?;
    }
    Ok(())
}

pub fn save<R: Record>(
    binding: &FieldBinding<R>,
    mapping: &ArrayMapping,
    access: &dyn ArrayAccess<R>,
    record: &mut R,
    scope: &mut SaveScope<'_>,
) -> SheetMapResult<()> {
    let name = binding.name();
    let size = checked_size(mapping.size, name)?;
    let anchor = mapping.anchor.resolve(name)?;
    let slots = slots(scope.sheet, anchor, size, mapping.direction, mapping.item_merged);
    let cx = scope.cx();
    let texts = access.texts(record, binding.options(), cx);

    if texts.len() > slots.len() {
        match mapping.over {
            ArrayOver::Break => debug!(
                "Array '{}' truncated to {} of {} element(s)",
                name,
                slots.len(),
                texts.len()
            ),
            ArrayOver::Error => {
                return Err(SheetMapError::annotation(
                    name,
                    format!("size ({}) exceeded by data size ({})", size, texts.len()),
                ))
            }
        }
    }

    let addresses: Vec<CellAddress> = slots.iter().map(|s| s.address).collect();
    access
        .save(record, scope.sheet, &addresses, binding.options(), cx)
        .map_err(|(index, e)| save_error(&indexed(name, index), e))?;

    let written = texts.len().min(slots.len());
    if mapping.remained == ArrayRemained::Clear && binding.options().formula.is_none() {
        for slot in &slots[written..] {
            scope.sheet.clear(slot.address);
        }
    }

    let channels = binding.channels();
    for (index, slot) in slots.iter().enumerate().take(written) {
        let key = indexed(name, index);
        let at = Located {
            key: &key,
            path: &key,
            address: slot.address,
            value_address: slot.address,
            label: None,
        };
        write_comment(channels, record, scope.sheet, &mut scope.metadata, &at);
        note_location(channels, record, &mut scope.metadata, &at);
    }

    if scope.config.merge_cell_on_save && mapping.item_merged {
        let cells: Vec<(CellAddress, Option<String>)> =
            addresses.iter().copied().zip(texts).collect();
        merge_equal_runs(scope.sheet, mapping.direction, &cells);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellValue;

    fn addr(text: &str) -> CellAddress {
        text.parse().unwrap()
    }

    #[test]
    fn test_merged_items_coalesce() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(addr("B4"), CellValue::Text("今日は".into()));
        sheet.add_merged_region("B4:C4".parse().unwrap());
        sheet.set_value(addr("D4"), CellValue::Text("、".into()));
        sheet.set_value(addr("E4"), CellValue::Text("いい天気ですね。".into()));
        sheet.add_merged_region("E4:F4".parse().unwrap());

        let merged = slots(&sheet, addr("B4"), 5, Direction::Horizontal, true);
        let positions: Vec<CellAddress> = merged.iter().map(|s| s.address).collect();
        assert_eq!(positions, vec![addr("B4"), addr("D4"), addr("E4")]);

        let plain = slots(&sheet, addr("B4"), 5, Direction::Horizontal, false);
        assert_eq!(plain.len(), 5);
        assert_eq!(plain[1].address, addr("C4"));
        assert_eq!(plain[1].value_address, addr("B4"));
    }

    #[test]
    fn test_vertical_run_stops_at_sheet_edge() {
        let sheet = Sheet::new("Sheet1");
        let run = slots(&sheet, addr("A1048575"), 5, Direction::Vertical, false);
        assert_eq!(run.len(), 2);
    }

    #[test]
    fn test_size_must_be_positive() {
        assert!(matches!(
            checked_size(0, "items"),
            Err(SheetMapError::AnnotationInvalid { .. })
        ));
        assert_eq!(checked_size(3, "items").unwrap(), 3);
    }
}
