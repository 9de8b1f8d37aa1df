//! Single cell at a fixed address

use super::{load_scalar, save_scalar, LoadScope, Located, SaveScope};
use crate::accessor::ScalarAccess;
use crate::error::SheetMapResult;
use crate::mapping::{CellMapping, FieldBinding, Record};

pub fn load<R: Record>(
    binding: &FieldBinding<R>,
    mapping: &CellMapping,
    access: &dyn ScalarAccess<R>,
    record: &mut R,
    scope: &mut LoadScope<'_>,
) -> SheetMapResult<()> {
    let address = mapping.resolve(binding.name())?;
    let value_address = scope.sheet.merged_value_address(address);
    load_scalar(
        access,
        binding.options(),
        binding.channels(),
        record,
        scope,
        Located {
            key: binding.name(),
            path: binding.name(),
            address,
            value_address,
            label: None,
        },
    )
}

pub fn save<R: Record>(
    binding: &FieldBinding<R>,
    mapping: &CellMapping,
    access: &dyn ScalarAccess<R>,
    record: &mut R,
    scope: &mut SaveScope<'_>,
) -> SheetMapResult<()> {
    let address = mapping.resolve(binding.name())?;
    save_scalar(
        access,
        binding.options(),
        binding.channels(),
        record,
        scope,
        Located {
            key: binding.name(),
            path: binding.name(),
            address,
            value_address: address,
            label: None,
        },
    )
}
