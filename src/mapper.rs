//! Workbook driver
//!
//! [`SheetMapper`] selects the sheet of a record type, runs every field
//! binding through its processor and collects the outcome. Loads never
//! modify the workbook; saves work on a copy of the template that is
//! rendered in full before anything reaches the destination.

use crate::config::MapperConfig;
use crate::converter::ConverterRegistry;
use crate::error::{SheetMapError, SheetMapResult};
use crate::mapping::{SheetRecord, SheetSelector};
use crate::processor::{self, LoadScope, SaveScope};
use crate::validation::{FieldError, SaveReport, SheetBindingErrors};
use crate::workbook::{Sheet, Workbook};
use regex::Regex;
use std::any::type_name;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// The mapping engine: a configuration plus converter overrides.
///
/// Both are fixed once the mapper is shared; one mapper can serve
/// concurrent loads and saves as long as each call owns its records.
#[derive(Debug, Default)]
pub struct SheetMapper {
    config: MapperConfig,
    registry: ConverterRegistry,
}

impl SheetMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MapperConfig) -> Self {
        Self {
            config,
            registry: ConverterRegistry::new(),
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.registry
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Load
    // ═══════════════════════════════════════════════════════════════════════

    /// Load a record, failing on the first field error.
    pub fn load<R: SheetRecord, P: AsRef<Path>>(&self, path: P) -> SheetMapResult<R> {
        let workbook = Workbook::open(path)?;
        self.load_from_workbook(&workbook)
    }

    /// Load a record together with accumulated errors and positions.
    pub fn load_detail<R: SheetRecord, P: AsRef<Path>>(
        &self,
        path: P,
    ) -> SheetMapResult<SheetBindingErrors<R>> {
        let workbook = Workbook::open(path)?;
        self.load_detail_from_workbook(&workbook)
    }

    /// Load one record per sheet matched by the record's selector.
    pub fn load_multiple<R: SheetRecord, P: AsRef<Path>>(
        &self,
        path: P,
    ) -> SheetMapResult<Vec<SheetBindingErrors<R>>> {
        let workbook = Workbook::open(path)?;
        self.load_multiple_from_workbook(&workbook)
    }

    pub fn load_from_workbook<R: SheetRecord>(&self, workbook: &Workbook) -> SheetMapResult<R> {
        let outcome = self.load_detail_from_workbook::<R>(workbook)?;
        if let Some(error) = outcome.errors().first() {
            return Err(SheetMapError::TypeBind(error.clone()));
        }
        Ok(outcome.into_target())
    }

    pub fn load_detail_from_workbook<R: SheetRecord>(
        &self,
        workbook: &Workbook,
    ) -> SheetMapResult<SheetBindingErrors<R>> {
        let selector = R::sheet();
        let matches = self.select_sheets(workbook, &selector)?;
        match matches.as_slice() {
            [] => self.sheet_missing(&selector).map(|()| SheetBindingErrors::skipped(R::default())),
            [index] => self.load_sheet(sheet_at(workbook, *index)?),
            many => Err(SheetMapError::SheetNotFound(format!(
                "{} matches {} sheets",
                selector,
                many.len()
            ))),
        }
    }

    /// Sheet-level failures abort only their own sheet and are reported in
    /// that sheet's outcome.
    pub fn load_multiple_from_workbook<R: SheetRecord>(
        &self,
        workbook: &Workbook,
    ) -> SheetMapResult<Vec<SheetBindingErrors<R>>> {
        let selector = R::sheet();
        let matches = self.select_sheets(workbook, &selector)?;
        if matches.is_empty() {
            self.sheet_missing(&selector)?;
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::with_capacity(matches.len());
        for index in matches {
            let sheet = sheet_at(workbook, index)?;
            match self.load_sheet::<R>(sheet) {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) if error.is_sheet_level() => {
                    warn!("Sheet '{}' aborted: {}", sheet.name(), error);
                    let mut target = R::default();
                    target.set_sheet_name(sheet.name());
                    outcomes.push(SheetBindingErrors::new(
                        target,
                        Some(sheet.name().to_string()),
                        vec![FieldError::from_fatal(sheet.name(), error)],
                        Default::default(),
                    ));
                }
                Err(error) => return Err(error),
            }
        }
        Ok(outcomes)
    }

    fn load_sheet<R: SheetRecord>(&self, sheet: &Sheet) -> SheetMapResult<SheetBindingErrors<R>> {
        debug!("Loading {} from sheet '{}'", type_name::<R>(), sheet.name());
        let mut record = R::default();
        record.pre_load();
        record.set_sheet_name(sheet.name());

        let mut scope = LoadScope::new(sheet, &self.config, &self.registry);
        for binding in R::fields() {
            processor::load_field(&binding, &mut record, &mut scope)?;
        }
        record.post_load();

        let LoadScope {
            errors, metadata, ..
        } = scope;
        Ok(SheetBindingErrors::new(
            record,
            Some(sheet.name().to_string()),
            errors,
            metadata,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Save
    // ═══════════════════════════════════════════════════════════════════════

    /// Fill a copy of `template` with `record` and write it to `output`.
    pub fn save<R: SheetRecord, P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        template: P,
        output: Q,
        record: &mut R,
    ) -> SheetMapResult<SaveReport> {
        let mut workbook = Workbook::open(template)?;
        let report = self.save_to_workbook(&mut workbook, record)?;
        self.finish(&mut workbook)?;
        workbook.save(output)?;
        Ok(report)
    }

    /// Save several records, one per sheet matched by the record's selector.
    pub fn save_multiple<R: SheetRecord, P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        template: P,
        output: Q,
        records: &mut [R],
    ) -> SheetMapResult<Vec<SaveReport>> {
        let mut workbook = Workbook::open(template)?;
        let reports = self.save_multiple_to_workbook(&mut workbook, records)?;
        self.finish(&mut workbook)?;
        workbook.save(output)?;
        Ok(reports)
    }

    /// Render into `output` from an in-memory template, which is left as is.
    /// Nothing is written unless the whole save succeeds.
    pub fn save_to_writer<R: SheetRecord, W: Write>(
        &self,
        template: &Workbook,
        output: &mut W,
        record: &mut R,
    ) -> SheetMapResult<SaveReport> {
        let mut workbook = template.clone();
        let report = self.save_to_workbook(&mut workbook, record)?;
        self.finish(&mut workbook)?;
        let bytes = workbook.to_bytes()?;
        output.write_all(&bytes)?;
        output.flush()?;
        Ok(report)
    }

    /// Write `record` into its sheet of `workbook` in place.
    pub fn save_to_workbook<R: SheetRecord>(
        &self,
        workbook: &mut Workbook,
        record: &mut R,
    ) -> SheetMapResult<SaveReport> {
        let selector = R::sheet();
        let index = self.select_for_save(workbook, &selector, record.sheet_name(), None)?;
        match index {
            Some(index) => self.save_sheet(sheet_at_mut(workbook, index)?, record),
            None => self.sheet_missing(&selector).map(|()| SaveReport::default()),
        }
    }

    /// Records without a sheet name take the matched sheets in order.
    pub fn save_multiple_to_workbook<R: SheetRecord>(
        &self,
        workbook: &mut Workbook,
        records: &mut [R],
    ) -> SheetMapResult<Vec<SaveReport>> {
        let selector = R::sheet();
        let mut reports = Vec::with_capacity(records.len());
        for (position, record) in records.iter_mut().enumerate() {
            let index =
                self.select_for_save(workbook, &selector, record.sheet_name(), Some(position))?;
            let report = match index {
                Some(index) => self.save_sheet(sheet_at_mut(workbook, index)?, record)?,
                None => {
                    self.sheet_missing(&selector)?;
                    SaveReport::default()
                }
            };
            reports.push(report);
        }
        Ok(reports)
    }

    fn save_sheet<R: SheetRecord>(&self, sheet: &mut Sheet, record: &mut R) -> SheetMapResult<SaveReport> {
        let name = sheet.name().to_string();
        debug!("Saving {} into sheet '{}'", type_name::<R>(), name);
        record.pre_save();

        let mut scope = SaveScope::new(sheet, &self.config, &self.registry);
        for binding in R::fields() {
            processor::save_field(&binding, record, &mut scope)?;
        }
        let metadata = scope.metadata;
        record.post_save();
        Ok(SaveReport::new(Some(name), metadata))
    }

    fn finish(&self, workbook: &mut Workbook) -> SheetMapResult<()> {
        if self.config.recalculate_formulas_on_save {
            debug!("Recalculating formulas");
            workbook.recalculate();
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sheet selection
    // ═══════════════════════════════════════════════════════════════════════

    /// Indexes of every sheet the selector matches, in workbook order.
    pub fn select_sheets(&self, workbook: &Workbook, selector: &SheetSelector) -> SheetMapResult<Vec<usize>> {
        let matches = match selector {
            SheetSelector::Name(name) => workbook.sheet_index(name).into_iter().collect(),
            SheetSelector::Index(index) => {
                if *index < workbook.sheets().len() {
                    vec![*index]
                } else {
                    Vec::new()
                }
            }
            SheetSelector::Regex(pattern) => {
                let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                    SheetMapError::annotation("sheet", format!("invalid sheet pattern '{}': {}", pattern, e))
                })?;
                workbook
                    .sheet_names()
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| regex.is_match(name))
                    .map(|(index, _)| index)
                    .collect()
            }
        };
        debug!("Sheet selector {} matched {:?}", selector, matches);
        Ok(matches)
    }

    fn select_for_save(
        &self,
        workbook: &Workbook,
        selector: &SheetSelector,
        sheet_name: Option<&str>,
        position: Option<usize>,
    ) -> SheetMapResult<Option<usize>> {
        let matches = self.select_sheets(workbook, selector)?;
        if matches.len() <= 1 {
            return Ok(matches.first().copied());
        }
        if let Some(name) = sheet_name {
            return Ok(matches
                .iter()
                .copied()
                .find(|index| workbook.sheet_at(*index).is_some_and(|s| s.name() == name)));
        }
        match position {
            Some(position) => Ok(matches.get(position).copied()),
            None => Err(SheetMapError::SheetNotFound(format!(
                "{} matches {} sheets and the record names none of them",
                selector,
                matches.len()
            ))),
        }
    }

    fn sheet_missing(&self, selector: &SheetSelector) -> SheetMapResult<()> {
        if self.config.ignore_sheet_not_found {
            warn!("Sheet {} not found, skipped", selector);
            Ok(())
        } else {
            Err(SheetMapError::SheetNotFound(selector.to_string()))
        }
    }
}

fn sheet_at(workbook: &Workbook, index: usize) -> SheetMapResult<&Sheet> {
    workbook
        .sheet_at(index)
        .ok_or_else(|| SheetMapError::SheetNotFound(format!("#{}", index)))
}

fn sheet_at_mut(workbook: &mut Workbook, index: usize) -> SheetMapResult<&mut Sheet> {
    workbook
        .sheet_at_mut(index)
        .ok_or_else(|| SheetMapError::SheetNotFound(format!("#{}", index)))
}
