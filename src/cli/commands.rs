use crate::address::{CellAddress, CellRange};
use crate::config::MapperConfig;
use crate::error::{SheetMapError, SheetMapResult};
use crate::processor::label::LabelMatcher;
use crate::workbook::{Sheet, Workbook};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What `inspect` reports for one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub used_range: Option<String>,
    pub cells: usize,
    pub merged_regions: Vec<String>,
}

/// One cell matched by `find`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelHit {
    pub sheet: String,
    pub address: String,
    pub text: String,
    /// Formatted text of the cell right of the label (after its merged region).
    pub next: String,
}

/// Formatted text of a rectangular range, row by row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeText {
    pub sheet: String,
    pub range: String,
    pub rows: Vec<Vec<String>>,
}

/// Defaults unless a YAML file is given.
pub fn load_config(path: Option<&Path>) -> SheetMapResult<MapperConfig> {
    match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            MapperConfig::from_yaml_file(path)
        }
        None => Ok(MapperConfig::default()),
    }
}

fn select_sheets<'a>(workbook: &'a Workbook, name: Option<&str>) -> SheetMapResult<Vec<&'a Sheet>> {
    match name {
        Some(name) => workbook
            .sheet(name)
            .map(|sheet| vec![sheet])
            .ok_or_else(|| SheetMapError::SheetNotFound(name.to_string())),
        None => Ok(workbook.sheets().iter().collect()),
    }
}

pub fn summarize(workbook: &Workbook) -> Vec<SheetSummary> {
    workbook
        .sheets()
        .iter()
        .map(|sheet| SheetSummary {
            name: sheet.name().to_string(),
            used_range: sheet.used_range().map(|r| r.to_string()),
            cells: sheet.cells().filter(|(_, cell)| !cell.value.is_empty()).count(),
            merged_regions: sheet.merged_regions().iter().map(|r| r.to_string()).collect(),
        })
        .collect()
}

/// Every cell of the selected sheets whose text matches `label`.
pub fn find_labels(
    workbook: &Workbook,
    label: &str,
    sheet: Option<&str>,
    config: &MapperConfig,
) -> SheetMapResult<Vec<LabelHit>> {
    let matcher = LabelMatcher::new(label, config, "label")?;
    let mut hits = Vec::new();
    for sheet in select_sheets(workbook, sheet)? {
        for (address, _) in sheet.cells() {
            let text = sheet.formatted_text(*address);
            if text.is_empty() || !matcher.is_match(&text) {
                continue;
            }
            let edge = sheet
                .merged_region(*address)
                .map(|region| region.last.column())
                .unwrap_or(address.column());
            let next = CellAddress::new(address.row(), edge)
                .offset(0, 1)
                .map(|next| sheet.formatted_text(sheet.merged_value_address(next)))
                .unwrap_or_default();
            hits.push(LabelHit {
                sheet: sheet.name().to_string(),
                address: address.to_string(),
                text,
                next,
            });
        }
    }
    Ok(hits)
}

pub fn range_text(workbook: &Workbook, range: &str, sheet: Option<&str>) -> SheetMapResult<RangeText> {
    let range: CellRange = range.parse()?;
    let sheet = match sheet {
        Some(name) => workbook
            .sheet(name)
            .ok_or_else(|| SheetMapError::SheetNotFound(name.to_string()))?,
        None => workbook
            .sheet_at(0)
            .ok_or_else(|| SheetMapError::SheetNotFound("#0".to_string()))?,
    };
    let rows = (range.first.row()..=range.last.row())
        .map(|row| {
            (range.first.column()..=range.last.column())
                .map(|column| sheet.formatted_text(CellAddress::new(row, column)))
                .collect()
        })
        .collect();
    Ok(RangeText {
        sheet: sheet.name().to_string(),
        range: range.to_string(),
        rows,
    })
}

/// Execute the inspect command
pub fn inspect(file: PathBuf, config: Option<PathBuf>, json: bool, verbose: bool) -> SheetMapResult<()> {
    let config = load_config(config.as_deref())?;
    let workbook = Workbook::open(&file)?;
    let summaries = summarize(&workbook);

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("{}", "📊 Sheetmap - Inspect".bold().green());
    println!("   File: {}", file.display());
    if workbook.date1904() {
        println!("   Date system: 1904");
    }
    println!();

    for summary in &summaries {
        println!("{}", format!("📄 {}", summary.name).bold());
        match &summary.used_range {
            Some(range) => println!("   Used range:     {}", range),
            None => println!("   Used range:     {}", "(empty)".dimmed()),
        }
        println!("   Cells:          {}", summary.cells);
        println!("   Merged regions: {}", summary.merged_regions.len());
        if verbose {
            for region in &summary.merged_regions {
                println!("     - {}", region.cyan());
            }
        }
        println!();
    }

    if verbose {
        println!("{}", "⚙️  Effective config".cyan());
        print!("{}", serde_yaml::to_string(&config)?);
    }
    Ok(())
}

/// Execute the find command
pub fn find(
    file: PathBuf,
    label: String,
    sheet: Option<String>,
    config: Option<PathBuf>,
    json: bool,
) -> SheetMapResult<()> {
    let config = load_config(config.as_deref())?;
    let workbook = Workbook::open(&file)?;
    let hits = find_labels(&workbook, &label, sheet.as_deref(), &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        println!("{}", "🔍 Sheetmap - Find".bold().green());
        println!("   File:  {}", file.display());
        println!("   Label: {}\n", label);
        for hit in &hits {
            println!(
                "   {}!{}  {}  → {}",
                hit.sheet.bold(),
                hit.address.cyan(),
                hit.text,
                if hit.next.is_empty() {
                    "(blank)".dimmed().to_string()
                } else {
                    hit.next.clone()
                }
            );
        }
    }

    if hits.is_empty() {
        return Err(SheetMapError::cell_not_found(
            sheet.as_deref().unwrap_or("*"),
            "label",
            format!("label '{}' not found", label),
        ));
    }
    if !json {
        println!("\n{}", format!("✅ {} match(es)", hits.len()).bold().green());
    }
    Ok(())
}

/// Execute the cells command
pub fn cells(
    file: PathBuf,
    range: String,
    sheet: Option<String>,
    config: Option<PathBuf>,
    json: bool,
) -> SheetMapResult<()> {
    // Only validated; cell text does not depend on the mapper config.
    load_config(config.as_deref())?;
    let workbook = Workbook::open(&file)?;
    let text = range_text(&workbook, &range, sheet.as_deref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&text)?);
        return Ok(());
    }

    println!("{}", "📋 Sheetmap - Cells".bold().green());
    println!("   Sheet: {}", text.sheet);
    println!("   Range: {}\n", text.range);
    for row in &text.rows {
        println!("   {}", row.join("\t"));
    }
    Ok(())
}
