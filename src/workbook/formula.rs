//! Cached results for formula cells
//!
//! Evaluation is delegated to xlformula_engine. `ROW()`/`COLUMN()` are
//! replaced by the cell's own coordinates and absolute markers are dropped
//! before parsing; references resolve to values on the same sheet. Results
//! carry the engine's f32 precision.

use super::cell::CellValue;
use super::Sheet;
use crate::address::CellAddress;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use xlformula_engine::{calculate, parse_formula, types, NoCustomFunction};

/// Evaluate `formula` as if it sat in `at`.
pub fn evaluate(sheet: &Sheet, at: CellAddress, formula: &str) -> Option<CellValue> {
    let prepared = prepare(formula, at);
    let resolver = |name: String| -> types::Value {
        match name.parse::<CellAddress>() {
            Ok(address) if address != at => to_engine_value(sheet, address),
            _ => types::Value::Error(types::Error::Value),
        }
    };
    let parsed = parse_formula::parse_string_to_formula(&prepared, None::<NoCustomFunction>);
    let result = calculate::calculate_formula(parsed, Some(&resolver));
    match result {
        types::Value::Number(n) => Some(CellValue::Number(round_engine_number(n))),
        types::Value::Text(s) => Some(CellValue::Text(s)),
        types::Value::Boolean(b) => Some(CellValue::Bool(matches!(b, types::Boolean::True))),
        other => {
            debug!("Formula '{}' at {} not evaluated: {:?}", formula, at, other);
            None
        }
    }
}

/// Fill empty cached values of every formula cell on the sheet.
pub fn recalculate_sheet(sheet: &mut Sheet) {
    let pending: Vec<(CellAddress, String)> = sheet
        .cells()
        .filter_map(|(address, cell)| {
            cell.formula
                .as_ref()
                .filter(|_| cell.value == CellValue::Empty)
                .map(|f| (*address, f.clone()))
        })
        .collect();
    for (address, formula) in pending {
        if let Some(value) = evaluate(sheet, address, &formula) {
            sheet.cell_mut(address).value = value;
        }
    }
}

static ROW_CALL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\bROW\(\s*\)").ok());
static COLUMN_CALL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bCOLUMN\(\s*\)").ok());

fn prepare(formula: &str, at: CellAddress) -> String {
    let body = formula.trim().trim_start_matches('=');
    let body = substitute(&ROW_CALL, body, at.row_number());
    let body = substitute(&COLUMN_CALL, &body, at.column_number());
    format!("={}", body.replace('$', ""))
}

fn substitute(call: &Option<Regex>, body: &str, number: u32) -> String {
    match call {
        Some(re) => re.replace_all(body, number.to_string().as_str()).into_owned(),
        None => body.to_string(),
    }
}

fn to_engine_value(sheet: &Sheet, address: CellAddress) -> types::Value {
    match sheet.value(address) {
        CellValue::Number(n) => types::Value::Number(*n as f32),
        CellValue::Text(s) => types::Value::Text(s.clone()),
        CellValue::Bool(true) => types::Value::Boolean(types::Boolean::True),
        CellValue::Bool(false) => types::Value::Boolean(types::Boolean::False),
        CellValue::DateTime(dt) => {
            types::Value::Number(super::display::datetime_to_serial(dt, sheet.date1904()) as f32)
        }
        CellValue::Empty => types::Value::Number(0.0),
        CellValue::Error(_) => types::Value::Error(types::Error::Value),
    }
}

/// Round away f32 noise the same way displayed numbers are rounded.
fn round_engine_number(n: f32) -> f64 {
    let value = n as f64;
    (value * 1e6).round() / 1e6
}
