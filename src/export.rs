//! Post-processing and persistence of a consolidated dataset.
//!
//! Metric columns come back from the API as decimal strings; they are coerced
//! to numbers, gaps are filled, and identifying columns are moved to the front
//! before the dataset is written as CSV (with a UTF-8 BOM, so spreadsheet
//! tools pick the right encoding) or as JSON.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::{Number, Value};
use tracing::{info, warn};

use crate::aggregator::{ACCOUNT_COLUMN, ConsolidatedDataset, Extraction};
use crate::error::HarvestError;
use crate::report::{KnownField, Record};

/// Columns moved to the front, in this order, when present.
const LEADING_COLUMNS: [&str; 6] = [
    ACCOUNT_COLUMN,
    "date_start",
    "date_stop",
    "campaign_name",
    "adset_name",
    "ad_name",
];

/// Written ahead of the CSV header.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// On-disk format of the consolidated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    /// `.json` selects JSON; anything else is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

/// Prefix of per-action metric columns (e.g. `action_link_click`).
const ACTION_PREFIX: &str = "action_";

fn is_metric_column(name: &str) -> bool {
    name.starts_with(ACTION_PREFIX) || KnownField::parse(name).is_some_and(KnownField::is_metric)
}

/// Parse a metric value into a JSON number; `None` when unparseable.
fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::Number(i.into()));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

/// A cleaned, rectangular dataset ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

/// Coerce metrics, fill gaps and reorder columns.
///
/// Every output row has a value for every column: `0` for metric columns,
/// `""` for the rest.
pub fn clean(dataset: ConsolidatedDataset) -> CleanDataset {
    let mut columns: Vec<String> = LEADING_COLUMNS
        .iter()
        .filter(|c| dataset.columns.iter().any(|d| d == *c))
        .map(|c| c.to_string())
        .collect();
    columns.extend(
        dataset
            .columns
            .iter()
            .filter(|c| !LEADING_COLUMNS.contains(&c.as_str()))
            .cloned(),
    );

    let metric: Vec<bool> = columns.iter().map(|c| is_metric_column(c)).collect();

    let rows = dataset
        .rows
        .into_iter()
        .map(|row| {
            let mut map = row.into_map();
            columns
                .iter()
                .zip(&metric)
                .map(|(col, &is_metric)| {
                    let value = map.remove(col).unwrap_or(Value::Null);
                    let value = if is_metric {
                        coerce_number(&value).unwrap_or(Value::Number(0.into()))
                    } else if value.is_null() {
                        Value::String(String::new())
                    } else {
                        value
                    };
                    (col.clone(), value)
                })
                .collect::<Record>()
        })
        .collect();

    CleanDataset { columns, rows }
}

/// Clean and write `extraction` to `path` in `format`.
///
/// Returns `false` without touching the file system when there is no data.
pub fn write(
    extraction: Extraction,
    path: &Path,
    format: OutputFormat,
) -> Result<bool, HarvestError> {
    let dataset = match extraction {
        Extraction::Data(dataset) => dataset,
        Extraction::NoData => {
            warn!("no data to process or save");
            return Ok(false);
        }
    };

    let cleaned = clean(dataset);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    match format {
        OutputFormat::Csv => write_csv(&cleaned, path)?,
        OutputFormat::Json => fs::write(path, serde_json::to_string_pretty(&cleaned)?)?,
    }
    info!(path = %path.display(), format = ?format, rows = cleaned.rows.len(), "consolidated report saved");
    Ok(true)
}

fn write_csv(cleaned: &CleanDataset, path: &Path) -> Result<(), HarvestError> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&cleaned.columns)?;
    for row in &cleaned.rows {
        writer.write_record(cleaned.columns.iter().map(|col| cell(row.get(col))))?;
    }
    writer.flush()?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
