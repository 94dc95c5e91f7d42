//! CSV ingest into a [`TableView`].
//!
//! Column types are inferred from the cells:
//!
//! - numeric: every non-missing cell parses as a finite `f64`
//! - timestamp: every non-missing cell parses as a date or date-time
//! - string: anything else
//!
//! Missing cells are empty strings or one of [`MISSING_MARKERS`]. A column with
//! no values at all is numeric.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::domain::{Column, TableView};
use crate::error::AppError;

/// Cell contents treated as "no data" (case-insensitive).
pub const MISSING_MARKERS: [&str; 4] = ["na", "nan", "null", "?"];

const DATETIME_FMTS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Read a CSV file into a table.
pub fn read_table(path: &Path) -> Result<TableView, AppError> {
    let file = File::open(path).map_err(|e| AppError::new(4, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let table = read_table_from(file)?;
    debug!(path = %path.display(), rows = table.n_rows(), columns = table.n_columns(), "CSV loaded");
    Ok(table)
}

/// Read CSV text from any reader into a table.
pub fn read_table_from<R: Read>(reader: R) -> Result<TableView, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();

    let mut seen = HashSet::new();
    for h in &headers {
        if h.is_empty() {
            return Err(AppError::new(2, "CSV header contains an empty column name."));
        }
        if !seen.insert(h.as_str()) {
            return Err(AppError::new(2, format!("Duplicate column '{h}' in CSV header.")));
        }
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;
        if record.len() > headers.len() {
            return Err(AppError::new(
                2,
                format!("Line {line} has {} fields but the header has {}.", record.len(), headers.len()),
            ));
        }
        for (col, slot) in cells.iter_mut().enumerate() {
            slot.push(record.get(col).and_then(cell_value));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| infer_column(name, raw))
        .collect();
    TableView::new(columns).map_err(|e| AppError::new(2, format!("Invalid CSV table: {e}")))
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn cell_value(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() || MISSING_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m)) {
        None
    } else {
        Some(s.to_string())
    }
}

fn infer_column(name: String, raw: Vec<Option<String>>) -> Column {
    let numeric: Option<Vec<Option<f64>>> = raw
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(s) => parse_f64(s).map(Some),
        })
        .collect();
    if let Some(values) = numeric {
        return Column::numeric(name, values);
    }

    let stamps: Option<Vec<Option<NaiveDateTime>>> = raw
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(s) => parse_timestamp(s).map(Some),
        })
        .collect();
    if let Some(values) = stamps {
        return Column::timestamp(name, values);
    }

    Column::text(name, raw)
}

fn parse_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a date-time, or a date at midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FMTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
