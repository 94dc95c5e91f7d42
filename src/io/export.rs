//! CSV export of result tables.
//!
//! Missing cells are written as empty strings, the same convention ingest
//! accepts. Timestamp columns drop the time of day when every value sits on
//! midnight.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Timelike};

use crate::domain::{ColumnValues, TableView};
use crate::error::AppError;

/// Write a table as CSV to any writer.
pub fn write_table_to<W: Write>(writer: W, table: &TableView) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table.column_names())
        .map_err(|e| AppError::new(4, format!("Failed to write CSV header: {e}")))?;

    let rendered: Vec<Vec<String>> = table.columns().iter().map(|c| render_column(&c.values)).collect();
    for row in 0..table.n_rows() {
        out.write_record(rendered.iter().map(|col| col[row].as_str()))
            .map_err(|e| AppError::new(4, format!("Failed to write CSV row {}: {e}", row + 1)))?;
    }
    out.flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush CSV output: {e}")))?;
    Ok(())
}

/// Write a table to a CSV file.
pub fn write_table_csv(path: &Path, table: &TableView) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_table_to(file, table)
}

/// Output path for a named result table: `<prefix>_<name>.csv`.
pub fn output_path(prefix: &Path, name: &str) -> PathBuf {
    let stem = prefix
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = stem.strip_suffix(".csv").unwrap_or(&stem).to_string();
    prefix.with_file_name(format!("{stem}_{name}.csv"))
}

fn render_column(values: &ColumnValues) -> Vec<String> {
    match values {
        ColumnValues::Numeric(v) => v.iter().map(|x| x.map(|x| x.to_string()).unwrap_or_default()).collect(),
        ColumnValues::Timestamp(v) => {
            let date_only = v
                .iter()
                .flatten()
                .all(|ts| ts.num_seconds_from_midnight() == 0 && ts.nanosecond() == 0);
            v.iter().map(|ts| ts.map(|ts| format_timestamp(ts, date_only)).unwrap_or_default()).collect()
        }
        ColumnValues::Text(v) => v.iter().map(|s| s.clone().unwrap_or_default()).collect(),
    }
}

fn format_timestamp(ts: NaiveDateTime, date_only: bool) -> String {
    if date_only {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
