//! Timestamp alignment: fill the gaps of a timestamp column with empty rows.
//!
//! The regular grid runs from the earliest to the latest timestamp in steps of
//! the configured frequency. Grid points that do not occur in the input are
//! added as rows whose other cells are missing. Input rows are never dropped,
//! even when they sit off the grid.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::domain::{AlignConfig, Column, ColumnValues, Step, TableView};
use crate::error::{Result, TsError};

/// Upper bound on generated grid points.
const MAX_GRID_POINTS: usize = 10_000_000;

/// Name of the aligned copy when the original column is kept.
pub fn aligned_column_name(column: &str) -> String {
    format!("{column} (Aligned)")
}

/// Regular grid from `start` to `end` (inclusive when it lands on the grid).
pub fn timestamp_grid(start: NaiveDateTime, end: NaiveDateTime, step: Step) -> Result<Vec<NaiveDateTime>> {
    if matches!(step, Step::Positions(_)) {
        return Err(TsError::invalid_parameter(
            "frequency",
            "alignment needs a calendar step (S, min, H, D, W, M, Q or Y)",
        ));
    }
    let mut grid = vec![start];
    for k in 1u32.. {
        let next = step
            .advance_timestamp(start, k)
            .ok_or_else(|| TsError::invalid_parameter("frequency", format!("{step} overflows the timestamp range")))?;
        if next > end {
            break;
        }
        if grid.len() >= MAX_GRID_POINTS {
            return Err(TsError::invalid_parameter(
                "frequency",
                format!("{step} would create more than {MAX_GRID_POINTS} rows"),
            ));
        }
        grid.push(next);
    }
    Ok(grid)
}

pub fn align(table: &TableView, config: &AlignConfig) -> Result<TableView> {
    let stamps = table.timestamps(&config.timestamp_column)?;
    if let Some(row) = stamps.iter().position(Option::is_none) {
        return Err(TsError::MissingData(format!(
            "'{}' has no timestamp in row {}",
            config.timestamp_column,
            row + 1
        )));
    }
    let present: Vec<NaiveDateTime> = stamps.iter().flatten().copied().collect();
    let (Some(&start), Some(&end)) = (present.iter().min(), present.iter().max()) else {
        return Ok(table.clone());
    };

    let seen: HashSet<NaiveDateTime> = present.iter().copied().collect();
    let added: Vec<NaiveDateTime> = timestamp_grid(start, end, config.step)?
        .into_iter()
        .filter(|ts| !seen.contains(ts))
        .collect();

    // (aligned timestamp, source row or None for an added row), sorted stably.
    let mut rows: Vec<(NaiveDateTime, Option<usize>)> = present
        .iter()
        .enumerate()
        .map(|(i, &ts)| (ts, Some(i)))
        .chain(added.iter().map(|&ts| (ts, None)))
        .collect();
    rows.sort_by_key(|(ts, _)| *ts);

    let sources: Vec<Option<usize>> = rows.iter().map(|(_, src)| *src).collect();
    let aligned: Vec<Option<NaiveDateTime>> = rows.iter().map(|(ts, _)| Some(*ts)).collect();

    let mut columns = Vec::with_capacity(table.n_columns() + 1);
    for column in table.columns() {
        if column.name == config.timestamp_column {
            if config.replace_column {
                columns.push(Column::timestamp(column.name.clone(), aligned.clone()));
            } else {
                columns.push(Column {
                    name: column.name.clone(),
                    values: column.values.take_or_missing(&sources),
                });
                columns.push(Column {
                    name: aligned_column_name(&column.name),
                    values: ColumnValues::Timestamp(aligned.clone()),
                });
            }
        } else {
            columns.push(Column {
                name: column.name.clone(),
                values: column.values.take_or_missing(&sources),
            });
        }
    }

    debug!(
        column = %config.timestamp_column,
        step = %config.step,
        added = added.len(),
        "timestamps aligned"
    );
    TableView::new(columns)
}
