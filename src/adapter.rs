//! Series adapter: `TableView` <-> `TimeSeries`.
//!
//! This is the only place that knows how table columns map onto a series:
//!
//! - the value column must be numeric
//! - the index column (optional) must be a timestamp or integral numeric column
//! - rows are sorted by index; duplicated index entries are an error, never merged
//! - missing value cells become "no data" so the row count is preserved

use std::cmp::Ordering;

use tracing::debug;

use crate::domain::{Column, ColumnType, ColumnValues, IndexValue, SeriesIndex, TableView, TimeSeries};
use crate::error::{Result, TsError};

/// Column name used for an implicit index when one must be emitted.
pub const DEFAULT_INDEX_NAME: &str = "index";

/// Convert one numeric column (optionally indexed by another column) into a series.
pub fn to_series(table: &TableView, value_column: &str, index_column: Option<&str>) -> Result<TimeSeries> {
    let values = table.numeric(value_column)?;

    let Some(index_name) = index_column else {
        return TimeSeries::new(
            value_column,
            None,
            SeriesIndex::Implicit(values.len()),
            values.to_vec(),
        );
    };

    let index_col = table.require(index_name)?;
    let (index, order) = match &index_col.values {
        ColumnValues::Timestamp(stamps) => {
            let stamps = require_present(index_name, stamps)?;
            let order = sorted_order(&stamps, index_name)?;
            (SeriesIndex::Timestamp(order.iter().map(|&i| stamps[i]).collect()), order)
        }
        ColumnValues::Numeric(nums) => {
            let nums = require_present(index_name, nums)?;
            let ints = nums
                .iter()
                .map(|&v| as_integer(v))
                .collect::<Option<Vec<i64>>>()
                .ok_or_else(|| TsError::TypeMismatch {
                    column: index_name.to_string(),
                    expected: "timestamp or integer".to_string(),
                    found: "numeric with fractional values".to_string(),
                })?;
            let order = sorted_order(&ints, index_name)?;
            (SeriesIndex::Integer(order.iter().map(|&i| ints[i]).collect()), order)
        }
        ColumnValues::Text(_) => {
            return Err(TsError::TypeMismatch {
                column: index_name.to_string(),
                expected: "timestamp or integer".to_string(),
                found: ColumnType::Text.to_string(),
            });
        }
    };

    debug!(column = value_column, index = index_name, rows = values.len(), "table converted to series");
    let sorted_values = order.iter().map(|&i| values[i]).collect();
    TimeSeries::new(value_column, Some(index_name.to_string()), index, sorted_values)
}

/// Convert one or more series sharing the same index back into a table.
///
/// An index column is emitted only when the series carries an explicit index,
/// so a single-column round trip through [`to_series`] reproduces the input.
pub fn from_series(series: &[&TimeSeries]) -> Result<TableView> {
    let Some(first) = series.first() else {
        return Err(TsError::invalid_parameter("series", "at least one series is required"));
    };
    for other in &series[1..] {
        if other.index != first.index {
            return Err(TsError::IndexMismatch(format!(
                "'{}' and '{}' are indexed differently",
                first.name, other.name
            )));
        }
    }

    let mut columns = Vec::with_capacity(series.len() + 1);
    if first.index.is_explicit() {
        let name = first.index_name.as_deref().unwrap_or(DEFAULT_INDEX_NAME);
        columns.push(index_column(name, &first.index.values()));
    }
    for s in series {
        columns.push(Column::numeric(s.name.clone(), s.values.clone()));
    }
    TableView::new(columns)
}

/// Build a table column from index entries (timestamps or positions).
pub fn index_column(name: &str, values: &[IndexValue]) -> Column {
    let is_timestamp = values.iter().any(|v| matches!(v, IndexValue::Timestamp(_)));
    if is_timestamp {
        Column::timestamp(
            name,
            values
                .iter()
                .map(|v| match v {
                    IndexValue::Timestamp(ts) => Some(*ts),
                    IndexValue::Position(_) => None,
                })
                .collect(),
        )
    } else {
        Column::numeric(
            name,
            values
                .iter()
                .map(|v| match v {
                    IndexValue::Position(p) => Some(*p as f64),
                    IndexValue::Timestamp(_) => None,
                })
                .collect(),
        )
    }
}

fn require_present<T: Copy>(column: &str, cells: &[Option<T>]) -> Result<Vec<T>> {
    cells
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| TsError::MissingData(format!("index column '{column}' is empty at row {row}")))
        })
        .collect()
}

fn as_integer(v: f64) -> Option<i64> {
    (v.fract() == 0.0 && v.abs() < 9.0e15).then_some(v as i64)
}

/// Stable ordering of rows by index; duplicates fail.
fn sorted_order<T: Ord + std::fmt::Debug>(keys: &[T], column: &str) -> Result<Vec<usize>> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]).then(a.cmp(&b)));
    for w in order.windows(2) {
        if keys[w[0]].cmp(&keys[w[1]]) == Ordering::Equal {
            return Err(TsError::UnsortedIndex(format!(
                "duplicate value {:?} in index column '{column}' (rows {} and {})",
                keys[w[0]], w[0], w[1]
            )));
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn round_trip_single_column_reproduces_table() {
        let table = TableView::new(vec![
            Column::timestamp("date", vec![Some(day(1)), Some(day(2)), Some(day(3))]),
            Column::numeric("sales", vec![Some(1.5), None, Some(3.0)]),
        ])
        .unwrap();

        let series = to_series(&table, "sales", Some("date")).unwrap();
        assert_eq!(series.len(), 3);
        let back = from_series(&[&series]).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn round_trip_without_index() {
        let table = TableView::new(vec![Column::numeric("y", vec![Some(1.0), Some(2.0), None])]).unwrap();
        let series = to_series(&table, "y", None).unwrap();
        assert_eq!(from_series(&[&series]).unwrap(), table);
    }

    #[test]
    fn sorts_rows_by_index() {
        let table = TableView::new(vec![
            Column::numeric("t", vec![Some(3.0), Some(1.0), Some(2.0)]),
            Column::numeric("y", vec![Some(30.0), Some(10.0), Some(20.0)]),
        ])
        .unwrap();
        let series = to_series(&table, "y", Some("t")).unwrap();
        assert_eq!(series.index, SeriesIndex::Integer(vec![1, 2, 3]));
        assert_eq!(series.values, vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let table = TableView::new(vec![
            Column::timestamp("date", vec![Some(day(1)), Some(day(1))]),
            Column::numeric("y", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap();
        let err = to_series(&table, "y", Some("date")).unwrap_err();
        assert!(matches!(err, TsError::UnsortedIndex(_)));
    }

    #[test]
    fn column_errors() {
        let table = TableView::new(vec![
            Column::text("name", vec![Some("a".into())]),
            Column::numeric("y", vec![Some(1.0)]),
            Column::numeric("t", vec![Some(0.5)]),
        ])
        .unwrap();
        assert!(matches!(to_series(&table, "missing", None), Err(TsError::MissingColumn { .. })));
        assert!(matches!(to_series(&table, "name", None), Err(TsError::TypeMismatch { .. })));
        assert!(matches!(to_series(&table, "y", Some("name")), Err(TsError::TypeMismatch { .. })));
        assert!(matches!(to_series(&table, "y", Some("t")), Err(TsError::TypeMismatch { .. })));
    }

    #[test]
    fn missing_index_cell_is_missing_data() {
        let table = TableView::new(vec![
            Column::timestamp("date", vec![Some(day(1)), None]),
            Column::numeric("y", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap();
        assert!(matches!(to_series(&table, "y", Some("date")), Err(TsError::MissingData(_))));
    }

    #[test]
    fn mismatched_indices_fail() {
        let a = TimeSeries::from_values("a", &[1.0, 2.0]);
        let b = TimeSeries::from_values("b", &[1.0, 2.0, 3.0]);
        assert!(matches!(from_series(&[&a, &b]), Err(TsError::IndexMismatch(_))));

        let c = TimeSeries::from_values("c", &[5.0, 6.0]);
        let table = from_series(&[&a, &c]).unwrap();
        assert_eq!(table.column_names(), vec!["a", "c"]);
    }
}
