//! Aggregation of a value column over calendar buckets.
//!
//! Zoned timestamps (an explicit UTC offset such as `+02:00`) arrive from the
//! CSV ingest as text. They are bucketed on their local wall-clock time and
//! the offset is written back for sub-daily buckets; daily and coarser
//! buckets are plain dates.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use tracing::{debug, warn};

use crate::domain::{AggregateConfig, AggregationMethod, Column, ColumnType, ColumnValues, TableView};
use crate::error::{Result, TsError};
use crate::math::{mean, variance};

/// Apply `method` to the non-missing values of one bucket.
pub fn aggregate_values(values: &[f64], method: AggregationMethod) -> Option<f64> {
    match method {
        AggregationMethod::Count => Some(values.len() as f64),
        AggregationMethod::Sum => Some(values.iter().sum()),
        AggregationMethod::Mean => mean(values),
        AggregationMethod::Min => values.iter().copied().min_by(f64::total_cmp),
        AggregationMethod::Max => values.iter().copied().max_by(f64::total_cmp),
        AggregationMethod::Variance => variance(values, 1),
        AggregationMethod::Mode => mode(values),
    }
}

/// Most frequent value; the smallest one wins ties.
fn mode(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut best: Option<(f64, usize)> = None;
    for run in sorted.chunk_by(|a, b| a == b) {
        if best.is_none_or(|(_, count)| run.len() > count) {
            best = Some((run[0], run.len()));
        }
    }
    best.map(|(v, _)| v)
}

const ZONED_FMTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse a timestamp carrying a UTC offset.
pub fn parse_zoned_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| ZONED_FMTS.iter().find_map(|fmt| DateTime::parse_from_str(s, fmt).ok()))
}

/// Local timestamps of the bucketing column, plus per-row offsets when the
/// column holds zoned text.
fn bucket_times(
    table: &TableView,
    name: &str,
) -> Result<(Vec<Option<NaiveDateTime>>, Option<Vec<Option<FixedOffset>>>)> {
    match &table.require(name)?.values {
        ColumnValues::Timestamp(v) => Ok((v.clone(), None)),
        ColumnValues::Text(cells) => {
            let mut local = Vec::with_capacity(cells.len());
            let mut offsets = Vec::with_capacity(cells.len());
            for cell in cells {
                let zoned = match cell {
                    Some(s) => Some(parse_zoned_timestamp(s).ok_or_else(|| TsError::TypeMismatch {
                        column: name.to_string(),
                        expected: ColumnType::Timestamp.to_string(),
                        found: format!("text ('{s}' is not a date-time)"),
                    })?),
                    None => None,
                };
                local.push(zoned.map(|ts| ts.naive_local()));
                offsets.push(zoned.map(|ts| *ts.offset()));
            }
            Ok((local, Some(offsets)))
        }
        ColumnValues::Numeric(_) => Err(TsError::TypeMismatch {
            column: name.to_string(),
            expected: ColumnType::Timestamp.to_string(),
            found: ColumnType::Numeric.to_string(),
        }),
    }
}

#[derive(Default)]
struct Bucket {
    values: Vec<f64>,
    /// Offset of the first zoned row in the bucket.
    offset: Option<FixedOffset>,
}

/// One row per bucket, in time order: `(bucket start, aggregate)`.
pub fn aggregate(table: &TableView, config: &AggregateConfig) -> Result<TableView> {
    let (stamps, offsets) = bucket_times(table, &config.timestamp_column)?;
    let values = table.numeric(&config.value_column)?;

    let mut buckets: BTreeMap<NaiveDateTime, Bucket> = BTreeMap::new();
    let mut skipped = 0usize;
    for (row, (ts, v)) in stamps.iter().zip(values).enumerate() {
        let Some(ts) = ts else {
            skipped += 1;
            continue;
        };
        let key = config.granularity.truncate(*ts).ok_or_else(|| {
            TsError::InvalidData(format!("cannot truncate {ts} to a {:?} bucket", config.granularity))
        })?;
        let bucket = buckets.entry(key).or_default();
        if bucket.offset.is_none() {
            bucket.offset = offsets.as_ref().and_then(|o| o[row]);
        }
        if let Some(v) = v {
            bucket.values.push(*v);
        }
    }
    if skipped > 0 {
        warn!(column = %config.timestamp_column, skipped, "rows without a timestamp were skipped");
    }

    let aggregated: Vec<Option<f64>> = buckets
        .values()
        .map(|b| aggregate_values(&b.values, config.method))
        .collect();
    let name = config.timestamp_column.clone();
    let keys = match offsets {
        Some(_) if config.granularity.is_sub_daily() => Column::text(
            name,
            buckets
                .iter()
                .map(|(k, b)| {
                    b.offset
                        .and_then(|o| o.from_local_datetime(k).single())
                        .map(|ts| ts.to_rfc3339())
                })
                .collect(),
        ),
        Some(_) => {
            debug!(granularity = ?config.granularity, "offsets dropped for daily or coarser buckets");
            Column::timestamp(name, buckets.keys().map(|k| Some(*k)).collect())
        }
        None => Column::timestamp(name, buckets.keys().map(|k| Some(*k)).collect()),
    };

    debug!(
        column = %config.value_column,
        granularity = ?config.granularity,
        method = ?config.method,
        buckets = aggregated.len(),
        "column aggregated"
    );
    TableView::new(vec![keys, Column::numeric(config.value_column.clone(), aggregated)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Granularity;
    use chrono::NaiveDate;

    fn at(m: u32, d: u32, h: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap().and_hms_opt(h, 0, 0)
    }

    fn table() -> TableView {
        TableView::new(vec![
            Column::timestamp("ts", vec![at(1, 1, 3), at(1, 1, 9), at(1, 2, 0), at(2, 5, 0), None]),
            Column::numeric("y", vec![Some(2.0), Some(4.0), None, Some(7.0), Some(100.0)]),
        ])
        .unwrap()
    }

    fn config(granularity: Granularity, method: AggregationMethod) -> AggregateConfig {
        AggregateConfig {
            timestamp_column: "ts".into(),
            value_column: "y".into(),
            granularity,
            method,
        }
    }

    #[test]
    fn daily_sum_skips_missing_values() {
        let out = aggregate(&table(), &config(Granularity::Day, AggregationMethod::Sum)).unwrap();
        assert_eq!(out.n_rows(), 3);
        assert_eq!(out.numeric("y").unwrap(), &[Some(6.0), Some(0.0), Some(7.0)]);
        assert_eq!(out.timestamps("ts").unwrap()[0], at(1, 1, 0));
    }

    #[test]
    fn monthly_mean_and_empty_bucket_variance() {
        let out = aggregate(&table(), &config(Granularity::Month, AggregationMethod::Mean)).unwrap();
        assert_eq!(out.numeric("y").unwrap(), &[Some(3.0), Some(7.0)]);
        let out = aggregate(&table(), &config(Granularity::Month, AggregationMethod::Variance)).unwrap();
        assert_eq!(out.numeric("y").unwrap(), &[Some(2.0), None]);
    }

    #[test]
    fn mode_prefers_the_smallest_on_ties() {
        assert_eq!(aggregate_values(&[3.0, 1.0, 3.0, 1.0, 2.0], AggregationMethod::Mode), Some(1.0));
        assert_eq!(aggregate_values(&[5.0, 2.0, 5.0], AggregationMethod::Mode), Some(5.0));
        assert_eq!(aggregate_values(&[], AggregationMethod::Mode), None);
        assert_eq!(aggregate_values(&[], AggregationMethod::Count), Some(0.0));
    }

    fn zoned_table() -> TableView {
        let cells = [
            "2024-03-01T10:15:00+02:00",
            "2024-03-01T10:45:00+02:00",
            "2024-03-01T11:05:00+02:00",
            "2024-03-02T09:00:00+02:00",
        ];
        TableView::new(vec![
            Column::text("ts", cells.iter().map(|c| Some(c.to_string())).collect()),
            Column::numeric("y", vec![Some(1.0), Some(3.0), Some(5.0), Some(7.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn hourly_buckets_keep_the_utc_offset() {
        let out = aggregate(&zoned_table(), &config(Granularity::Hour, AggregationMethod::Mean)).unwrap();
        assert_eq!(out.numeric("y").unwrap(), &[Some(2.0), Some(5.0), Some(7.0)]);
        match &out.column("ts").unwrap().values {
            ColumnValues::Text(keys) => {
                assert_eq!(keys[0].as_deref(), Some("2024-03-01T10:00:00+02:00"));
                assert_eq!(keys[2].as_deref(), Some("2024-03-02T09:00:00+02:00"));
            }
            other => panic!("expected zoned text keys, got {:?}", other.column_type()),
        }
    }

    #[test]
    fn daily_buckets_of_zoned_input_are_plain_dates() {
        let out = aggregate(&zoned_table(), &config(Granularity::Day, AggregationMethod::Count)).unwrap();
        assert_eq!(out.timestamps("ts").unwrap(), &[at(3, 1, 0), at(3, 2, 0)]);
        assert_eq!(out.numeric("y").unwrap(), &[Some(3.0), Some(1.0)]);
    }

    #[test]
    fn text_that_is_not_a_date_time_is_rejected() {
        let table = TableView::new(vec![
            Column::text("ts", vec![Some("north".to_string())]),
            Column::numeric("y", vec![Some(1.0)]),
        ])
        .unwrap();
        let err = aggregate(&table, &config(Granularity::Day, AggregationMethod::Sum)).unwrap_err();
        assert!(matches!(err, TsError::TypeMismatch { .. }));
        assert!(parse_zoned_timestamp("2024-03-01 10:15:00+0530").is_some());
    }
}
