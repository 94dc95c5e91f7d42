//! Gap-aware time-indexed series.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::frequency::Step;
use crate::error::{Result, TsError};

/// Index of a [`TimeSeries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesIndex {
    /// Row positions `0..n` (no index column was given).
    Implicit(usize),
    /// Explicit integer index.
    Integer(Vec<i64>),
    /// Explicit timestamp index.
    Timestamp(Vec<NaiveDateTime>),
}

/// A single index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    Position(i64),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Position(p) => write!(f, "{p}"),
            IndexValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl SeriesIndex {
    pub fn len(&self) -> usize {
        match self {
            SeriesIndex::Implicit(n) => *n,
            SeriesIndex::Integer(v) => v.len(),
            SeriesIndex::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_explicit(&self) -> bool {
        !matches!(self, SeriesIndex::Implicit(_))
    }

    pub fn get(&self, i: usize) -> Option<IndexValue> {
        match self {
            SeriesIndex::Implicit(n) => (i < *n).then_some(IndexValue::Position(i as i64)),
            SeriesIndex::Integer(v) => v.get(i).copied().map(IndexValue::Position),
            SeriesIndex::Timestamp(v) => v.get(i).copied().map(IndexValue::Timestamp),
        }
    }

    pub fn values(&self) -> Vec<IndexValue> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    /// Steps between consecutive entries (length `n - 1`).
    pub fn gaps(&self) -> Vec<Step> {
        match self {
            SeriesIndex::Implicit(n) => vec![Step::Positions(1); n.saturating_sub(1)],
            SeriesIndex::Integer(v) => v.windows(2).map(|w| Step::between_positions(w[0], w[1])).collect(),
            SeriesIndex::Timestamp(v) => v.windows(2).map(|w| Step::between_timestamps(w[0], w[1])).collect(),
        }
    }

    /// Index entries for `horizon` steps past the last entry.
    pub fn extend(&self, step: Step, horizon: usize) -> Result<Vec<IndexValue>> {
        let overflow = || TsError::InvalidData("forecast index overflows the index type".to_string());
        let mut out = Vec::with_capacity(horizon);
        for k in 1..=horizon {
            let k = u32::try_from(k).map_err(|_| overflow())?;
            let next = match self {
                SeriesIndex::Implicit(n) => IndexValue::Position(*n as i64 - 1 + i64::from(k)),
                SeriesIndex::Integer(v) => {
                    let last = *v.last().ok_or_else(|| TsError::InsufficientData { required: 1, actual: 0 })?;
                    IndexValue::Position(step.advance_position(last, k).ok_or_else(overflow)?)
                }
                SeriesIndex::Timestamp(v) => {
                    let last = *v.last().ok_or_else(|| TsError::InsufficientData { required: 1, actual: 0 })?;
                    IndexValue::Timestamp(step.advance_timestamp(last, k).ok_or_else(overflow)?)
                }
            };
            out.push(next);
        }
        Ok(out)
    }

    /// Keep only what [`SeriesIndex::extend`] needs: the last entry (or the
    /// length of an implicit index).
    pub fn tail(&self) -> SeriesIndex {
        match self {
            SeriesIndex::Implicit(n) => SeriesIndex::Implicit(*n),
            SeriesIndex::Integer(v) => SeriesIndex::Integer(v.last().copied().into_iter().collect()),
            SeriesIndex::Timestamp(v) => SeriesIndex::Timestamp(v.last().copied().into_iter().collect()),
        }
    }
}

/// Ordered `(index, value)` pairs; `None` marks "no data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    /// Column the explicit index came from.
    pub index_name: Option<String>,
    pub index: SeriesIndex,
    pub values: Vec<Option<f64>>,
}

impl TimeSeries {
    /// Build a series, checking that the index is strictly increasing and that
    /// index and values have the same length.
    pub fn new(
        name: impl Into<String>,
        index_name: Option<String>,
        index: SeriesIndex,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        if index.len() != values.len() {
            return Err(TsError::IndexMismatch(format!(
                "index has {} entries but there are {} values",
                index.len(),
                values.len()
            )));
        }
        let increasing = match &index {
            SeriesIndex::Implicit(_) => true,
            SeriesIndex::Integer(v) => v.windows(2).all(|w| w[0] < w[1]),
            SeriesIndex::Timestamp(v) => v.windows(2).all(|w| w[0] < w[1]),
        };
        if !increasing {
            return Err(TsError::UnsortedIndex("index entries must be strictly increasing".to_string()));
        }
        Ok(Self {
            name: name.into(),
            index_name,
            index,
            values: values.into_iter().map(|v| v.filter(|x| x.is_finite())).collect(),
        })
    }

    /// Series over an implicit `0..n` index with no gaps.
    pub fn from_values(name: impl Into<String>, values: &[f64]) -> Self {
        Self {
            name: name.into(),
            index_name: None,
            index: SeriesIndex::Implicit(values.len()),
            values: values.iter().map(|&v| Some(v).filter(|x| x.is_finite())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn observed_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(Option::is_none)
    }

    /// Non-missing values in index order.
    pub fn observed(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    /// All values, failing with `MissingDataError` on the first gap.
    pub fn dense_values(&self) -> Result<Vec<f64>> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| {
                    let at = self.index.get(i).map(|x| x.to_string()).unwrap_or_else(|| i.to_string());
                    TsError::MissingData(format!("'{}' has no value at index {at}", self.name))
                })
            })
            .collect()
    }

    /// Same index, new values and name.
    pub fn with_values(&self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<TimeSeries> {
        TimeSeries::new(name, self.index_name.clone(), self.index.clone(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn rejects_non_increasing_index() {
        let err = TimeSeries::new(
            "y",
            Some("t".into()),
            SeriesIndex::Integer(vec![1, 3, 3]),
            vec![Some(1.0), Some(2.0), Some(3.0)],
        )
        .unwrap_err();
        assert!(matches!(err, TsError::UnsortedIndex(_)));
    }

    #[test]
    fn nan_values_become_gaps() {
        let s = TimeSeries::from_values("y", &[1.0, f64::NAN, 3.0]);
        assert_eq!(s.observed_count(), 2);
        assert!(matches!(s.dense_values(), Err(TsError::MissingData(_))));
    }

    #[test]
    fn extends_monthly_timestamp_index() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let idx = SeriesIndex::Timestamp(vec![start]);
        let next = idx.extend(Step::Months(1), 2).unwrap();
        assert_eq!(
            next[1],
            IndexValue::Timestamp(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn implicit_index_continues_positions() {
        let idx = SeriesIndex::Implicit(5);
        let next = idx.extend(Step::Positions(1), 3).unwrap();
        assert_eq!(next, vec![IndexValue::Position(5), IndexValue::Position(6), IndexValue::Position(7)]);
    }
}
