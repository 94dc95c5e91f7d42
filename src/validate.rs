//! Validation layer: per-operation preconditions on a series.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. enough non-missing points
//! 2. no missing values (unless explicitly allowed; nothing is imputed)
//! 3. regular sampling frequency
//! 4. stationarity (ADF p-value at or below the threshold)
//!
//! Validation is pure: on success the same series is handed back unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostics::adf_test;
use crate::domain::{ModelSpec, Step, TimeSeries};
use crate::error::{Result, TsError};

/// Preconditions an operation places on its input series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub min_length: usize,
    pub allow_missing: bool,
    pub require_regular_frequency: bool,
    /// Largest tolerated share of gaps that deviate from the dominant step.
    pub frequency_tolerance: f64,
    /// When set, every gap must equal this step.
    pub declared_frequency: Option<Step>,
    pub require_stationary: bool,
    pub stationarity_threshold: f64,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            min_length: 1,
            allow_missing: false,
            require_regular_frequency: false,
            frequency_tolerance: 0.0,
            declared_frequency: None,
            require_stationary: false,
            stationarity_threshold: 0.05,
        }
    }
}

impl Requirements {
    /// ACF/PACF up to `max_lag` need more points than lags.
    pub fn autocorrelation(max_lag: usize) -> Self {
        Self {
            min_length: max_lag + 1,
            ..Self::default()
        }
    }

    /// Two full seasonal cycles.
    pub fn decomposition(period: usize) -> Self {
        Self {
            min_length: 2 * period,
            ..Self::default()
        }
    }

    pub fn stationarity(threshold: f64, require_stationary: bool) -> Self {
        Self {
            min_length: 6,
            require_stationary,
            stationarity_threshold: threshold,
            ..Self::default()
        }
    }

    /// Training requirements for a model: the longest lag reach, regular
    /// sampling so forecasts can be placed on the index.
    pub fn forecast(spec: &ModelSpec) -> Self {
        Self {
            min_length: spec.min_rows(),
            require_regular_frequency: true,
            ..Self::default()
        }
    }

    pub fn with_min_length(mut self, n: usize) -> Self {
        self.min_length = n;
        self
    }

    pub fn with_allow_missing(mut self, allow: bool) -> Self {
        self.allow_missing = allow;
        self
    }

    pub fn with_frequency(mut self, declared: Option<Step>, tolerance: f64) -> Self {
        self.require_regular_frequency = true;
        self.declared_frequency = declared;
        self.frequency_tolerance = tolerance;
        self
    }
}

/// Dominant step of an index and how many gaps deviate from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyReport {
    pub step: Step,
    pub deviating: usize,
    pub total: usize,
}

impl FrequencyReport {
    pub fn deviating_share(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.deviating as f64 / self.total as f64
        }
    }
}

/// Infer the most common step between consecutive index entries.
///
/// Ties go to the smaller step. Returns `None` for fewer than two entries.
pub fn infer_frequency(series: &TimeSeries) -> Option<FrequencyReport> {
    let gaps = series.index.gaps();
    let mut counts: BTreeMap<Step, usize> = BTreeMap::new();
    for g in &gaps {
        *counts.entry(*g).or_default() += 1;
    }
    let (step, count) = counts
        .iter()
        .fold(None::<(Step, usize)>, |best, (&s, &c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((s, c)),
        })?;
    Some(FrequencyReport {
        step,
        deviating: gaps.len() - count,
        total: gaps.len(),
    })
}

/// Check `series` against `req`, returning it unchanged on success.
pub fn validate<'a>(series: &'a TimeSeries, req: &Requirements) -> Result<&'a TimeSeries> {
    let observed = series.observed_count();
    if observed < req.min_length {
        return Err(TsError::InsufficientData {
            required: req.min_length,
            actual: observed,
        });
    }

    if !req.allow_missing && series.has_missing() {
        let missing = series.len() - observed;
        return Err(TsError::MissingData(format!(
            "'{}' has {missing} missing value(s); fill or drop them first",
            series.name
        )));
    }

    if req.require_regular_frequency {
        check_frequency(series, req)?;
    }

    if req.require_stationary {
        let adf = adf_test(&series.observed(), None)?;
        if !adf.is_stationary(req.stationarity_threshold) {
            return Err(TsError::NonStationary {
                p_value: adf.p_value,
                threshold: req.stationarity_threshold,
            });
        }
    }

    debug!(series = %series.name, points = series.len(), "series validated");
    Ok(series)
}

fn check_frequency(series: &TimeSeries, req: &Requirements) -> Result<()> {
    let Some(report) = infer_frequency(series) else {
        return Ok(());
    };

    if let (Some(declared), true) = (req.declared_frequency, series.index.is_explicit()) {
        let deviating = series.index.gaps().iter().filter(|g| **g != declared).count();
        if deviating > 0 {
            return Err(TsError::IrregularFrequency(format!(
                "{deviating} of {} gaps differ from the declared step {declared}",
                report.total
            )));
        }
        return Ok(());
    }

    if report.deviating_share() > req.frequency_tolerance {
        return Err(TsError::IrregularFrequency(format!(
            "{} of {} gaps differ from the dominant step {} (tolerance {:.1}%)",
            report.deviating,
            report.total,
            report.step,
            req.frequency_tolerance * 100.0
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate_arima};
    use crate::domain::SeriesIndex;
    use chrono::NaiveDate;

    fn daily(days: &[u32]) -> TimeSeries {
        let index = days
            .iter()
            .map(|&d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
            .collect();
        TimeSeries::new("y", Some("date".into()), SeriesIndex::Timestamp(index), vec![Some(1.0); days.len()])
            .unwrap()
    }

    #[test]
    fn short_series_fails_before_anything_else() {
        let s = TimeSeries::new(
            "y",
            None,
            SeriesIndex::Implicit(10),
            (0..10).map(|i| if i == 3 { None } else { Some(i as f64) }).collect(),
        )
        .unwrap();
        let req = Requirements::default().with_min_length(20);
        let err = validate(&s, &req).unwrap_err();
        assert_eq!(err, TsError::InsufficientData { required: 20, actual: 9 });
    }

    #[test]
    fn missing_values_fail_unless_allowed() {
        let s = TimeSeries::new("y", None, SeriesIndex::Implicit(3), vec![Some(1.0), None, Some(2.0)]).unwrap();
        assert!(matches!(validate(&s, &Requirements::default()), Err(TsError::MissingData(_))));
        let req = Requirements::default().with_allow_missing(true);
        assert_eq!(validate(&s, &req).unwrap(), &s);
    }

    #[test]
    fn irregular_index_is_detected() {
        let s = daily(&[1, 2, 3, 5, 6]);
        let report = infer_frequency(&s).unwrap();
        assert_eq!(report.step, Step::Seconds(86_400));
        assert_eq!(report.deviating, 1);

        let strict = Requirements::default().with_frequency(None, 0.0);
        assert!(matches!(validate(&s, &strict), Err(TsError::IrregularFrequency(_))));

        let lenient = Requirements::default().with_frequency(None, 0.3);
        assert!(validate(&s, &lenient).is_ok());
    }

    #[test]
    fn declared_frequency_must_match_every_gap() {
        let s = daily(&[1, 2, 3, 4]);
        let req = Requirements::default().with_frequency(Some(Step::Seconds(86_400)), 0.0);
        assert!(validate(&s, &req).is_ok());
        let req = Requirements::default().with_frequency(Some(Step::parse("W").unwrap()), 0.5);
        assert!(matches!(validate(&s, &req), Err(TsError::IrregularFrequency(_))));
    }

    #[test]
    fn random_walk_is_flagged_non_stationary() {
        let noise = simulate_arima(&SimulationSpec::white_noise(300, 21)).unwrap();
        let walk: Vec<f64> = noise
            .iter()
            .scan(0.0, |acc, e| {
                *acc += 1.0 + e;
                Some(*acc)
            })
            .collect();
        let s = TimeSeries::from_values("walk", &walk);
        let req = Requirements::stationarity(0.05, true);
        assert!(matches!(validate(&s, &req), Err(TsError::NonStationary { .. })));

        let stationary = TimeSeries::from_values("noise", &noise);
        assert!(validate(&stationary, &req).is_ok());
    }
}
