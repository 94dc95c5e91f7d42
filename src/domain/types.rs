//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - built from CLI arguments (`clap::ValueEnum` on the option enums)
//! - handed to the engines as immutable configuration
//! - exported to JSON alongside saved models

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::frequency::Step;
use crate::domain::series::IndexValue;
use crate::error::{Result, TsError};

/// How seasonal and trend components combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecompositionMode {
    /// `y = trend + seasonal + residual`
    Additive,
    /// `y = trend * seasonal * residual` (strictly positive data only)
    Multiplicative,
}

/// How partial autocorrelations are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PacfMethod {
    /// Durbin–Levinson recursion on the sample ACF.
    DurbinLevinson,
    /// Last coefficient of an OLS regression on `k` lags.
    Ols,
}

/// Time bucket used by the aggregation operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    /// ISO weeks (starting Monday).
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    /// Start of the bucket containing `ts`.
    pub fn truncate(self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = ts.date();
        match self {
            Granularity::Second => ts.with_nanosecond(0),
            Granularity::Minute => ts.with_nanosecond(0)?.with_second(0),
            Granularity::Hour => ts.with_nanosecond(0)?.with_second(0)?.with_minute(0),
            Granularity::Day => date.and_hms_opt(0, 0, 0),
            Granularity::Week => {
                let back = i64::from(date.weekday().num_days_from_monday());
                (date - Duration::days(back)).and_hms_opt(0, 0, 0)
            }
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0),
            Granularity::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1)?.and_hms_opt(0, 0, 0)
            }
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0),
        }
    }

    /// Buckets shorter than a day.
    pub fn is_sub_daily(self) -> bool {
        matches!(self, Granularity::Second | Granularity::Minute | Granularity::Hour)
    }
}

/// Aggregate applied to each time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    Mean,
    Sum,
    Min,
    Max,
    Count,
    /// Sample variance (`n - 1` denominator).
    Variance,
    /// Most frequent value (smallest on ties).
    Mode,
}

/// Non-seasonal ARIMA order `(p, d, q)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

/// Seasonal order `(P, D, Q, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

/// Full model specification for the forecasting engine.
///
/// Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub order: ArimaOrder,
    pub seasonal: Option<SeasonalOrder>,
    /// Exogenous regressor column names (SARIMAX).
    #[serde(default)]
    pub exogenous: Vec<String>,
    /// Fit on `ln(y)` and map forecasts back with `exp`.
    #[serde(default)]
    pub log_transform: bool,
}

impl ModelSpec {
    pub fn arima(p: usize, d: usize, q: usize) -> Self {
        Self {
            order: ArimaOrder { p, d, q },
            seasonal: None,
            exogenous: Vec::new(),
            log_transform: false,
        }
    }

    pub fn with_seasonal(mut self, p: usize, d: usize, q: usize, period: usize) -> Self {
        self.seasonal = Some(SeasonalOrder { p, d, q, period });
        self
    }

    pub fn with_exogenous(mut self, columns: Vec<String>) -> Self {
        self.exogenous = columns;
        self
    }

    pub fn with_log_transform(mut self, on: bool) -> Self {
        self.log_transform = on;
        self
    }

    /// Seasonal order with all-zero orders treated as "no seasonality".
    pub fn active_seasonal(&self) -> Option<SeasonalOrder> {
        self.seasonal.filter(|s| s.p + s.d + s.q > 0)
    }

    /// Check the order constraints that do not depend on data.
    pub fn validate(&self) -> Result<()> {
        let Some(s) = self.active_seasonal() else {
            return Ok(());
        };
        if s.period < 2 {
            return Err(TsError::invalid_parameter(
                "seasonal period",
                format!("must be >= 2 when seasonal orders are set, got {}", s.period),
            ));
        }
        if s.p > 0 && self.order.p >= s.period {
            return Err(TsError::invalid_parameter(
                "p",
                format!(
                    "AR order {} overlaps the seasonal AR lags (must be < period {})",
                    self.order.p, s.period
                ),
            ));
        }
        if s.q > 0 && self.order.q >= s.period {
            return Err(TsError::invalid_parameter(
                "q",
                format!(
                    "MA order {} overlaps the seasonal MA lags (must be < period {})",
                    self.order.q, s.period
                ),
            ));
        }
        Ok(())
    }

    /// Minimum number of training rows: the longest AR or MA lag reach.
    pub fn min_rows(&self) -> usize {
        let seasonal_reach = self
            .active_seasonal()
            .map(|s| (s.period * s.p).max(s.period * s.q))
            .unwrap_or(0);
        self.order.p.max(seasonal_reach).max(1)
    }

    /// Total differencing reach `d + s·D`.
    pub fn differencing_reach(&self) -> usize {
        self.order.d + self.active_seasonal().map(|s| s.d * s.period).unwrap_or(0)
    }

    /// A mean/intercept term is estimated only for undifferenced models.
    pub fn includes_mean(&self) -> bool {
        self.differencing_reach() == 0
    }

    /// Compact label such as `SARIMAX(1,1,1)(0,1,1,12)`.
    pub fn label(&self) -> String {
        let base = if self.exogenous.is_empty() { "ARIMA" } else { "ARIMAX" };
        let o = self.order;
        match self.active_seasonal() {
            Some(s) => format!("S{base}({},{},{})({},{},{},{})", o.p, o.d, o.q, s.p, s.d, s.q, s.period),
            None => format!("{base}({},{},{})", o.p, o.d, o.q),
        }
    }
}

/// Optimizer settings for model estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Hard cap on optimizer iterations.
    pub max_iterations: u64,
    /// Stop when the simplex cost spread falls below this value.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            tolerance: 1e-8,
        }
    }
}

/// One forecast step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub index: IndexValue,
    pub forecast: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Forecasts for a horizon with confidence bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub confidence_level: f64,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    /// `upper_bound - lower_bound` per step.
    pub fn widths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.upper_bound - p.lower_bound).collect()
    }
}

/// ACF/PACF for one lag with their margins of error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagStatistic {
    pub lag: usize,
    pub acf: f64,
    pub acf_margin: f64,
    pub pacf: f64,
    pub pacf_margin: f64,
}

/// MacKinnon critical values for the ADF statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

/// Augmented Dickey–Fuller test (constant, no trend).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lags: usize,
    pub n_obs: usize,
    pub critical_values: CriticalValues,
}

impl AdfResult {
    pub fn is_stationary(&self, threshold: f64) -> bool {
        self.p_value <= threshold
    }
}

/// Output of the diagnostics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    /// Lags `0..=max_lag`, in lag order.
    pub lags: Vec<LagStatistic>,
    /// `None` when the series is too short for the ADF regression.
    pub adf: Option<AdfResult>,
}

/// Output of the decomposition engine; every component has the input length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub mode: DecompositionMode,
    pub period: usize,
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<Option<f64>>,
    pub residual: Vec<Option<f64>>,
}

/// Value column plus optional index column of an input table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSelection {
    pub value_column: String,
    pub index_column: Option<String>,
}

impl SeriesSelection {
    pub fn new(value_column: impl Into<String>, index_column: Option<String>) -> Self {
        Self {
            value_column: value_column.into(),
            index_column,
        }
    }
}

/// Settings for the autocorrelation operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocorrelationConfig {
    pub series: SeriesSelection,
    pub max_lag: usize,
    pub pacf_method: PacfMethod,
    /// Significance level for the margins of error.
    pub alpha: f64,
}

/// Settings for the stationarity operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityConfig {
    pub series: SeriesSelection,
    pub threshold: f64,
    /// Turn a failed test into `NonStationaryError` instead of a report row.
    pub require_stationary: bool,
}

/// Settings for the decomposition operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecomposeConfig {
    pub series: SeriesSelection,
    pub period: usize,
    pub mode: DecompositionMode,
}

/// Settings for the forecasting (learner) operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub series: SeriesSelection,
    pub spec: ModelSpec,
    pub horizon: usize,
    pub confidence_level: f64,
    pub fit: FitOptions,
    /// Expected sampling step; inferred from the index when absent.
    pub frequency: Option<Step>,
    pub frequency_tolerance: f64,
    /// Fewest non-missing training points; never below the model's lag reach.
    pub min_length: Option<usize>,
    /// In-sample predictions use earlier predictions as lagged values.
    pub dynamic: bool,
}

/// Settings for forecasting from a saved model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyConfig {
    pub horizon: usize,
    pub confidence_level: f64,
    /// Saved models carry no training rows, so this only raises the
    /// log-transform warning.
    pub dynamic: bool,
}

/// Settings for the residual analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualsConfig {
    pub column: String,
}

/// Settings for the differencing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferenceConfig {
    pub column: String,
    pub lag: usize,
}

/// Settings for the timestamp alignment operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignConfig {
    pub timestamp_column: String,
    pub step: Step,
    /// Replace the timestamp column instead of appending an aligned copy.
    pub replace_column: bool,
}

/// Settings for the aggregation operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateConfig {
    pub timestamp_column: String,
    pub value_column: String,
    pub granularity: Granularity,
    pub method: AggregationMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seasonal_overlap_is_rejected() {
        let spec = ModelSpec::arima(12, 0, 0).with_seasonal(1, 0, 0, 12);
        assert!(matches!(spec.validate(), Err(TsError::InvalidParameter { .. })));

        let spec = ModelSpec::arima(1, 0, 12).with_seasonal(0, 0, 1, 12);
        assert!(spec.validate().is_err());

        let spec = ModelSpec::arima(1, 0, 1).with_seasonal(1, 1, 1, 1);
        assert!(spec.validate().is_err());

        let spec = ModelSpec::arima(2, 1, 1).with_seasonal(1, 1, 1, 12);
        assert!(spec.validate().is_ok());
        assert_eq!(spec.min_rows(), 12);
        assert_eq!(spec.differencing_reach(), 13);
        assert!(!spec.includes_mean());
    }

    #[test]
    fn zero_seasonal_orders_are_ignored() {
        let spec = ModelSpec::arima(1, 0, 0).with_seasonal(0, 0, 0, 0);
        assert!(spec.validate().is_ok());
        assert_eq!(spec.label(), "ARIMA(1,0,0)");
    }

    #[test]
    fn truncates_to_quarter_and_week() {
        let ts = NaiveDate::from_ymd_opt(2024, 8, 15).unwrap().and_hms_opt(13, 5, 9).unwrap();
        assert_eq!(
            Granularity::Quarter.truncate(ts).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        // 2024-08-15 is a Thursday.
        assert_eq!(
            Granularity::Week.truncate(ts).unwrap(),
            NaiveDate::from_ymd_opt(2024, 8, 12).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(
            Granularity::Hour.truncate(ts).unwrap(),
            NaiveDate::from_ymd_opt(2024, 8, 15).unwrap().and_hms_opt(13, 0, 0).unwrap()
        );
    }
}
