//! Reporting utilities: result tables and formatted terminal output.
//!
//! Table builders turn engine outputs into the fixed-column tables callers
//! receive; `format` renders the same results as plain text summaries.

pub mod format;

pub use format::*;

use crate::adapter::{DEFAULT_INDEX_NAME, from_series, index_column};
use crate::diagnostics::ResidualSummary;
use crate::domain::{
    AdfResult, Column, Decomposition, DiagnosticResult, ForecastResult, LagStatistic, TableView, TimeSeries,
};
use crate::error::Result;
use crate::forecast::FittedModel;

/// `lag, acf, acf_margin, pacf, pacf_margin`, one row per lag.
pub fn lag_table(result: &DiagnosticResult) -> Result<TableView> {
    let col = |f: fn(&LagStatistic) -> f64| -> Vec<Option<f64>> { result.lags.iter().map(|l| Some(f(l))).collect() };
    TableView::new(vec![
        Column::numeric("lag", col(|l| l.lag as f64)),
        Column::numeric("acf", col(|l| l.acf)),
        Column::numeric("acf_margin", col(|l| l.acf_margin)),
        Column::numeric("pacf", col(|l| l.pacf)),
        Column::numeric("pacf_margin", col(|l| l.pacf_margin)),
    ])
}

/// `term, value` table.
pub fn summary_table(rows: &[(String, f64)]) -> Result<TableView> {
    TableView::new(vec![
        Column::text("term", rows.iter().map(|(t, _)| Some(t.clone())).collect()),
        Column::numeric(
            "value",
            rows.iter().map(|&(_, v)| if v.is_finite() { Some(v) } else { None }).collect(),
        ),
    ])
}

/// Summary rows of an ADF test; `stationary` is 1 or 0 at `threshold`.
pub fn adf_rows(adf: &AdfResult, threshold: f64) -> Vec<(String, f64)> {
    vec![
        ("adf_statistic".to_string(), adf.statistic),
        ("p_value".to_string(), adf.p_value),
        ("used_lags".to_string(), adf.used_lags as f64),
        ("n_obs".to_string(), adf.n_obs as f64),
        ("critical_value_1%".to_string(), adf.critical_values.one_percent),
        ("critical_value_5%".to_string(), adf.critical_values.five_percent),
        ("critical_value_10%".to_string(), adf.critical_values.ten_percent),
        ("stationary".to_string(), if adf.is_stationary(threshold) { 1.0 } else { 0.0 }),
    ]
}

/// Coefficients with standard errors followed by the fit statistics.
pub fn model_summary_rows(model: &FittedModel) -> Vec<(String, f64)> {
    let mut rows = Vec::with_capacity(2 * model.parameters.len() + 8);
    for p in &model.parameters {
        rows.push((p.name.clone(), p.value));
        rows.push((format!("{}.std_error", p.name), p.std_error.unwrap_or(f64::NAN)));
    }
    rows.extend([
        ("sigma2".to_string(), model.sigma2),
        ("log_likelihood".to_string(), model.loglik),
        ("aic".to_string(), model.aic),
        ("bic".to_string(), model.bic),
        ("mse".to_string(), model.mse),
        ("mae".to_string(), model.mae),
        ("n_obs".to_string(), model.n_obs as f64),
        ("iterations".to_string(), model.iterations as f64),
    ]);
    rows
}

pub fn residual_summary_rows(summary: &ResidualSummary) -> Vec<(String, f64)> {
    summary.rows().into_iter().map(|(t, v)| (t.to_string(), v)).collect()
}

/// `trend, seasonal, residual` on the series index.
pub fn decomposition_table(series: &TimeSeries, dec: &Decomposition) -> Result<TableView> {
    let trend = series.with_values("trend", dec.trend.clone())?;
    let seasonal = series.with_values("seasonal", dec.seasonal.clone())?;
    let residual = series.with_values("residual", dec.residual.clone())?;
    from_series(&[&trend, &seasonal, &residual])
}

/// `residual, in_sample` on the series index.
pub fn in_sample_table(series: &TimeSeries, residuals: &[Option<f64>], in_sample: &[Option<f64>]) -> Result<TableView> {
    let residual = series.with_values("residual", residuals.to_vec())?;
    let fitted = series.with_values("in_sample", in_sample.to_vec())?;
    from_series(&[&residual, &fitted])
}

/// Index column followed by `forecast, lower_bound, upper_bound`.
pub fn forecast_table(index_name: Option<&str>, forecast: &ForecastResult) -> Result<TableView> {
    let index: Vec<_> = forecast.points.iter().map(|p| p.index).collect();
    TableView::new(vec![
        index_column(index_name.unwrap_or(DEFAULT_INDEX_NAME), &index),
        Column::numeric("forecast", forecast.points.iter().map(|p| Some(p.forecast)).collect()),
        Column::numeric("lower_bound", forecast.points.iter().map(|p| Some(p.lower_bound)).collect()),
        Column::numeric("upper_bound", forecast.points.iter().map(|p| Some(p.upper_bound)).collect()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ForecastPoint, IndexValue, SeriesIndex};

    #[test]
    fn lag_table_has_fixed_columns() {
        let result = DiagnosticResult {
            lags: vec![
                LagStatistic { lag: 1, acf: 0.5, acf_margin: 0.2, pacf: 0.5, pacf_margin: 0.2 },
                LagStatistic { lag: 2, acf: 0.25, acf_margin: 0.25, pacf: 0.0, pacf_margin: 0.2 },
            ],
            adf: None,
        };
        let t = lag_table(&result).unwrap();
        assert_eq!(t.column_names(), vec!["lag", "acf", "acf_margin", "pacf", "pacf_margin"]);
        assert_eq!(t.numeric("lag").unwrap(), &[Some(1.0), Some(2.0)]);
    }

    #[test]
    fn summary_table_blanks_non_finite_values() {
        let t = summary_table(&[("a".to_string(), 1.0), ("b".to_string(), f64::NAN)]).unwrap();
        assert_eq!(t.column_names(), vec!["term", "value"]);
        assert_eq!(t.numeric("value").unwrap(), &[Some(1.0), None]);
    }

    #[test]
    fn decomposition_table_keeps_explicit_index() {
        let series = TimeSeries::new(
            "y",
            Some("t".into()),
            SeriesIndex::Integer(vec![10, 11, 12]),
            vec![Some(1.0), Some(2.0), Some(3.0)],
        )
        .unwrap();
        let dec = Decomposition {
            mode: crate::domain::DecompositionMode::Additive,
            period: 2,
            trend: vec![None, Some(2.0), None],
            seasonal: vec![Some(0.0); 3],
            residual: vec![None, Some(0.0), None],
        };
        let t = decomposition_table(&series, &dec).unwrap();
        assert_eq!(t.column_names(), vec!["t", "trend", "seasonal", "residual"]);
        assert_eq!(t.n_rows(), 3);
    }

    #[test]
    fn forecast_table_uses_positions_for_implicit_index() {
        let fc = ForecastResult {
            confidence_level: 0.9,
            points: vec![ForecastPoint {
                index: IndexValue::Position(5),
                forecast: 1.0,
                lower_bound: 0.0,
                upper_bound: 2.0,
            }],
        };
        let t = forecast_table(None, &fc).unwrap();
        assert_eq!(t.column_names(), vec!["index", "forecast", "lower_bound", "upper_bound"]);
        assert_eq!(t.numeric("index").unwrap(), &[Some(5.0)]);
    }
}
