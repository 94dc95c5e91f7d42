//! Pipeline orchestrator shared by every `tsa` command.
//!
//! Each operation runs `adapter -> validation -> engine -> adapter` in order.
//! The first failing step stops the run: the typed error is wrapped in an
//! [`ErrorReport`] naming the operation and no partial tables are returned.
//!
//! Operations never touch the filesystem; the caller reads inputs and writes
//! the named output tables.

use tracing::{info, warn};

use crate::adapter::to_series;
use crate::decompose::decompose;
use crate::diagnostics::{ResidualSummary, adf_test, analyze_residuals, compute_acf_pacf, cumulative_sums};
use crate::domain::{
    AdfResult, AggregateConfig, AlignConfig, ApplyConfig, AutocorrelationConfig, Column, DecomposeConfig,
    Decomposition, DiagnosticResult, DifferenceConfig, ForecastConfig, ForecastResult, ModelSpec, ResidualsConfig,
    StationarityConfig, TableView, TimeSeries,
};
use crate::error::{ErrorReport, Result, TsError};
use crate::forecast::{FitResult, FittedModel, ForecastEngine};
use crate::report::{
    adf_rows, decomposition_table, forecast_table, in_sample_table, lag_table, model_summary_rows,
    residual_summary_rows, summary_table,
};
use crate::validate::{Requirements, validate};

/// A result table and the name it is published under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTable {
    pub name: &'static str,
    pub table: TableView,
}

impl NamedTable {
    fn new(name: &'static str, table: TableView) -> Self {
        Self { name, table }
    }
}

/// Typed engine result plus the tables published for it.
#[derive(Debug, Clone)]
pub struct OperationOutput<T> {
    pub result: T,
    pub tables: Vec<NamedTable>,
}

/// Outputs of the forecasting (learner) operation.
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub series: TimeSeries,
    pub fit: FitResult,
    pub forecast: ForecastResult,
}

impl ForecastRun {
    pub fn model(&self) -> &FittedModel {
        &self.fit.model
    }
}

/// Run `body`, turning its error into the report for `operation`.
fn orchestrate<T>(operation: &str, body: impl FnOnce() -> Result<T>) -> std::result::Result<T, ErrorReport> {
    info!(operation, "operation started");
    match body() {
        Ok(out) => {
            info!(operation, "operation finished");
            Ok(out)
        }
        Err(err) => {
            let report = ErrorReport::new(operation, &err);
            warn!(operation, kind = %report.kind, message = %report.message, "operation failed");
            Err(report)
        }
    }
}

pub fn run_autocorrelation(
    table: &TableView,
    config: &AutocorrelationConfig,
) -> std::result::Result<OperationOutput<DiagnosticResult>, ErrorReport> {
    orchestrate("autocorrelation", || {
        let series = to_series(table, &config.series.value_column, config.series.index_column.as_deref())?;
        validate(&series, &Requirements::autocorrelation(config.max_lag))?;
        let result = compute_acf_pacf(&series, config.max_lag, config.pacf_method, config.alpha)?;
        let tables = vec![NamedTable::new("acf", lag_table(&result)?)];
        Ok(OperationOutput { result, tables })
    })
}

pub fn run_stationarity(
    table: &TableView,
    config: &StationarityConfig,
) -> std::result::Result<OperationOutput<AdfResult>, ErrorReport> {
    orchestrate("stationarity", || {
        let series = to_series(table, &config.series.value_column, config.series.index_column.as_deref())?;
        validate(&series, &Requirements::stationarity(config.threshold, config.require_stationary))?;
        let result = adf_test(&series.dense_values()?, None)?;
        let tables = vec![NamedTable::new("summary", summary_table(&adf_rows(&result, config.threshold))?)];
        Ok(OperationOutput { result, tables })
    })
}

pub fn run_decompose(
    table: &TableView,
    config: &DecomposeConfig,
) -> std::result::Result<OperationOutput<Decomposition>, ErrorReport> {
    orchestrate("decompose", || {
        let series = to_series(table, &config.series.value_column, config.series.index_column.as_deref())?;
        validate(&series, &Requirements::decomposition(config.period))?;
        let result = decompose(&series, config.period, config.mode)?;
        let tables = vec![NamedTable::new("decomposition", decomposition_table(&series, &result)?)];
        Ok(OperationOutput { result, tables })
    })
}

/// Fit on `table` and forecast `config.horizon` steps.
///
/// Regressor columns named in the model spec are read from `table` for
/// training and from `future` (row order) for the forecast horizon.
pub fn run_forecast(
    table: &TableView,
    future: Option<&TableView>,
    config: &ForecastConfig,
) -> std::result::Result<OperationOutput<ForecastRun>, ErrorReport> {
    orchestrate("forecast", || {
        let index_column = config.series.index_column.as_deref();
        let series = to_series(table, &config.series.value_column, index_column)?;
        let exog = config
            .spec
            .exogenous
            .iter()
            .map(|name| to_series(table, name, index_column))
            .collect::<Result<Vec<_>>>()?;
        let future_exog = future_regressors(future, &config.spec.exogenous)?;

        let mut req = Requirements::forecast(&config.spec).with_frequency(config.frequency, config.frequency_tolerance);
        if let Some(n) = config.min_length {
            req = req.with_min_length(n.max(req.min_length));
        }
        validate(&series, &req)?;
        warn_dynamic_log(config.dynamic, &config.spec);

        let mut engine = ForecastEngine::new(config.spec.clone(), config.fit)
            .with_step(config.frequency)
            .with_dynamic(config.dynamic);
        engine.fit(&series, &exog)?;
        let forecast = engine.forecast(config.horizon, &future_exog, config.confidence_level)?;
        let fit = engine
            .fit_result()
            .cloned()
            .ok_or_else(|| TsError::invalid_parameter("engine", "fit result unavailable"))?;

        let tables = vec![
            NamedTable::new("forecast", forecast_table(series.index_name.as_deref(), &forecast)?),
            NamedTable::new("in_sample", in_sample_table(&series, &fit.residuals, &fit.in_sample)?),
            NamedTable::new("summary", summary_table(&model_summary_rows(&fit.model))?),
        ];
        Ok(OperationOutput {
            result: ForecastRun { series, fit, forecast },
            tables,
        })
    })
}

/// Forecast from a saved model (predictor) without refitting.
pub fn run_apply(
    model: FittedModel,
    future: Option<&TableView>,
    config: &ApplyConfig,
) -> std::result::Result<OperationOutput<ForecastResult>, ErrorReport> {
    orchestrate("apply", || {
        warn_dynamic_log(config.dynamic, &model.spec);
        let future_exog = future_regressors(future, &model.spec.exogenous)?;
        let index_name = model.index_name.clone();
        let engine = ForecastEngine::from_saved(model);
        let result = engine.forecast(config.horizon, &future_exog, config.confidence_level)?;
        let tables = vec![NamedTable::new("forecast", forecast_table(index_name.as_deref(), &result)?)];
        Ok(OperationOutput { result, tables })
    })
}

/// Dynamic predictions compound on the log scale before `exp` maps them back.
fn warn_dynamic_log(dynamic: bool, spec: &ModelSpec) {
    if dynamic && spec.log_transform {
        warn!(model = %spec.label(), "dynamic predictions with a log transform can be invalid");
    }
}

/// Regressor columns present in `future`; absent ones surface later as
/// missing exogenous data.
fn future_regressors(future: Option<&TableView>, names: &[String]) -> Result<Vec<TimeSeries>> {
    let Some(table) = future else {
        return Ok(Vec::new());
    };
    names
        .iter()
        .filter(|name| table.column(name).is_some())
        .map(|name| to_series(table, name, None))
        .collect()
}

/// Residual analyzer: running sums plus summary statistics.
pub fn run_residuals(
    table: &TableView,
    config: &ResidualsConfig,
) -> std::result::Result<OperationOutput<ResidualSummary>, ErrorReport> {
    orchestrate("residuals", || {
        let residuals = table.numeric(&config.column)?;
        let result = analyze_residuals(residuals)?;
        let (sum, sum_sq) = cumulative_sums(residuals);
        let cumulative = TableView::new(vec![
            Column::numeric("cumulative_residual", sum),
            Column::numeric("cumulative_squared_residual", sum_sq),
        ])?;
        let tables = vec![
            NamedTable::new("cumulative", cumulative),
            NamedTable::new("summary", summary_table(&residual_summary_rows(&result))?),
        ];
        Ok(OperationOutput { result, tables })
    })
}

pub fn run_difference(table: &TableView, config: &DifferenceConfig) -> std::result::Result<TableView, ErrorReport> {
    orchestrate("difference", || crate::preprocess::difference(table, config))
}

pub fn run_align(table: &TableView, config: &AlignConfig) -> std::result::Result<TableView, ErrorReport> {
    orchestrate("align", || crate::preprocess::align(table, config))
}

pub fn run_aggregate(table: &TableView, config: &AggregateConfig) -> std::result::Result<TableView, ErrorReport> {
    orchestrate("aggregate", || crate::preprocess::aggregate(table, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate_arima};
    use crate::domain::{FitOptions, PacfMethod, SeriesSelection};
    use crate::error::ErrorKind;

    fn table(values: &[f64]) -> TableView {
        TableView::new(vec![Column::numeric("y", values.iter().map(|v| Some(*v)).collect())]).unwrap()
    }

    fn forecast_config(spec: ModelSpec, horizon: usize) -> ForecastConfig {
        ForecastConfig {
            series: SeriesSelection::new("y", None),
            spec,
            horizon,
            confidence_level: 0.95,
            fit: FitOptions::default(),
            frequency: None,
            frequency_tolerance: 0.0,
            min_length: None,
            dynamic: false,
        }
    }

    #[test]
    fn failures_name_the_operation_and_kind() {
        let config = AutocorrelationConfig {
            series: SeriesSelection::new("missing", None),
            max_lag: 5,
            pacf_method: PacfMethod::DurbinLevinson,
            alpha: 0.05,
        };
        let report = run_autocorrelation(&table(&[1.0, 2.0, 3.0]), &config).unwrap_err();
        assert_eq!(report.operation, "autocorrelation");
        assert_eq!(report.kind, ErrorKind::MissingColumn);
        assert!(report.message.contains("missing"));
    }

    #[test]
    fn validation_runs_before_the_engine() {
        let config = DecomposeConfig {
            series: SeriesSelection::new("y", None),
            period: 12,
            mode: crate::domain::DecompositionMode::Additive,
        };
        let report = run_decompose(&table(&[1.0; 10]), &config).unwrap_err();
        assert_eq!(report.kind, ErrorKind::InsufficientData);
    }

    #[test]
    fn forecast_publishes_three_tables() {
        let y = simulate_arima(&SimulationSpec::ar1(0.5, 120, 11).with_mean(5.0)).unwrap();
        let out = run_forecast(&table(&y), None, &forecast_config(ModelSpec::arima(1, 0, 0), 4)).unwrap();
        let names: Vec<&str> = out.tables.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["forecast", "in_sample", "summary"]);
        assert_eq!(out.tables[0].table.n_rows(), 4);
        assert_eq!(
            out.tables[0].table.column_names(),
            vec!["index", "forecast", "lower_bound", "upper_bound"]
        );
        assert_eq!(out.tables[1].table.n_rows(), 120);
        assert_eq!(out.tables[1].table.column_names(), vec!["residual", "in_sample"]);
    }

    #[test]
    fn forecast_without_future_regressors_reports_missing_exog() {
        let y = simulate_arima(&SimulationSpec::ar1(0.5, 80, 2)).unwrap();
        let x: Vec<f64> = (0..80).map(|i| (i % 7) as f64).collect();
        let mut t = table(&y);
        t.push_column(Column::numeric("x", x.iter().map(|v| Some(*v)).collect())).unwrap();
        let spec = ModelSpec::arima(1, 0, 0).with_exogenous(vec!["x".to_string()]);
        let report = run_forecast(&t, None, &forecast_config(spec, 3)).unwrap_err();
        assert_eq!(report.operation, "forecast");
        assert_eq!(report.kind, ErrorKind::MissingExogenousData);
    }

    #[test]
    fn configured_min_length_stops_the_fit() {
        let y = simulate_arima(&SimulationSpec::ar1(0.5, 10, 4)).unwrap();
        let mut config = forecast_config(ModelSpec::arima(1, 0, 0), 3);
        config.min_length = Some(20);
        let report = run_forecast(&table(&y), None, &config).unwrap_err();
        assert_eq!(report.operation, "forecast");
        assert_eq!(report.kind, ErrorKind::InsufficientData);
        assert!(report.message.contains("20"), "{}", report.message);
    }

    #[test]
    fn dynamic_option_changes_only_the_in_sample_table() {
        let y = simulate_arima(&SimulationSpec::ar1(0.7, 150, 9).with_mean(3.0)).unwrap();
        let one_step = run_forecast(&table(&y), None, &forecast_config(ModelSpec::arima(1, 0, 0), 4)).unwrap();
        let mut config = forecast_config(ModelSpec::arima(1, 0, 0), 4);
        config.dynamic = true;
        let dynamic = run_forecast(&table(&y), None, &config).unwrap();

        assert_eq!(one_step.result.forecast, dynamic.result.forecast);
        let a = one_step.tables[1].table.numeric("in_sample").unwrap();
        let b = dynamic.tables[1].table.numeric("in_sample").unwrap();
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn apply_reproduces_the_learner_forecast() {
        let y = simulate_arima(&SimulationSpec::ar1(0.6, 150, 5)).unwrap();
        let out = run_forecast(&table(&y), None, &forecast_config(ModelSpec::arima(1, 0, 1), 5)).unwrap();
        let applied = run_apply(
            out.result.model().clone(),
            None,
            &ApplyConfig {
                horizon: 5,
                confidence_level: 0.95,
                dynamic: true,
            },
        )
        .unwrap();
        for (a, b) in applied.result.points.iter().zip(&out.result.forecast.points) {
            assert!((a.forecast - b.forecast).abs() < 1e-12);
            assert!((a.upper_bound - b.upper_bound).abs() < 1e-12);
        }
    }

    #[test]
    fn residual_analyzer_outputs_match_rows() {
        let t = TableView::new(vec![Column::numeric(
            "residual",
            vec![Some(0.5), None, Some(-0.25), Some(1.0), Some(-1.0)],
        )])
        .unwrap();
        let out = run_residuals(
            &t,
            &ResidualsConfig {
                column: "residual".to_string(),
            },
        )
        .unwrap();
        assert_eq!(out.result.count, 4);
        assert_eq!(out.tables[0].table.n_rows(), 5);
        assert_eq!(out.tables[1].table.column_names(), vec!["term", "value"]);
    }
}
