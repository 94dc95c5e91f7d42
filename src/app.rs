//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments into operation configs
//! - reads input CSVs and runs the pipeline operation
//! - prints summaries/plots and writes the result tables

use std::io::Write;
use std::path::Path;

use clap::Parser;
use tracing::{Level, info};

use crate::cli::{
    AcfArgs, AggregateArgs, AlignArgs, ApplyArgs, Cli, Command, DecomposeArgs, DifferenceArgs, ForecastArgs,
    ModelArgs, ResidualsArgs, SampleArgs, StationarityArgs,
};
use crate::data::{SimulationSpec, sample_table};
use crate::domain::{
    AggregateConfig, AlignConfig, ApplyConfig, AutocorrelationConfig, DecomposeConfig, DifferenceConfig, FitOptions,
    ForecastConfig, ModelSpec, ResidualsConfig, SeriesSelection, StationarityConfig, Step, TableView,
};
use crate::error::{AppError, TsError};
use crate::io::{output_path, parse_timestamp, read_model_json, read_table, write_model_json, write_table_csv, write_table_to};

pub mod pipeline;

use pipeline::NamedTable;

/// Environment fallback for `--log-level`.
pub const LOG_LEVEL_ENV: &str = "TSA_LOG_LEVEL";
/// Environment fallback for `--max-iterations`.
pub const MAX_ITERATIONS_ENV: &str = "TSA_MAX_ITERATIONS";

/// Entry point for the `tsa` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Command::Acf(args) => handle_acf(&args),
        Command::Stationarity(args) => handle_stationarity(&args),
        Command::Decompose(args) => handle_decompose(&args),
        Command::Forecast(args) => handle_forecast(&args),
        Command::Apply(args) => handle_apply(&args),
        Command::Residuals(args) => handle_residuals(&args),
        Command::Difference(args) => handle_difference(&args),
        Command::Align(args) => handle_align(&args),
        Command::Aggregate(args) => handle_aggregate(&args),
        Command::Sample(args) => handle_sample(&args),
    }
}

fn init_logging(flag: Option<&str>) -> Result<(), AppError> {
    let raw = flag
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_LEVEL_ENV).ok())
        .unwrap_or_else(|| "warn".to_string());
    let level: Level = raw
        .parse()
        .map_err(|_| AppError::new(2, format!("Invalid log level '{raw}' (expected error, warn, info, debug or trace).")))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn handle_acf(args: &AcfArgs) -> Result<(), AppError> {
    let table = read_table(&args.io.input)?;
    let config = acf_config_from_args(args);
    let out = pipeline::run_autocorrelation(&table, &config)?;
    let summary = crate::report::format_diagnostics(&config.series.value_column, &out.result);
    emit(args.io.output.as_deref(), &summary, &out.tables)
}

fn handle_stationarity(args: &StationarityArgs) -> Result<(), AppError> {
    let table = read_table(&args.io.input)?;
    let config = stationarity_config_from_args(args);
    let out = pipeline::run_stationarity(&table, &config)?;
    let summary = crate::report::format_stationarity(&config.series.value_column, &out.result, config.threshold);
    emit(args.io.output.as_deref(), &summary, &out.tables)
}

fn handle_decompose(args: &DecomposeArgs) -> Result<(), AppError> {
    let table = read_table(&args.io.input)?;
    let config = decompose_config_from_args(args);
    let out = pipeline::run_decompose(&table, &config)?;
    let summary = format!(
        "=== tsa - Decomposition ({:?}, period {}) ===\nRows: {}\n",
        out.result.mode,
        out.result.period,
        out.result.trend.len()
    );
    emit(args.io.output.as_deref(), &summary, &out.tables)
}

fn handle_forecast(args: &ForecastArgs) -> Result<(), AppError> {
    let table = read_table(&args.io.input)?;
    let future = args.future.as_deref().map(read_table).transpose()?;
    let config = forecast_config_from_args(args)?;
    let out = pipeline::run_forecast(&table, future.as_ref(), &config)?;

    let mut summary = crate::report::format_fit_summary(out.result.model());
    summary.push('\n');
    summary.push_str(&crate::report::format_forecast(&out.result.forecast));
    if args.plot {
        let window = (4 * config.horizon).max(48);
        summary.push('\n');
        summary.push_str(&crate::plot::render_forecast_plot(
            &out.result.series.values,
            Some(&out.result.forecast),
            Some(window),
            args.width,
            args.height,
        ));
    }

    if let Some(path) = &args.save_model {
        write_model_json(path, out.result.model())?;
        info!(path = %path.display(), "model saved");
    }
    emit(args.io.output.as_deref(), &summary, &out.tables)
}

fn handle_apply(args: &ApplyArgs) -> Result<(), AppError> {
    let model = read_model_json(&args.model)?;
    let future = args.future.as_deref().map(read_table).transpose()?;
    let config = ApplyConfig {
        horizon: args.horizon,
        confidence_level: args.confidence,
        dynamic: args.dynamic,
    };
    let label = model.spec.label();
    let out = pipeline::run_apply(model, future.as_ref(), &config)?;
    let summary = format!("=== tsa - {label} (saved) ===\n{}", crate::report::format_forecast(&out.result));
    emit(args.output.as_deref(), &summary, &out.tables)
}

fn handle_residuals(args: &ResidualsArgs) -> Result<(), AppError> {
    let table = read_table(&args.io.input)?;
    let config = ResidualsConfig {
        column: args.column.clone(),
    };
    let out = pipeline::run_residuals(&table, &config)?;
    let summary = crate::report::format_residual_summary(&out.result);
    emit(args.io.output.as_deref(), &summary, &out.tables)
}

fn handle_difference(args: &DifferenceArgs) -> Result<(), AppError> {
    let table = read_table(&args.io.input)?;
    let config = DifferenceConfig {
        column: args.column.clone(),
        lag: args.lag,
    };
    let out = pipeline::run_difference(&table, &config)?;
    emit_single(args.io.output.as_deref(), "difference", out)
}

fn handle_align(args: &AlignArgs) -> Result<(), AppError> {
    let table = read_table(&args.io.input)?;
    let config = AlignConfig {
        timestamp_column: args.timestamp.clone(),
        step: parse_step(&args.frequency)?,
        replace_column: args.replace,
    };
    let out = pipeline::run_align(&table, &config)?;
    emit_single(args.io.output.as_deref(), "aligned", out)
}

fn handle_aggregate(args: &AggregateArgs) -> Result<(), AppError> {
    let table = read_table(&args.io.input)?;
    let config = AggregateConfig {
        timestamp_column: args.timestamp.clone(),
        value_column: args.value.clone(),
        granularity: args.granularity,
        method: args.method,
    };
    let out = pipeline::run_aggregate(&table, &config)?;
    emit_single(args.io.output.as_deref(), "aggregated", out)
}

fn handle_sample(args: &SampleArgs) -> Result<(), AppError> {
    let spec = simulation_spec_from_args(args);
    let start = parse_timestamp(&args.start)
        .ok_or_else(|| AppError::new(2, format!("Invalid start timestamp '{}'.", args.start)))?;
    let step = parse_step(&args.frequency)?;
    let table = sample_table(&spec, start, step, &args.timestamp_column, &args.value_column).map_err(param_error)?;
    match &args.output {
        Some(path) => {
            write_table_csv(path, &table)?;
            println!("Wrote {} rows to {}", table.n_rows(), path.display());
            Ok(())
        }
        None => write_table_to(std::io::stdout().lock(), &table),
    }
}

/// Write result tables to `<prefix>_<name>.csv` and print the summary, or
/// stream the tables to stdout (summary on stderr) when no prefix is given.
fn emit(output: Option<&Path>, summary: &str, tables: &[NamedTable]) -> Result<(), AppError> {
    match output {
        Some(prefix) => {
            println!("{summary}");
            for t in tables {
                let path = output_path(prefix, t.name);
                write_table_csv(&path, &t.table)?;
                println!("Wrote {} ({} rows)", path.display(), t.table.n_rows());
            }
        }
        None => {
            eprintln!("{summary}");
            let mut stdout = std::io::stdout().lock();
            for (i, t) in tables.iter().enumerate() {
                if tables.len() > 1 {
                    let sep = if i == 0 { "" } else { "\n" };
                    writeln!(stdout, "{sep}# {}", t.name)
                        .map_err(|e| AppError::new(4, format!("Failed to write to stdout: {e}")))?;
                }
                write_table_to(&mut stdout, &t.table)?;
            }
        }
    }
    Ok(())
}

fn emit_single(output: Option<&Path>, name: &str, table: TableView) -> Result<(), AppError> {
    match output {
        Some(prefix) => {
            let path = output_path(prefix, name);
            write_table_csv(&path, &table)?;
            println!("Wrote {} ({} rows)", path.display(), table.n_rows());
            Ok(())
        }
        None => write_table_to(std::io::stdout().lock(), &table),
    }
}

fn param_error(err: TsError) -> AppError {
    AppError::new(err.kind().exit_code(), err.to_string())
}

fn parse_step(alias: &str) -> Result<Step, AppError> {
    Step::parse(alias).map_err(param_error)
}

fn selection(args: &crate::cli::SeriesArgs) -> SeriesSelection {
    SeriesSelection::new(args.value.clone(), args.index.clone())
}

pub fn acf_config_from_args(args: &AcfArgs) -> AutocorrelationConfig {
    AutocorrelationConfig {
        series: selection(&args.series),
        max_lag: args.max_lag,
        pacf_method: args.pacf_method,
        alpha: args.alpha,
    }
}

pub fn stationarity_config_from_args(args: &StationarityArgs) -> StationarityConfig {
    StationarityConfig {
        series: selection(&args.series),
        threshold: args.threshold,
        require_stationary: args.require_stationary,
    }
}

pub fn decompose_config_from_args(args: &DecomposeArgs) -> DecomposeConfig {
    DecomposeConfig {
        series: selection(&args.series),
        period: args.period,
        mode: args.mode,
    }
}

pub fn model_spec_from_args(args: &ModelArgs) -> ModelSpec {
    let mut spec = ModelSpec::arima(args.p, args.d, args.q)
        .with_exogenous(args.exog.clone())
        .with_log_transform(args.log);
    if args.period > 0 || args.seasonal_ar + args.seasonal_diff + args.seasonal_ma > 0 {
        spec = spec.with_seasonal(args.seasonal_ar, args.seasonal_diff, args.seasonal_ma, args.period);
    }
    spec
}

/// Optimizer settings: flag, then `TSA_MAX_ITERATIONS`, then the default cap.
pub fn fit_options_from_args(args: &ModelArgs) -> Result<FitOptions, AppError> {
    let max_iterations = match args.max_iterations {
        Some(n) => n,
        None => match std::env::var(MAX_ITERATIONS_ENV) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::new(2, format!("{MAX_ITERATIONS_ENV} must be a positive integer, got '{raw}'.")))?,
            Err(_) => FitOptions::default().max_iterations,
        },
    };
    if max_iterations == 0 {
        return Err(AppError::new(2, "The optimizer iteration cap must be >= 1."));
    }
    Ok(FitOptions {
        max_iterations,
        tolerance: args.tolerance,
    })
}

pub fn forecast_config_from_args(args: &ForecastArgs) -> Result<ForecastConfig, AppError> {
    Ok(ForecastConfig {
        series: selection(&args.series),
        spec: model_spec_from_args(&args.model),
        horizon: args.horizon,
        confidence_level: args.confidence,
        fit: fit_options_from_args(&args.model)?,
        frequency: args.frequency.as_deref().map(parse_step).transpose()?,
        frequency_tolerance: args.frequency_tolerance,
        min_length: args.min_length,
        dynamic: args.dynamic,
    })
}

pub fn simulation_spec_from_args(args: &SampleArgs) -> SimulationSpec {
    SimulationSpec::ar(args.ar.clone(), args.count, args.seed)
        .with_ma(args.ma.clone())
        .with_differencing(args.diff)
        .with_seasonal(args.seasonal_ar.clone(), args.seasonal_diff, args.seasonal_ma.clone(), args.period)
        .with_mean(args.mean)
        .with_sigma(args.sigma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn forecast_args(argv: &[&str]) -> ForecastArgs {
        let cli = Cli::parse_from(argv);
        match cli.command {
            Command::Forecast(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn forecast_flags_map_to_a_seasonal_spec() {
        let args = forecast_args(&[
            "tsa", "forecast", "-i", "in.csv", "--value", "y", "--index", "date", "-p", "1", "-d", "1", "-q", "1",
            "--seasonal-ma", "1", "--seasonal-diff", "1", "--period", "12", "--exog", "a,b", "--log", "--horizon",
            "6", "--max-iterations", "300", "--frequency", "M",
        ]);
        let config = forecast_config_from_args(&args).unwrap();
        assert_eq!(config.spec.label(), "SARIMAX(1,1,1)(0,1,1,12)");
        assert_eq!(config.spec.exogenous, vec!["a".to_string(), "b".to_string()]);
        assert!(config.spec.log_transform);
        assert_eq!(config.horizon, 6);
        assert_eq!(config.fit.max_iterations, 300);
        assert_eq!(config.frequency, Some(Step::Months(1)));
        assert_eq!(config.series.index_column.as_deref(), Some("date"));
    }

    #[test]
    fn plain_arima_has_no_seasonal_part() {
        let args = forecast_args(&["tsa", "forecast", "-i", "in.csv", "--value", "y"]);
        let spec = model_spec_from_args(&args.model);
        assert_eq!(spec.active_seasonal(), None);
        assert_eq!(spec.label(), "ARIMA(1,0,0)");
        let config = forecast_config_from_args(&args).unwrap();
        assert!(!config.dynamic);
        assert_eq!(config.min_length, None);
    }

    #[test]
    fn dynamic_and_min_length_flags_reach_the_config() {
        let args = forecast_args(&[
            "tsa", "forecast", "-i", "in.csv", "--value", "y", "--dynamic", "--min-length", "20",
        ]);
        let config = forecast_config_from_args(&args).unwrap();
        assert!(config.dynamic);
        assert_eq!(config.min_length, Some(20));
    }

    #[test]
    fn zero_iteration_cap_is_rejected() {
        let args = forecast_args(&["tsa", "forecast", "-i", "in.csv", "--value", "y", "--max-iterations", "0"]);
        assert_eq!(fit_options_from_args(&args.model).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn sample_flags_accept_negative_coefficients() {
        let cli = Cli::parse_from(["tsa", "sample", "--ar", "0.5,-0.2", "--mean", "-1.5", "-n", "30"]);
        let Command::Sample(args) = cli.command else {
            panic!("expected sample");
        };
        let spec = simulation_spec_from_args(&args);
        assert_eq!(spec.ar, vec![0.5, -0.2]);
        assert_eq!(spec.mean, -1.5);
        assert_eq!(spec.n, 30);
    }
}
