//! Command-line parsing for the `tsa` time-series toolkit.
//!
//! Argument parsing and command dispatch stay separate from the engines: the
//! structs here only describe flags, `app` maps them into operation configs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{AggregationMethod, DecompositionMode, Granularity, PacfMethod};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tsa", version, about = "Time-series diagnostics, decomposition and SARIMAX forecasting")]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace). Falls back to TSA_LOG_LEVEL, then warn.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// ACF/PACF with margins of error plus an ADF test.
    Acf(AcfArgs),
    /// Augmented Dickey-Fuller stationarity test.
    Stationarity(StationarityArgs),
    /// Classical seasonal decomposition.
    Decompose(DecomposeArgs),
    /// Fit a SARIMAX model and forecast.
    Forecast(ForecastArgs),
    /// Forecast from a saved model without refitting.
    Apply(ApplyArgs),
    /// Summary statistics and tests of a residual column.
    Residuals(ResidualsArgs),
    /// Append a lagged difference column.
    Difference(DifferenceArgs),
    /// Insert missing timestamps on a regular grid.
    Align(AlignArgs),
    /// Aggregate a value column into time buckets.
    Aggregate(AggregateArgs),
    /// Write a synthetic seasonal ARIMA series.
    Sample(SampleArgs),
}

/// Input CSV and output destination shared by table commands.
#[derive(Debug, Args, Clone)]
pub struct IoArgs {
    /// Input CSV file.
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Output prefix: tables are written to `<prefix>_<table>.csv`. Prints CSV to stdout when absent.
    #[arg(short, long, value_name = "PREFIX")]
    pub output: Option<PathBuf>,
}

/// Value/index column selection.
#[derive(Debug, Args, Clone)]
pub struct SeriesArgs {
    /// Numeric value column.
    #[arg(long)]
    pub value: String,

    /// Index column (timestamp or integer). Row order is used when absent.
    #[arg(long)]
    pub index: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct AcfArgs {
    #[command(flatten)]
    pub io: IoArgs,
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Largest lag to report.
    #[arg(long, default_value_t = 20)]
    pub max_lag: usize,

    /// PACF estimator.
    #[arg(long, value_enum, default_value_t = PacfMethod::DurbinLevinson)]
    pub pacf_method: PacfMethod,

    /// Significance level of the margins of error.
    #[arg(long, default_value_t = 0.05)]
    pub alpha: f64,
}

#[derive(Debug, Args, Clone)]
pub struct StationarityArgs {
    #[command(flatten)]
    pub io: IoArgs,
    #[command(flatten)]
    pub series: SeriesArgs,

    /// ADF p-value threshold.
    #[arg(long, default_value_t = 0.05)]
    pub threshold: f64,

    /// Fail (exit code 3) when the series is not stationary.
    #[arg(long)]
    pub require_stationary: bool,
}

#[derive(Debug, Args, Clone)]
pub struct DecomposeArgs {
    #[command(flatten)]
    pub io: IoArgs,
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Seasonal period (observations per cycle).
    #[arg(long)]
    pub period: usize,

    #[arg(long, value_enum, default_value_t = DecompositionMode::Additive)]
    pub mode: DecompositionMode,
}

/// SARIMAX order, regressors and optimizer settings.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// AR order.
    #[arg(short = 'p', long = "ar", default_value_t = 1)]
    pub p: usize,

    /// Differencing order.
    #[arg(short = 'd', long = "diff", default_value_t = 0)]
    pub d: usize,

    /// MA order.
    #[arg(short = 'q', long = "ma", default_value_t = 0)]
    pub q: usize,

    /// Seasonal AR order.
    #[arg(long, default_value_t = 0)]
    pub seasonal_ar: usize,

    /// Seasonal differencing order.
    #[arg(long, default_value_t = 0)]
    pub seasonal_diff: usize,

    /// Seasonal MA order.
    #[arg(long, default_value_t = 0)]
    pub seasonal_ma: usize,

    /// Seasonal period; 0 disables the seasonal part.
    #[arg(long, default_value_t = 0)]
    pub period: usize,

    /// Exogenous regressor columns (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub exog: Vec<String>,

    /// Fit on the natural log of the series.
    #[arg(long)]
    pub log: bool,

    /// Optimizer iteration cap. Falls back to TSA_MAX_ITERATIONS.
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Optimizer convergence tolerance.
    #[arg(long, default_value_t = 1e-8)]
    pub tolerance: f64,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub io: IoArgs,
    #[command(flatten)]
    pub series: SeriesArgs,
    #[command(flatten)]
    pub model: ModelArgs,

    /// Forecast steps.
    #[arg(long, default_value_t = 1)]
    pub horizon: usize,

    /// Confidence level of the forecast bounds.
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// Expected sampling frequency (e.g. `D`, `M`, `15min`); inferred when absent.
    #[arg(long)]
    pub frequency: Option<String>,

    /// Share of index gaps allowed to deviate from the frequency.
    #[arg(long, default_value_t = 0.0)]
    pub frequency_tolerance: f64,

    /// Fewest non-missing training points (raised to the model's lag reach).
    #[arg(long)]
    pub min_length: Option<usize>,

    /// Predict in-sample rows from earlier predictions instead of observations.
    #[arg(long)]
    pub dynamic: bool,

    /// CSV with future regressor values (one row per forecast step).
    #[arg(long, value_name = "CSV")]
    pub future: Option<PathBuf>,

    /// Save the fitted model to JSON for `tsa apply`.
    #[arg(long, value_name = "JSON")]
    pub save_model: Option<PathBuf>,

    /// Render an ASCII plot of the series tail and forecast.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ApplyArgs {
    /// Model JSON written by `tsa forecast --save-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// CSV with future regressor values.
    #[arg(long, value_name = "CSV")]
    pub future: Option<PathBuf>,

    /// Output prefix; prints CSV to stdout when absent.
    #[arg(short, long, value_name = "PREFIX")]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub horizon: usize,

    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// Accepted for parity with `forecast`; only warns for log-transformed models.
    #[arg(long)]
    pub dynamic: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ResidualsArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Residual column.
    #[arg(long, default_value = "residual")]
    pub column: String,
}

#[derive(Debug, Args, Clone)]
pub struct DifferenceArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[arg(long)]
    pub column: String,

    #[arg(long, default_value_t = 1)]
    pub lag: usize,
}

#[derive(Debug, Args, Clone)]
pub struct AlignArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Timestamp column.
    #[arg(long)]
    pub timestamp: String,

    /// Grid frequency (e.g. `D`, `H`, `M`).
    #[arg(long)]
    pub frequency: String,

    /// Replace the timestamp column instead of appending an aligned copy.
    #[arg(long)]
    pub replace: bool,
}

#[derive(Debug, Args, Clone)]
pub struct AggregateArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[arg(long)]
    pub timestamp: String,

    #[arg(long)]
    pub value: String,

    #[arg(long, value_enum, default_value_t = Granularity::Day)]
    pub granularity: Granularity,

    #[arg(long, value_enum, default_value_t = AggregationMethod::Mean)]
    pub method: AggregationMethod,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Output CSV file; prints to stdout when absent.
    #[arg(short, long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Number of observations.
    #[arg(short = 'n', long, default_value_t = 240)]
    pub count: usize,

    /// AR coefficients (comma separated).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub ar: Vec<f64>,

    /// MA coefficients (comma separated).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub ma: Vec<f64>,

    #[arg(long, default_value_t = 0)]
    pub diff: usize,

    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub seasonal_ar: Vec<f64>,

    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub seasonal_ma: Vec<f64>,

    #[arg(long, default_value_t = 0)]
    pub seasonal_diff: usize,

    #[arg(long, default_value_t = 0)]
    pub period: usize,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub mean: f64,

    #[arg(long, default_value_t = 1.0)]
    pub sigma: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First timestamp.
    #[arg(long, default_value = "2000-01-31")]
    pub start: String,

    /// Sampling frequency.
    #[arg(long, default_value = "M")]
    pub frequency: String,

    #[arg(long, default_value = "date")]
    pub timestamp_column: String,

    #[arg(long, default_value = "y")]
    pub value_column: String,
}
