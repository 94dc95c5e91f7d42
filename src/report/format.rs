//! Formatted terminal output.
//!
//! Formatting lives in one place so engines stay free of presentation code
//! and output changes stay localized.

use crate::diagnostics::ResidualSummary;
use crate::domain::{AdfResult, DiagnosticResult, ForecastResult};
use crate::forecast::FittedModel;

/// ACF/PACF table with significance markers plus the ADF line.
pub fn format_diagnostics(series_name: &str, result: &DiagnosticResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== tsa - Autocorrelation ({}) ===\n", truncate(series_name, 32)));
    out.push_str(format!("{:>5} {:>10} {:>10} {:>10} {:>10}", "lag", "acf", "margin", "pacf", "margin").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<5} {:-<10} {:-<10} {:-<10} {:-<10}", "", "", "", "", "").trim_end());
    out.push('\n');
    for l in &result.lags {
        let acf_mark = if l.lag > 0 && l.acf.abs() > l.acf_margin { "*" } else { " " };
        let pacf_mark = if l.lag > 0 && l.pacf.abs() > l.pacf_margin { "*" } else { " " };
        out.push_str(&format!(
            "{:>5} {:>9.4}{acf_mark} {:>10.4} {:>9.4}{pacf_mark} {:>10.4}\n",
            l.lag, l.acf, l.acf_margin, l.pacf, l.pacf_margin
        ));
    }
    out.push('\n');
    match &result.adf {
        Some(adf) => out.push_str(&format_adf_line(adf)),
        None => out.push_str("ADF: not available (series too short)\n"),
    }
    out
}

/// Stationarity verdict at `threshold`.
pub fn format_stationarity(series_name: &str, adf: &AdfResult, threshold: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== tsa - Stationarity ({}) ===\n", truncate(series_name, 32)));
    out.push_str(&format_adf_line(adf));
    out.push_str(&format!(
        "Critical values: 1%={:.3} 5%={:.3} 10%={:.3}\n",
        adf.critical_values.one_percent, adf.critical_values.five_percent, adf.critical_values.ten_percent
    ));
    let verdict = if adf.is_stationary(threshold) { "stationary" } else { "not stationary" };
    out.push_str(&format!("Verdict at p <= {threshold}: {verdict}\n"));
    out
}

fn format_adf_line(adf: &AdfResult) -> String {
    format!(
        "ADF: stat={:.4} p={:.4} lags={} n={}\n",
        adf.statistic, adf.p_value, adf.used_lags, adf.n_obs
    )
}

/// Model label, coefficient table and fit statistics.
pub fn format_fit_summary(model: &FittedModel) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== tsa - {} ===\n", model.spec.label()));
    out.push_str(&format!(
        "Series: {} | n={} | iterations={}{}\n",
        truncate(&model.series_name, 32),
        model.n_obs,
        model.iterations,
        if model.spec.log_transform { " | log scale" } else { "" }
    ));

    out.push_str("\nCoefficients:\n");
    out.push_str(format!("{:<24} {:>12} {:>12}", "term", "value", "std_error").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<12} {:-<12}", "", "", "").trim_end());
    out.push('\n');
    for p in &model.parameters {
        out.push_str(
            format!(
                "{:<24} {:>12.6} {:>12}",
                truncate(&p.name, 24),
                p.value,
                fmt_opt(p.std_error)
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out.push_str("\nFit:\n");
    out.push_str(&format!("- sigma2: {:.6}\n", model.sigma2));
    out.push_str(&format!("- loglik: {:.3}\n", model.loglik));
    out.push_str(&format!("- AIC={:.3} BIC={:.3}\n", model.aic, model.bic));
    out.push_str(&format!("- MSE={:.6} MAE={:.6}\n", model.mse, model.mae));
    out
}

/// Forecast table with bounds.
pub fn format_forecast(forecast: &ForecastResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Forecast: horizon={} | confidence={:.0}%\n",
        forecast.horizon(),
        forecast.confidence_level * 100.0
    ));
    out.push_str(format!("{:<20} {:>12} {:>12} {:>12}", "index", "forecast", "lower", "upper").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<12} {:-<12} {:-<12}", "", "", "", "").trim_end());
    out.push('\n');
    for p in &forecast.points {
        out.push_str(&format!(
            "{:<20} {:>12.4} {:>12.4} {:>12.4}\n",
            truncate(&p.index.to_string(), 20),
            p.forecast,
            p.lower_bound,
            p.upper_bound
        ));
    }
    out
}

pub fn format_residual_summary(summary: &ResidualSummary) -> String {
    let mut out = String::new();
    out.push_str("=== tsa - Residual analysis ===\n");
    for (term, value) in summary.rows() {
        out.push_str(&format!("{term:<22} {value:>14.6}\n"));
    }
    out
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format!("{v:.6}"),
        _ => "n/a".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
