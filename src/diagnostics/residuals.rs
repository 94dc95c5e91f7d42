//! Residual analysis: cumulative sums and summary/test statistics.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TsError};
use crate::math::{chi_squared_sf, mean, quantile, shapiro_wilk, variance};

/// Summary statistics and tests for a residual column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (`n - 1`).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
    /// Biased sample skewness `m3 / m2^{3/2}`.
    pub skewness: f64,
    /// Pearson kurtosis `m4 / m2²` (3 for a normal distribution).
    pub kurtosis: f64,
    /// Shapiro–Wilk `W`; near 1 for normal residuals.
    pub shapiro_wilk: f64,
    pub shapiro_wilk_p_value: f64,
    pub jarque_bera: f64,
    pub jarque_bera_p_value: f64,
    /// `Σ (e_t - e_{t-1})² / Σ e_t²`; close to 2 without autocorrelation.
    pub durbin_watson: f64,
}

impl ResidualSummary {
    /// `(term, value)` rows in report order.
    pub fn rows(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("count", self.count as f64),
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.q25),
            ("50%", self.median),
            ("75%", self.q75),
            ("max", self.max),
            ("skewness", self.skewness),
            ("kurtosis", self.kurtosis),
            ("shapiro_wilk", self.shapiro_wilk),
            ("shapiro_wilk_p_value", self.shapiro_wilk_p_value),
            ("jarque_bera", self.jarque_bera),
            ("jarque_bera_p_value", self.jarque_bera_p_value),
            ("durbin_watson", self.durbin_watson),
        ]
    }
}

/// Summarize residuals (missing values are dropped first).
pub fn analyze_residuals(residuals: &[Option<f64>]) -> Result<ResidualSummary> {
    let e: Vec<f64> = residuals.iter().flatten().copied().collect();
    let n = e.len();
    if n < 3 {
        return Err(TsError::InsufficientData { required: 3, actual: n });
    }

    let m = mean(&e).unwrap_or(0.0);
    let m2 = variance(&e, 0).unwrap_or(0.0);
    if m2 <= f64::EPSILON {
        return Err(TsError::InvalidData("residuals are constant".to_string()));
    }
    let m3 = e.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n as f64;
    let m4 = e.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n as f64;
    let skewness = m3 / m2.powf(1.5);
    let kurtosis = m4 / (m2 * m2);

    let (shapiro_wilk, shapiro_wilk_p_value) = shapiro_wilk(&e)?;
    let jarque_bera = n as f64 / 6.0 * (skewness * skewness + (kurtosis - 3.0).powi(2) / 4.0);
    let jarque_bera_p_value = chi_squared_sf(jarque_bera, 2.0)?;

    let ss: f64 = e.iter().map(|v| v * v).sum();
    let durbin_watson = e.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum::<f64>() / ss;

    let mut sorted = e.clone();
    sorted.sort_by(f64::total_cmp);
    let q = |p: f64| quantile(&sorted, p).unwrap_or(f64::NAN);

    Ok(ResidualSummary {
        count: n,
        mean: m,
        std: variance(&e, 1).unwrap_or(0.0).sqrt(),
        min: sorted[0],
        q25: q(0.25),
        median: q(0.5),
        q75: q(0.75),
        max: sorted[n - 1],
        skewness,
        kurtosis,
        shapiro_wilk,
        shapiro_wilk_p_value,
        jarque_bera,
        jarque_bera_p_value,
        durbin_watson,
    })
}

/// Running sums of residuals and squared residuals.
///
/// Missing rows stay missing in the output but do not break the running sum.
pub fn cumulative_sums(residuals: &[Option<f64>]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    residuals
        .iter()
        .map(|r| {
            r.map(|v| {
                sum += v;
                sum_sq += v * v;
                (sum, sum_sq)
            })
        })
        .map(|pair| (pair.map(|p| p.0), pair.map(|p| p.1)))
        .unzip()
}
