//! Augmented Dickey–Fuller unit-root test (constant, no trend).
//!
//! Regression:
//!
//! ```text
//! Δy_t = α + γ y_{t-1} + Σ_{i=1..k} δ_i Δy_{t-i} + ε_t
//! ```
//!
//! The statistic is the t-ratio of `γ`. P-values use MacKinnon's (1994)
//! response surface, critical values MacKinnon (2010), both for the
//! constant-only case with a single series.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{AdfResult, CriticalValues};
use crate::error::{Result, TsError};
use crate::math::{normal_cdf, ols, variance};

const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

const CRIT_1: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

/// Default lag count: Schwert's rule `⌊12 (n / 100)^{1/4}⌋`.
pub fn default_adf_lags(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize
}

/// Run the ADF test on a gap-free series.
///
/// `max_lag` overrides the default lag count; either way the count is capped
/// at `n/2 - 2` so the regression keeps enough observations.
pub fn adf_test(y: &[f64], max_lag: Option<usize>) -> Result<AdfResult> {
    let n = y.len();
    if n < 6 {
        return Err(TsError::InsufficientData { required: 6, actual: n });
    }
    if variance(y, 0).unwrap_or(0.0) <= f64::EPSILON {
        return Err(TsError::InvalidData("ADF test is undefined for a constant series".to_string()));
    }

    let cap = (n / 2).saturating_sub(2);
    let k = max_lag.unwrap_or_else(|| default_adf_lags(n)).min(cap);

    let dy: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();
    let n_obs = dy.len() - k;
    let n_cols = 2 + k;

    let x = DMatrix::from_fn(n_obs, n_cols, |r, c| {
        let t = r + k;
        match c {
            0 => 1.0,
            1 => y[t],
            _ => dy[t - (c - 1)],
        }
    });
    let target = DVector::from_iterator(n_obs, (k..dy.len()).map(|t| dy[t]));

    let fit = ols(&x, &target).ok_or_else(|| {
        TsError::InvalidData("ADF regression is singular (series too short or degenerate)".to_string())
    })?;
    let statistic = fit.t_stat(1);
    if !statistic.is_finite() {
        return Err(TsError::InvalidData("ADF statistic is not finite".to_string()));
    }

    let p_value = mackinnon_p_value(statistic)?;
    debug!(statistic, p_value, lags = k, n_obs, "adf test");

    Ok(AdfResult {
        statistic,
        p_value,
        used_lags: k,
        n_obs,
        critical_values: critical_values(n_obs),
    })
}

/// Approximate asymptotic p-value of the ADF statistic.
pub fn mackinnon_p_value(stat: f64) -> Result<f64> {
    if stat > TAU_MAX {
        return Ok(1.0);
    }
    if stat < TAU_MIN {
        return Ok(0.0);
    }
    let coefs: &[f64] = if stat <= TAU_STAR { &TAU_SMALL_P } else { &TAU_LARGE_P };
    normal_cdf(polyval(coefs, stat))
}

/// Finite-sample critical values for `n_obs` regression observations.
pub fn critical_values(n_obs: usize) -> CriticalValues {
    let inv = 1.0 / n_obs.max(1) as f64;
    CriticalValues {
        one_percent: polyval(&CRIT_1, inv),
        five_percent: polyval(&CRIT_5, inv),
        ten_percent: polyval(&CRIT_10, inv),
    }
}

/// `Σ c_i x^i`
fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}
