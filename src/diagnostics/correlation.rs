//! Sample autocorrelation and partial autocorrelation.
//!
//! The mean is removed once over the whole series and every lag uses the
//! full-sample variance as denominator:
//!
//! ```text
//! ACF(k) = Σ_{t=k}^{n-1} (x_t - x̄)(x_{t-k} - x̄) / Σ_t (x_t - x̄)²
//! ```
//!
//! Lags are independent, so they are evaluated in parallel and collected back
//! in lag order.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::{Result, TsError};
use crate::math::{mean, solve_least_squares};

/// ACF for lags `0..=max_lag` (`acf[0] == 1`).
pub fn acf(x: &[f64], max_lag: usize) -> Result<Vec<f64>> {
    let n = x.len();
    if max_lag >= n {
        return Err(TsError::invalid_parameter(
            "max lag",
            format!("must be smaller than the series length {n}, got {max_lag}"),
        ));
    }
    let m = mean(x).ok_or(TsError::InsufficientData { required: 2, actual: 0 })?;
    let centered: Vec<f64> = x.iter().map(|v| v - m).collect();
    let denom: f64 = centered.iter().map(|v| v * v).sum();
    if denom <= f64::EPSILON {
        return Err(TsError::InvalidData(
            "autocorrelation is undefined for a constant series".to_string(),
        ));
    }

    let out = (0..=max_lag)
        .into_par_iter()
        .map(|k| {
            let num: f64 = (k..n).map(|t| centered[t] * centered[t - k]).sum();
            num / denom
        })
        .collect();
    Ok(out)
}

/// PACF for lags `1..=acf.len()-1` via the Durbin–Levinson recursion.
///
/// Lags past a degenerate step (prediction error variance reaching zero) are
/// reported as `NaN`.
pub fn pacf_durbin_levinson(acf: &[f64]) -> Vec<f64> {
    let max_lag = acf.len().saturating_sub(1);
    let mut pacf = Vec::with_capacity(max_lag);
    let mut phi: Vec<f64> = Vec::with_capacity(max_lag);

    for k in 1..=max_lag {
        let num = acf[k] - (1..k).map(|j| phi[j - 1] * acf[k - j]).sum::<f64>();
        let den = 1.0 - (1..k).map(|j| phi[j - 1] * acf[j]).sum::<f64>();
        if den.abs() <= 1e-12 {
            pacf.extend(std::iter::repeat_n(f64::NAN, max_lag - k + 1));
            break;
        }
        let phi_kk = num / den;
        let prev = phi.clone();
        for j in 1..k {
            phi[j - 1] = prev[j - 1] - phi_kk * prev[k - j - 1];
        }
        phi.push(phi_kk);
        pacf.push(phi_kk);
    }
    pacf
}

/// PACF for lags `1..=max_lag` by regression: the `k`-th value is the last
/// coefficient of an OLS fit of `x_t` on a constant and `x_{t-1}..x_{t-k}`.
pub fn pacf_ols(x: &[f64], max_lag: usize) -> Result<Vec<f64>> {
    let n = x.len();
    if max_lag == 0 || 2 * max_lag + 1 >= n {
        return Err(TsError::invalid_parameter(
            "max lag",
            format!("OLS partial autocorrelation needs 2 * max lag + 1 < n ({n}), got {max_lag}"),
        ));
    }

    (1..=max_lag)
        .into_par_iter()
        .map(|k| {
            let rows = n - k;
            let design = DMatrix::from_fn(rows, k + 1, |r, c| if c == 0 { 1.0 } else { x[r + k - c] });
            let target = DVector::from_iterator(rows, x[k..].iter().copied());
            solve_least_squares(&design, &target)
                .map(|beta| beta[k])
                .ok_or_else(|| TsError::InvalidData(format!("lag-{k} regression is singular")))
        })
        .collect()
}

/// Bartlett margins for the ACF at lags `1..`: `z · sqrt((1 + 2 Σ_{j<k} r_j²) / n)`.
pub fn acf_margins(acf: &[f64], n: usize, z: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(acf.len().saturating_sub(1));
    let mut cum = 0.0;
    for k in 1..acf.len() {
        out.push(z * ((1.0 + 2.0 * cum) / n as f64).sqrt());
        cum += acf[k] * acf[k];
    }
    out
}

/// Margin for every PACF lag: `z / sqrt(n)`.
pub fn pacf_margin(n: usize, z: f64) -> f64 {
    z / (n as f64).sqrt()
}
