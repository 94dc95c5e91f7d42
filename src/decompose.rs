//! Classical seasonal decomposition.
//!
//! - trend: centered moving average over one period (a `2×m` average for even
//!   periods so the window stays centered)
//! - seasonal: average detrended value per position in the cycle, normalized to
//!   sum to zero (additive) or average one (multiplicative), then tiled over the
//!   whole series
//! - residual: what is left after removing trend and seasonal
//!
//! The first and last `period / 2` points have no centered window; trend and
//! residual are "no data" there while the output keeps the input length.

use tracing::debug;

use crate::domain::{Decomposition, DecompositionMode, TimeSeries};
use crate::error::{Result, TsError};

pub fn decompose(series: &TimeSeries, period: usize, mode: DecompositionMode) -> Result<Decomposition> {
    let n = series.len();
    if period < 2 || period > n / 2 {
        return Err(TsError::invalid_parameter(
            "period",
            format!("must satisfy 2 <= period <= {} (half the series length), got {period}", n / 2),
        ));
    }
    let y = series.dense_values()?;
    if mode == DecompositionMode::Multiplicative && y.iter().any(|v| *v <= 0.0) {
        return Err(TsError::InvalidData(
            "multiplicative decomposition requires strictly positive values".to_string(),
        ));
    }

    let trend = centered_moving_average(&y, period);

    let detrended: Vec<Option<f64>> = y
        .iter()
        .zip(&trend)
        .map(|(v, t)| {
            t.map(|t| match mode {
                DecompositionMode::Additive => v - t,
                DecompositionMode::Multiplicative => v / t,
            })
        })
        .collect();

    let mut cycle = vec![0.0; period];
    for (pos, slot) in cycle.iter_mut().enumerate() {
        let values: Vec<f64> = detrended.iter().skip(pos).step_by(period).flatten().copied().collect();
        // period <= n/2 guarantees every position has at least one centered value.
        *slot = values.iter().sum::<f64>() / values.len().max(1) as f64;
    }
    let level = cycle.iter().sum::<f64>() / period as f64;
    for s in &mut cycle {
        match mode {
            DecompositionMode::Additive => *s -= level,
            DecompositionMode::Multiplicative => *s /= level,
        }
    }

    let seasonal: Vec<Option<f64>> = (0..n).map(|i| Some(cycle[i % period])).collect();
    let residual = y
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((v, t), s)| match (t, s) {
            (Some(t), Some(s)) => Some(match mode {
                DecompositionMode::Additive => v - t - s,
                DecompositionMode::Multiplicative => v / (t * s),
            }),
            _ => None,
        })
        .collect();

    debug!(series = %series.name, period, ?mode, "decomposition computed");
    Ok(Decomposition {
        mode,
        period,
        trend,
        seasonal,
        residual,
    })
}

/// Centered moving average; `None` where the window does not fit.
pub fn centered_moving_average(y: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = y.len();
    let half = period / 2;
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] = 0.5 / period as f64;
        w[period] = 0.5 / period as f64;
        w
    } else {
        vec![1.0 / period as f64; period]
    };

    (0..n)
        .map(|i| {
            if i < half || i + half >= n {
                return None;
            }
            Some(weights.iter().enumerate().map(|(k, w)| w * y[i - half + k]).sum())
        })
        .collect()
}
