//! Synthetic (seasonal) ARIMA series.
//!
//! Used by the `tsa sample` command to produce demo data and by tests that
//! need a series with known dynamics. Generation is fully determined by the
//! seed.

use chrono::NaiveDateTime;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Column, Step, TableView};
use crate::error::{Result, TsError};
use crate::math::{differencing_polynomial, lag_polynomial, poly_mul};

/// Parameters of a simulated series.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSpec {
    pub n: usize,
    /// `φ_1..φ_p` of `y_t = Σ φ_i y_{t-i} + ...`
    pub ar: Vec<f64>,
    /// `θ_1..θ_q` of `... + e_t + Σ θ_j e_{t-j}`
    pub ma: Vec<f64>,
    pub d: usize,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    pub seasonal_d: usize,
    pub period: usize,
    /// Mean of the stationary (differenced) part.
    pub mean: f64,
    pub sigma: f64,
    /// Leading draws discarded so the ARMA recursion forgets its zero start.
    pub burn_in: usize,
    pub seed: u64,
}

impl SimulationSpec {
    pub fn white_noise(n: usize, seed: u64) -> Self {
        Self {
            n,
            ar: Vec::new(),
            ma: Vec::new(),
            d: 0,
            seasonal_ar: Vec::new(),
            seasonal_ma: Vec::new(),
            seasonal_d: 0,
            period: 0,
            mean: 0.0,
            sigma: 1.0,
            burn_in: 200,
            seed,
        }
    }

    pub fn ar1(phi: f64, n: usize, seed: u64) -> Self {
        Self::ar(vec![phi], n, seed)
    }

    pub fn ar(coefs: Vec<f64>, n: usize, seed: u64) -> Self {
        Self {
            ar: coefs,
            ..Self::white_noise(n, seed)
        }
    }

    pub fn with_ma(mut self, coefs: Vec<f64>) -> Self {
        self.ma = coefs;
        self
    }

    pub fn with_differencing(mut self, d: usize) -> Self {
        self.d = d;
        self
    }

    pub fn with_seasonal(mut self, ar: Vec<f64>, d: usize, ma: Vec<f64>, period: usize) -> Self {
        self.seasonal_ar = ar;
        self.seasonal_d = d;
        self.seasonal_ma = ma;
        self.period = period;
        self
    }

    pub fn with_mean(mut self, mean: f64) -> Self {
        self.mean = mean;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }
}

/// Simulate `spec.n` points.
pub fn simulate_arima(spec: &SimulationSpec) -> Result<Vec<f64>> {
    if spec.n == 0 {
        return Err(TsError::invalid_parameter("n", "sample size must be > 0"));
    }
    if !(spec.sigma.is_finite() && spec.sigma > 0.0) {
        return Err(TsError::invalid_parameter("sigma", "must be finite and > 0"));
    }
    let seasonal = !spec.seasonal_ar.is_empty() || !spec.seasonal_ma.is_empty() || spec.seasonal_d > 0;
    if seasonal && spec.period < 2 {
        return Err(TsError::invalid_parameter("period", "seasonal terms need a period >= 2"));
    }

    let period = spec.period.max(1);
    let ar = poly_mul(
        &lag_polynomial(&spec.ar, 1, -1.0),
        &lag_polynomial(&spec.seasonal_ar, period, -1.0),
    );
    let ma = poly_mul(
        &lag_polynomial(&spec.ma, 1, 1.0),
        &lag_polynomial(&spec.seasonal_ma, period, 1.0),
    );

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.sigma)
        .map_err(|e| TsError::invalid_parameter("sigma", format!("noise distribution error: {e}")))?;

    let total = spec.n + spec.burn_in;
    let e: Vec<f64> = (0..total).map(|_| normal.sample(&mut rng)).collect();
    let mut u = vec![0.0; total];
    for t in 0..total {
        let mut v = e[t];
        for (j, b) in ma.iter().enumerate().skip(1) {
            if j <= t {
                v += b * e[t - j];
            }
        }
        for (k, a) in ar.iter().enumerate().skip(1) {
            if k <= t {
                v -= a * u[t - k];
            }
        }
        u[t] = v;
    }

    let w: Vec<f64> = u[spec.burn_in..].iter().map(|v| v + spec.mean).collect();
    let delta = differencing_polynomial(spec.d, spec.seasonal_d, if seasonal { period } else { 0 });
    Ok(integrate(&w, &delta))
}

/// Undo differencing with a zero history: `y_t = w_t - Σ_{k≥1} δ_k y_{t-k}`.
fn integrate(w: &[f64], delta: &[f64]) -> Vec<f64> {
    let mut y: Vec<f64> = Vec::with_capacity(w.len());
    for t in 0..w.len() {
        let mut v = w[t];
        for (k, dk) in delta.iter().enumerate().skip(1) {
            if k <= t {
                v -= dk * y[t - k];
            }
        }
        y.push(v);
    }
    y
}

/// Simulated series as a two-column table (`timestamp_column`, `value_column`)
/// starting at `start` and advancing by `step`.
pub fn sample_table(
    spec: &SimulationSpec,
    start: NaiveDateTime,
    step: Step,
    timestamp_column: &str,
    value_column: &str,
) -> Result<TableView> {
    let values = simulate_arima(spec)?;
    let mut stamps = Vec::with_capacity(values.len());
    stamps.push(Some(start));
    for k in 1..values.len() {
        let k = u32::try_from(k).map_err(|_| TsError::invalid_parameter("n", "sample too long"))?;
        let ts = step
            .advance_timestamp(start, k)
            .ok_or_else(|| TsError::invalid_parameter("step", format!("cannot place {step} steps on a timestamp axis")))?;
        stamps.push(Some(ts));
    }
    TableView::new(vec![
        Column::timestamp(timestamp_column, stamps),
        Column::numeric(value_column, values.into_iter().map(Some).collect()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn same_seed_same_series() {
        let spec = SimulationSpec::ar1(0.7, 50, 42);
        assert_eq!(simulate_arima(&spec).unwrap(), simulate_arima(&spec).unwrap());
        let other = SimulationSpec::ar1(0.7, 50, 43);
        assert_ne!(simulate_arima(&spec).unwrap(), simulate_arima(&other).unwrap());
    }

    #[test]
    fn differenced_simulation_integrates_noise() {
        let noise = simulate_arima(&SimulationSpec::white_noise(20, 9)).unwrap();
        let walk = simulate_arima(&SimulationSpec::white_noise(20, 9).with_differencing(1)).unwrap();
        let mut acc = 0.0;
        for (w, e) in walk.iter().zip(&noise) {
            acc += e;
            assert!((w - acc).abs() < 1e-12);
        }
    }

    #[test]
    fn ar1_sample_mean_and_persistence() {
        let x = simulate_arima(&SimulationSpec::ar1(0.8, 5_000, 1).with_mean(3.0)).unwrap();
        let m = x.iter().sum::<f64>() / x.len() as f64;
        assert!((m - 3.0).abs() < 0.3);
    }

    #[test]
    fn sample_table_is_monthly() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let t = sample_table(&SimulationSpec::white_noise(3, 1), start, Step::Months(1), "date", "y").unwrap();
        let stamps = t.timestamps("date").unwrap();
        assert_eq!(stamps[2], Some(NaiveDate::from_ymd_opt(2020, 3, 31).unwrap().and_hms_opt(0, 0, 0).unwrap()));
        assert_eq!(t.n_rows(), 3);
    }

    #[test]
    fn rejects_seasonal_without_period() {
        let spec = SimulationSpec::white_noise(10, 1).with_seasonal(vec![0.5], 0, vec![], 1);
        assert!(simulate_arima(&spec).is_err());
    }
}
