//! Parameter vectors of a (S)ARIMA(X) model.
//!
//! The optimizer works on an unconstrained vector; [`ParamLayout::transform`]
//! maps it to natural coefficients whose AR polynomials are stationary and
//! whose MA polynomials are invertible.

use serde::{Deserialize, Serialize};

use crate::domain::ModelSpec;
use crate::math::{constrain_stationary, lag_polynomial, poly_mul};

/// Where each parameter group sits in a flat parameter vector.
///
/// Order: intercept, exogenous coefficients, AR, seasonal AR, MA, seasonal MA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamLayout {
    pub intercept: bool,
    pub n_exog: usize,
    pub p: usize,
    pub seasonal_p: usize,
    pub q: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl ParamLayout {
    pub fn from_spec(spec: &ModelSpec) -> Self {
        let seasonal = spec.active_seasonal();
        Self {
            intercept: spec.includes_mean(),
            n_exog: spec.exogenous.len(),
            p: spec.order.p,
            seasonal_p: seasonal.map(|s| s.p).unwrap_or(0),
            q: spec.order.q,
            seasonal_q: seasonal.map(|s| s.q).unwrap_or(0),
            period: seasonal.map(|s| s.period).unwrap_or(0),
        }
    }

    pub fn len(&self) -> usize {
        usize::from(self.intercept) + self.n_exog + self.p + self.seasonal_p + self.q + self.seasonal_q
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of leading regression parameters (intercept + exogenous).
    pub fn n_regression(&self) -> usize {
        usize::from(self.intercept) + self.n_exog
    }

    /// Display names, e.g. `intercept`, `price`, `ar.L1`, `ma.S.L12`.
    pub fn names(&self, exogenous: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(self.len());
        if self.intercept {
            out.push("intercept".to_string());
        }
        out.extend(exogenous.iter().cloned());
        out.extend((1..=self.p).map(|i| format!("ar.L{i}")));
        out.extend((1..=self.seasonal_p).map(|i| format!("ar.S.L{}", i * self.period)));
        out.extend((1..=self.q).map(|i| format!("ma.L{i}")));
        out.extend((1..=self.seasonal_q).map(|i| format!("ma.S.L{}", i * self.period)));
        out
    }

    /// Unconstrained optimizer vector to natural coefficients.
    pub fn transform(&self, x: &[f64]) -> Coefficients {
        let mut at = 0;
        let mut take = |n: usize| {
            let s = &x[at..at + n];
            at += n;
            s
        };
        let intercept = if self.intercept { take(1)[0] } else { 0.0 };
        let exog = take(self.n_exog).to_vec();
        let ar = constrain_stationary(take(self.p));
        let seasonal_ar = constrain_stationary(take(self.seasonal_p));
        let ma = constrain_stationary(take(self.q)).into_iter().map(|v| -v).collect();
        let seasonal_ma = constrain_stationary(take(self.seasonal_q)).into_iter().map(|v| -v).collect();
        Coefficients {
            intercept,
            exog,
            ar,
            seasonal_ar,
            ma,
            seasonal_ma,
        }
    }

    /// Flat natural vector to coefficients (no constraints applied).
    pub fn unpack(&self, params: &[f64]) -> Coefficients {
        let mut at = 0;
        let mut take = |n: usize| {
            let s = params[at..at + n].to_vec();
            at += n;
            s
        };
        let intercept = if self.intercept { take(1)[0] } else { 0.0 };
        Coefficients {
            intercept,
            exog: take(self.n_exog),
            ar: take(self.p),
            seasonal_ar: take(self.seasonal_p),
            ma: take(self.q),
            seasonal_ma: take(self.seasonal_q),
        }
    }
}

/// Natural model coefficients.
///
/// Conventions: `y_t = Σ φ_i y_{t-i} + e_t + Σ θ_j e_{t-j}` on the
/// differenced, regression-adjusted series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub intercept: f64,
    pub exog: Vec<f64>,
    pub ar: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

impl Coefficients {
    /// Flatten in [`ParamLayout`] order.
    pub fn pack(&self, layout: &ParamLayout) -> Vec<f64> {
        let mut out = Vec::with_capacity(layout.len());
        if layout.intercept {
            out.push(self.intercept);
        }
        out.extend(&self.exog);
        out.extend(&self.ar);
        out.extend(&self.seasonal_ar);
        out.extend(&self.ma);
        out.extend(&self.seasonal_ma);
        out
    }

    /// `(1 - Σ φ_i B^i)(1 - Σ Φ_j B^{s·j})`
    pub fn ar_polynomial(&self, period: usize) -> Vec<f64> {
        poly_mul(
            &lag_polynomial(&self.ar, 1, -1.0),
            &lag_polynomial(&self.seasonal_ar, period.max(1), -1.0),
        )
    }

    /// `(1 + Σ θ_i B^i)(1 + Σ Θ_j B^{s·j})`
    pub fn ma_polynomial(&self, period: usize) -> Vec<f64> {
        poly_mul(
            &lag_polynomial(&self.ma, 1, 1.0),
            &lag_polynomial(&self.seasonal_ma, period.max(1), 1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_names_and_round_trip() {
        let spec = ModelSpec::arima(1, 0, 1)
            .with_seasonal(1, 0, 0, 4)
            .with_exogenous(vec!["promo".into()]);
        let layout = ParamLayout::from_spec(&spec);
        assert_eq!(layout.len(), 5);
        assert_eq!(
            layout.names(&spec.exogenous),
            vec!["intercept", "promo", "ar.L1", "ar.S.L4", "ma.L1"]
        );

        let natural = vec![2.0, 0.5, 0.3, -0.2, 0.4];
        let coefs = layout.unpack(&natural);
        assert_eq!(coefs.pack(&layout), natural);
        assert_eq!(coefs.ar_polynomial(4), vec![1.0, -0.3, 0.0, 0.0, 0.2, -0.06]);
    }

    #[test]
    fn transform_keeps_regression_terms_and_flips_ma_sign() {
        let spec = ModelSpec::arima(0, 0, 1);
        let layout = ParamLayout::from_spec(&spec);
        let coefs = layout.transform(&[5.0, 1.0]);
        assert_eq!(coefs.intercept, 5.0);
        let r = 1.0 / 2.0f64.sqrt();
        assert!((coefs.ma[0] + r).abs() < 1e-12);
    }
}
