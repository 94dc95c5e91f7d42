//! Conditional sum of squares (CSS) likelihood.
//!
//! On the differenced series `w` the regression error is
//! `u_t = w_t - c - x_t'β` and the ARMA part reads `A(B) u_t = M(B) e_t`.
//! Conditioning on the first `r = deg A` errors (their innovations are taken
//! as zero) the innovations follow from
//!
//! ```text
//! e_t = Σ_{k=0}^{r} a_k u_{t-k} - Σ_{j≥1} m_j e_{t-j}     (t ≥ r)
//! ```
//!
//! and the concentrated Gaussian log-likelihood over the `n_eff = len(w) - r`
//! usable points is `-n_eff/2 · (ln(2π σ̂²) + 1)` with `σ̂² = Σ e_t² / n_eff`.

use std::f64::consts::PI;

use crate::forecast::params::Coefficients;

/// Innovations and likelihood for one parameter vector.
#[derive(Debug, Clone)]
pub struct CssEvaluation {
    /// Regression errors `u_t`, one per differenced point.
    pub errors: Vec<f64>,
    /// Innovations `e_t`; the first `conditioning` entries are zero.
    pub innovations: Vec<f64>,
    /// Number of leading points the likelihood conditions on.
    pub conditioning: usize,
    pub n_eff: usize,
    pub sigma2: f64,
    pub loglik: f64,
}

/// Evaluate the CSS likelihood.
///
/// `exog` holds one row of regressors per point of `w`. Returns `None` when
/// no point is left after conditioning or the fit is degenerate (zero or
/// non-finite innovation variance).
pub fn evaluate(w: &[f64], exog: &[Vec<f64>], coefs: &Coefficients, period: usize) -> Option<CssEvaluation> {
    let ar = coefs.ar_polynomial(period);
    let ma = coefs.ma_polynomial(period);
    let r = ar.len() - 1;
    let m = w.len();
    if m <= r {
        return None;
    }

    let errors: Vec<f64> = w
        .iter()
        .enumerate()
        .map(|(t, v)| {
            let reg: f64 = exog
                .get(t)
                .map(|row| row.iter().zip(&coefs.exog).map(|(x, b)| x * b).sum())
                .unwrap_or(0.0);
            v - coefs.intercept - reg
        })
        .collect();

    let mut innovations = vec![0.0; m];
    for t in r..m {
        let mut e: f64 = ar.iter().enumerate().map(|(k, a)| a * errors[t - k]).sum();
        for (j, b) in ma.iter().enumerate().skip(1) {
            if j > t {
                break;
            }
            e -= b * innovations[t - j];
        }
        innovations[t] = e;
    }

    let n_eff = m - r;
    let ssr: f64 = innovations[r..].iter().map(|e| e * e).sum();
    let sigma2 = ssr / n_eff as f64;
    if !(sigma2.is_finite() && sigma2 > 0.0) {
        return None;
    }
    let loglik = -0.5 * n_eff as f64 * ((2.0 * PI * sigma2).ln() + 1.0);

    Some(CssEvaluation {
        errors,
        innovations,
        conditioning: r,
        n_eff,
        sigma2,
        loglik,
    })
}
