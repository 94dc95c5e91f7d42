//! Ordinary least squares.
//!
//! Two entry points:
//!
//! - [`solve_least_squares`]: coefficients only, SVD-based so tall and
//!   near-singular design matrices are handled without panicking
//!   (Nalgebra's `QR::solve` is intended for square systems).
//! - [`ols`]: coefficients plus residual variance and coefficient standard
//!   errors, used by the ADF regression and the OLS partial autocorrelation.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Lagged regressors of a persistent series are nearly collinear, so try
    // progressively looser tolerances before giving up.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// OLS estimates with classical (homoskedastic) standard errors.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub beta: DVector<f64>,
    pub residuals: DVector<f64>,
    /// `SSR / (n - k)`
    pub sigma2: f64,
    pub std_errors: DVector<f64>,
}

impl OlsFit {
    /// `beta[i] / se[i]`.
    pub fn t_stat(&self, i: usize) -> f64 {
        self.beta[i] / self.std_errors[i]
    }
}

/// Fit `y = X β + ε`.
///
/// Returns `None` when there are no residual degrees of freedom or `X'X` is
/// singular.
pub fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<OlsFit> {
    let (n, k) = x.shape();
    if n <= k || y.len() != n {
        return None;
    }
    let beta = solve_least_squares(x, y)?;
    let residuals = y - x * &beta;
    let sigma2 = residuals.norm_squared() / (n - k) as f64;

    let xtx_inv = (x.transpose() * x).try_inverse()?;
    let std_errors = DVector::from_iterator(k, (0..k).map(|i| (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt()));
    if !std_errors.iter().all(|v| v.is_finite()) {
        return None;
    }

    Some(OlsFit {
        beta,
        residuals,
        sigma2,
        std_errors,
    })
}
