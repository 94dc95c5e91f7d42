//! Lag-polynomial arithmetic.
//!
//! A polynomial in the backshift operator `B` is stored as its coefficient
//! vector `c` with `c[k]` the coefficient of `B^k`; `c[0]` is always `1` for
//! the AR, MA and differencing polynomials used here.

/// Multiply two lag polynomials.
pub fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign·(c_1 B^step + c_2 B^{2·step} + ...)`.
pub fn lag_polynomial(coefs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut out = vec![0.0; coefs.len() * step + 1];
    out[0] = 1.0;
    for (k, &c) in coefs.iter().enumerate() {
        out[(k + 1) * step] = sign * c;
    }
    out
}

/// `(1 - B)^d (1 - B^s)^D`.
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut out = vec![1.0];
    for _ in 0..d {
        out = poly_mul(&out, &[1.0, -1.0]);
    }
    if period > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            out = poly_mul(&out, &seasonal);
        }
    }
    out
}

/// Apply a lag polynomial to a series: `w_t = Σ_k c_k y_{t-k}`.
///
/// The first `c.len() - 1` points have incomplete history and are dropped.
pub fn apply_polynomial(c: &[f64], y: &[f64]) -> Vec<f64> {
    let reach = c.len().saturating_sub(1);
    if y.len() <= reach {
        return Vec::new();
    }
    (reach..y.len())
        .map(|t| c.iter().enumerate().map(|(k, &ck)| ck * y[t - k]).sum())
        .collect()
}

/// Coefficients `ψ_0..ψ_{n-1}` of `θ(B) / φ(B)`.
///
/// `ar` and `ma` are full polynomials (`ar[0] = ma[0] = 1`).
pub fn psi_weights(ar: &[f64], ma: &[f64], n: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(n);
    for j in 0..n {
        let mut v = ma.get(j).copied().unwrap_or(0.0);
        for k in 1..=j.min(ar.len().saturating_sub(1)) {
            v -= ar[k] * psi[j - k];
        }
        psi.push(v);
    }
    psi
}

/// Map unconstrained reals to the coefficients of a stationary AR polynomial.
///
/// Each input is squashed to a partial autocorrelation in `(-1, 1)` with
/// `x / sqrt(1 + x²)`, and the Durbin–Levinson recursion turns those into AR
/// coefficients `φ_1..φ_p` of `y_t = Σ φ_j y_{t-j} + e_t`.
pub fn constrain_stationary(x: &[f64]) -> Vec<f64> {
    let partials: Vec<f64> = x.iter().map(|v| v / (1.0 + v * v).sqrt()).collect();
    from_partials(&partials)
}

/// Inverse of the squashing step: partial autocorrelation `r` to an
/// unconstrained real.
pub fn unconstrain_partial(r: f64) -> f64 {
    let r = r.clamp(-0.95, 0.95);
    r / (1.0 - r * r).sqrt()
}

/// Durbin–Levinson: partial autocorrelations to AR coefficients.
pub fn from_partials(partials: &[f64]) -> Vec<f64> {
    let mut phi: Vec<f64> = Vec::with_capacity(partials.len());
    for (k, &r) in partials.iter().enumerate() {
        let prev = phi.clone();
        for j in 0..k {
            phi[j] = prev[j] - r * prev[k - 1 - j];
        }
        phi.push(r);
    }
    phi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differencing_polynomial_expands() {
        assert_eq!(differencing_polynomial(2, 0, 0), vec![1.0, -2.0, 1.0]);
        let p = differencing_polynomial(1, 1, 4);
        assert_eq!(p, vec![1.0, -1.0, 0.0, 0.0, -1.0, 1.0]);
    }

    #[test]
    fn apply_first_difference() {
        let w = apply_polynomial(&[1.0, -1.0], &[1.0, 4.0, 9.0, 16.0]);
        assert_eq!(w, vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn psi_weights_of_ar1_are_powers() {
        let ar = lag_polynomial(&[0.5], 1, -1.0);
        let psi = psi_weights(&ar, &[1.0], 4);
        for (j, v) in psi.iter().enumerate() {
            assert!((v - 0.5f64.powi(j as i32)).abs() < 1e-12);
        }
    }

    #[test]
    fn random_walk_psi_weights_are_ones() {
        let ar = differencing_polynomial(1, 0, 0);
        let psi = psi_weights(&ar, &[1.0], 5);
        assert!(psi.iter().all(|v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn constrained_ar_is_stationary() {
        // An AR(2) is stationary iff |φ2| < 1, φ1 + φ2 < 1, φ2 - φ1 < 1.
        for x in [[3.0, 3.0], [-5.0, 2.0], [10.0, -10.0], [0.1, 0.2]] {
            let phi = constrain_stationary(&x);
            assert!(phi[1].abs() < 1.0);
            assert!(phi[0] + phi[1] < 1.0);
            assert!(phi[1] - phi[0] < 1.0);
        }
    }

    #[test]
    fn single_partial_is_the_coefficient() {
        let x = unconstrain_partial(0.6);
        let phi = constrain_stationary(&[x]);
        assert!((phi[0] - 0.6).abs() < 1e-12);
    }
}
