//! Small descriptive statistics and distribution helpers.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::error::{Result, TsError};

pub fn mean(x: &[f64]) -> Option<f64> {
    if x.is_empty() {
        return None;
    }
    Some(x.iter().sum::<f64>() / x.len() as f64)
}

/// Variance with `ddof` delta degrees of freedom.
pub fn variance(x: &[f64], ddof: usize) -> Option<f64> {
    if x.len() <= ddof {
        return None;
    }
    let m = mean(x)?;
    Some(x.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (x.len() - ddof) as f64)
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| TsError::InvalidData(format!("normal distribution: {e}")))
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(x))
}

/// Two-sided critical value `z_{1 - α/2}` for a confidence level `1 - α`.
pub fn two_sided_z(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(TsError::invalid_parameter(
            "confidence level",
            format!("must be in (0, 1), got {confidence_level}"),
        ));
    }
    Ok(standard_normal()?.inverse_cdf(0.5 + confidence_level / 2.0))
}

/// Upper tail probability of a chi-squared variate.
pub fn chi_squared_sf(x: f64, dof: f64) -> Result<f64> {
    let dist = ChiSquared::new(dof).map_err(|e| TsError::InvalidData(format!("chi-squared distribution: {e}")))?;
    Ok(1.0 - dist.cdf(x))
}

/// `c[0] + c[1]·x + c[2]·x² + …`
fn horner(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, v| acc * x + v)
}

/// Shapiro–Wilk `W` and its p-value (Royston's 1995 approximation).
///
/// The weights come from normal scores with polynomial corrections for the
/// two most extreme order statistics; the p-value maps `W` to a normal
/// variate. Accuracy is documented for `3 <= n <= 5000`.
pub fn shapiro_wilk(x: &[f64]) -> Result<(f64, f64)> {
    const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
    const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
    const G: [f64; 2] = [-2.273, 0.459];
    const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
    const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
    const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
    const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];

    let n = x.len();
    if n < 3 {
        return Err(TsError::InsufficientData { required: 3, actual: n });
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    let m = mean(&sorted).unwrap_or(0.0);
    let ss: f64 = sorted.iter().map(|v| (v - m) * (v - m)).sum();
    if ss <= f64::EPSILON {
        return Err(TsError::InvalidData("normality test needs non-constant data".to_string()));
    }

    // Weights for the lower half, paired with `x_(n-1-i) - x_(i)`.
    let half = n / 2;
    let weights: Vec<f64> = if n == 3 {
        vec![std::f64::consts::FRAC_1_SQRT_2]
    } else {
        let normal = standard_normal()?;
        let an = n as f64;
        let scores: Vec<f64> = (1..=half)
            .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (an + 0.25)))
            .collect();
        // Scores are antisymmetric (the middle one is 0 for odd n).
        let summ2 = 2.0 * scores.iter().map(|v| v * v).sum::<f64>();
        let ssumm2 = summ2.sqrt();
        let rsn = 1.0 / an.sqrt();
        let a1 = horner(&C1, rsn) - scores[0] / ssumm2;
        let (fixed, fac) = if n > 5 {
            let a2 = horner(&C2, rsn) - scores[1] / ssumm2;
            let fac = ((summ2 - 2.0 * scores[0].powi(2) - 2.0 * scores[1].powi(2))
                / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
                .sqrt();
            (vec![a1, a2], fac)
        } else {
            let fac = ((summ2 - 2.0 * scores[0].powi(2)) / (1.0 - 2.0 * a1 * a1)).sqrt();
            (vec![a1], fac)
        };
        let rest = scores[fixed.len()..].iter().map(|v| -v / fac);
        fixed.iter().copied().chain(rest).collect()
    };

    let b: f64 = weights
        .iter()
        .enumerate()
        .map(|(i, a)| a * (sorted[n - 1 - i] - sorted[i]))
        .sum();
    let w = (b * b / ss).min(1.0);

    let p_value = if n == 3 {
        let pi6 = 6.0 / std::f64::consts::PI;
        (pi6 * (w.sqrt().asin() - std::f64::consts::FRAC_PI_3)).clamp(0.0, 1.0)
    } else {
        let an = n as f64;
        let mut y = (1.0 - w).ln();
        let (mu, sigma) = if n <= 11 {
            let gamma = horner(&G, an);
            if y >= gamma {
                return Ok((w, 0.0));
            }
            y = -(gamma - y).ln();
            (horner(&C3, an), horner(&C4, an).exp())
        } else {
            let xx = an.ln();
            (horner(&C5, xx), horner(&C6, xx).exp())
        };
        1.0 - normal_cdf((y - mu) / sigma)?
    };
    Ok((w, p_value))
}
