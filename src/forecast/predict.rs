//! Multi-step forecasts with analytic confidence intervals.
//!
//! Point forecasts run the ARMA recursion forward with future innovations set
//! to zero, add the regression mean and undo the differencing with the stored
//! training tail. The `h`-step error variance is `σ² Σ_{j<h} ψ_j²` where `ψ`
//! are the weights of `M(B) / (A(B)·Δ(B))`, so intervals widen with the
//! horizon (without bound for integrated models).

use tracing::debug;

use crate::domain::{ForecastPoint, ForecastResult, TimeSeries};
use crate::error::{Result, TsError};
use crate::forecast::fit::{FittedModel, difference_rows};
use crate::math::{poly_mul, psi_weights, two_sided_z};

/// Future regressor rows for `horizon` steps, in model order.
///
/// Each regressor must cover the full horizon; extra rows are ignored.
fn future_exog(model: &FittedModel, future: &[TimeSeries], horizon: usize) -> Result<Vec<Vec<f64>>> {
    let mut columns = Vec::with_capacity(model.spec.exogenous.len());
    for name in &model.spec.exogenous {
        let x = future
            .iter()
            .find(|s| &s.name == name)
            .ok_or_else(|| TsError::MissingExogenousData(format!("no future values for regressor '{name}'")))?;
        if x.len() < horizon {
            return Err(TsError::MissingExogenousData(format!(
                "regressor '{name}' covers {} of {horizon} forecast steps",
                x.len()
            )));
        }
        if x.len() > horizon {
            debug!(regressor = %name, rows = x.len(), horizon, "ignoring future regressor rows past the horizon");
        }
        let values = x.values[..horizon]
            .iter()
            .enumerate()
            .map(|(h, v)| {
                v.ok_or_else(|| {
                    TsError::MissingExogenousData(format!("regressor '{name}' has no value for step {}", h + 1))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        columns.push(values);
    }
    Ok((0..horizon).map(|h| columns.iter().map(|c| c[h]).collect()).collect())
}

/// Forecast `horizon` steps past the end of the training data.
pub fn forecast_model(
    model: &FittedModel,
    horizon: usize,
    future: &[TimeSeries],
    confidence_level: f64,
) -> Result<ForecastResult> {
    if horizon == 0 {
        return Err(TsError::invalid_parameter("horizon", "must be >= 1"));
    }
    let z = two_sided_z(confidence_level)?;
    let coefs = &model.coefficients;
    let period = model.layout.period;
    let delta = model.differencing();
    let ar = coefs.ar_polynomial(period);
    let ma = coefs.ma_polynomial(period);

    let regression: Vec<f64> = if model.spec.exogenous.is_empty() {
        vec![coefs.intercept; horizon]
    } else {
        let mut rows = model.exog_tail.clone();
        rows.extend(future_exog(model, future, horizon)?);
        difference_rows(&delta, &rows)
            .iter()
            .map(|row| coefs.intercept + row.iter().zip(&coefs.exog).map(|(x, b)| x * b).sum::<f64>())
            .collect()
    };

    let mut errors = model.error_tail.clone();
    let mut innovations = model.innovation_tail.clone();
    let mut levels = model.history.clone();
    let mut means = Vec::with_capacity(horizon);
    for reg in regression.iter().take(horizon) {
        let mut u = 0.0;
        for (k, a) in ar.iter().enumerate().skip(1) {
            if let Some(prev) = errors.len().checked_sub(k).map(|i| errors[i]) {
                u -= a * prev;
            }
        }
        for (j, b) in ma.iter().enumerate().skip(1) {
            if let Some(prev) = innovations.len().checked_sub(j).map(|i| innovations[i]) {
                u += b * prev;
            }
        }
        errors.push(u);
        innovations.push(0.0);

        let mut level = reg + u;
        for (k, d) in delta.iter().enumerate().skip(1) {
            if let Some(prev) = levels.len().checked_sub(k).map(|i| levels[i]) {
                level -= d * prev;
            }
        }
        levels.push(level);
        means.push(level);
    }

    let psi = psi_weights(&poly_mul(&ar, &delta), &ma, horizon);
    let index = model.index_tail.extend(model.step, horizon)?;
    let mut cumulative = 0.0;
    let points = means
        .iter()
        .zip(psi)
        .zip(index)
        .map(|((&mean, psi), index)| {
            cumulative += psi * psi;
            let half = z * (model.sigma2 * cumulative).sqrt();
            let (forecast, lower_bound, upper_bound) = if model.spec.log_transform {
                (mean.exp(), (mean - half).exp(), (mean + half).exp())
            } else {
                (mean, mean - half, mean + half)
            };
            ForecastPoint {
                index,
                forecast,
                lower_bound,
                upper_bound,
            }
        })
        .collect();

    debug!(model = %model.spec.label(), horizon, confidence_level, "forecast computed");
    Ok(ForecastResult {
        confidence_level,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate_arima};
    use crate::domain::{FitOptions, IndexValue, ModelSpec};
    use crate::forecast::fit::fit_model;

    #[test]
    fn random_walk_forecast_is_flat_with_sqrt_h_bands() {
        let y = simulate_arima(&SimulationSpec::white_noise(100, 5).with_differencing(1)).unwrap();
        let s = TimeSeries::from_values("walk", &y);
        let fit = fit_model(&s, &[], &ModelSpec::arima(0, 1, 0), &FitOptions::default(), None).unwrap();
        let fc = forecast_model(&fit.model, 4, &[], 0.95).unwrap();

        assert_eq!(fc.horizon(), 4);
        assert_eq!(fc.points[0].index, IndexValue::Position(100));
        for p in &fc.points {
            assert!((p.forecast - y[99]).abs() < 1e-12);
        }
        let w = fc.widths();
        assert!((w[3] / w[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn interval_width_never_shrinks() {
        let y = simulate_arima(
            &SimulationSpec::ar1(0.5, 240, 13)
                .with_ma(vec![0.4])
                .with_seasonal(vec![0.3], 0, vec![], 12),
        )
        .unwrap();
        let s = TimeSeries::from_values("y", &y);
        let spec = ModelSpec::arima(1, 0, 1).with_seasonal(1, 0, 0, 12);
        let fit = fit_model(&s, &[], &spec, &FitOptions::default(), None).unwrap();
        let w = forecast_model(&fit.model, 36, &[], 0.9).unwrap().widths();
        assert!(w.windows(2).all(|p| p[1] >= p[0] - 1e-12));
    }

    #[test]
    fn ar1_forecast_decays_to_the_mean() {
        let y = simulate_arima(&SimulationSpec::ar1(0.6, 400, 17).with_mean(20.0)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let fit = fit_model(&s, &[], &ModelSpec::arima(1, 0, 0), &FitOptions::default(), None).unwrap();
        let fc = forecast_model(&fit.model, 60, &[], 0.95).unwrap();
        let last = fc.points[59].forecast;
        assert!((last - fit.model.coefficients.intercept).abs() < 1e-6);
        assert!(fc.points.iter().all(|p| p.lower_bound < p.forecast && p.forecast < p.upper_bound));
    }

    #[test]
    fn horizon_and_confidence_are_checked() {
        let y = simulate_arima(&SimulationSpec::white_noise(50, 1)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let fit = fit_model(&s, &[], &ModelSpec::arima(0, 0, 0), &FitOptions::default(), None).unwrap();
        assert!(matches!(
            forecast_model(&fit.model, 0, &[], 0.95),
            Err(TsError::InvalidParameter { .. })
        ));
        assert!(forecast_model(&fit.model, 3, &[], 1.5).is_err());
    }

    #[test]
    fn short_future_regressor_is_rejected_and_long_one_truncated() {
        let noise = simulate_arima(&SimulationSpec::white_noise(120, 23)).unwrap();
        let x: Vec<f64> = (0..120).map(|t| (t % 5) as f64).collect();
        let y: Vec<f64> = noise.iter().zip(&x).map(|(e, x)| 1.0 + 3.0 * x + e).collect();
        let spec = ModelSpec::arima(0, 0, 0).with_exogenous(vec!["x".into()]);
        let fit = fit_model(
            &TimeSeries::from_values("y", &y),
            &[TimeSeries::from_values("x", &x)],
            &spec,
            &FitOptions::default(),
            None,
        )
        .unwrap();

        let short = TimeSeries::from_values("x", &[1.0, 2.0]);
        let err = forecast_model(&fit.model, 3, &[short], 0.95).unwrap_err();
        assert!(matches!(err, TsError::MissingExogenousData(_)));
        let err = forecast_model(&fit.model, 3, &[], 0.95).unwrap_err();
        assert!(matches!(err, TsError::MissingExogenousData(_)));

        let long = TimeSeries::from_values("x", &[0.0, 4.0, 1.0, 2.0, 3.0]);
        let fc = forecast_model(&fit.model, 2, &[long], 0.95).unwrap();
        assert_eq!(fc.horizon(), 2);
        assert!(fc.points[1].forecast - fc.points[0].forecast > 10.0);
    }

    #[test]
    fn log_model_bounds_are_positive_and_skewed() {
        let base = simulate_arima(&SimulationSpec::ar1(0.4, 150, 29).with_sigma(0.1)).unwrap();
        let y: Vec<f64> = base.iter().map(|v| (3.0 + v).exp()).collect();
        let spec = ModelSpec::arima(1, 0, 0).with_log_transform(true);
        let fit = fit_model(&TimeSeries::from_values("y", &y), &[], &spec, &FitOptions::default(), None).unwrap();
        let fc = forecast_model(&fit.model, 5, &[], 0.95).unwrap();
        for p in &fc.points {
            assert!(p.lower_bound > 0.0);
            assert!(p.upper_bound - p.forecast > p.forecast - p.lower_bound);
        }
    }
}
