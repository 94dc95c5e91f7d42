//! Model estimation.
//!
//! Steps:
//!
//! 1. transform (`ln y` when requested) and difference the target and the
//!    exogenous regressors with `(1 - B)^d (1 - B^s)^D`
//! 2. start from OLS regression coefficients and the sample PACF of the
//!    regression errors
//! 3. minimize the negative CSS log-likelihood with Nelder–Mead over the
//!    unconstrained parameter vector
//! 4. standard errors from a numerical Hessian in natural parameters
//! 5. in-sample predictions, either one step ahead from the observations or
//!    dynamic (earlier predictions stand in for the lagged observations)
//!
//! The result keeps only the tail of the training data that the forecast
//! recursion needs, so it can be saved and reloaded without the input table.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::diagnostics::{acf, pacf_durbin_levinson};
use crate::domain::{FitOptions, ModelSpec, SeriesIndex, Step, TimeSeries};
use crate::error::{Result, TsError};
use crate::forecast::css::{self, CssEvaluation};
use crate::forecast::params::{Coefficients, ParamLayout};
use crate::math::{apply_polynomial, differencing_polynomial, minimize, solve_least_squares, unconstrain_partial, variance};
use crate::validate::infer_frequency;

/// Initial simplex edge for the transformed ARMA parameters.
const ARMA_STEP: f64 = 0.3;

/// One estimated coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEstimate {
    pub name: String,
    pub value: f64,
    /// `None` when the Hessian could not be inverted.
    pub std_error: Option<f64>,
}

/// Everything needed to forecast from a fitted model.
///
/// Serializable: this is the saved-model format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub spec: ModelSpec,
    pub layout: ParamLayout,
    pub coefficients: Coefficients,
    pub parameters: Vec<ParameterEstimate>,
    pub sigma2: f64,
    pub loglik: f64,
    pub aic: f64,
    pub bic: f64,
    /// In-sample mean squared / absolute error on the original scale.
    pub mse: f64,
    pub mae: f64,
    /// Points the likelihood was evaluated on.
    pub n_obs: usize,
    pub iterations: u64,
    pub series_name: String,
    pub index_name: Option<String>,
    /// Last index entry; forecasts continue from here.
    pub index_tail: SeriesIndex,
    pub step: Step,
    /// Last `d + s·D` training values on the model scale.
    pub history: Vec<f64>,
    /// Last regression errors `u_t` (AR reach).
    pub error_tail: Vec<f64>,
    /// Last innovations `e_t` (MA reach).
    pub innovation_tail: Vec<f64>,
    /// Last `d + s·D` rows of the raw exogenous regressors.
    pub exog_tail: Vec<Vec<f64>>,
}

impl FittedModel {
    /// `(1 - B)^d (1 - B^s)^D` of the model.
    pub fn differencing(&self) -> Vec<f64> {
        differencing_for(&self.spec)
    }
}

/// Output of a fit: the model plus in-sample series aligned to the input rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub model: FittedModel,
    pub index: SeriesIndex,
    /// In-sample predictions (original scale).
    pub in_sample: Vec<Option<f64>>,
    /// `y - in_sample` (original scale).
    pub residuals: Vec<Option<f64>>,
}

fn differencing_for(spec: &ModelSpec) -> Vec<f64> {
    match spec.active_seasonal() {
        Some(s) => differencing_polynomial(spec.order.d, s.d, s.period),
        None => differencing_polynomial(spec.order.d, 0, 0),
    }
}

/// Exogenous regressors as rows, in the order `names` lists them.
///
/// Every regressor must share the target's index and have no gaps.
fn exog_rows(series: &TimeSeries, exog: &[TimeSeries], names: &[String]) -> Result<Vec<Vec<f64>>> {
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let x = exog
            .iter()
            .find(|s| &s.name == name)
            .ok_or_else(|| TsError::MissingExogenousData(format!("regressor '{name}' was not supplied")))?;
        if x.index != series.index {
            return Err(TsError::IndexMismatch(format!(
                "regressor '{name}' is not indexed like '{}'",
                series.name
            )));
        }
        columns.push(x.dense_values()?);
    }
    Ok((0..series.len())
        .map(|t| columns.iter().map(|c| c[t]).collect())
        .collect())
}

/// Apply a lag polynomial to every column of a row-major matrix.
pub(crate) fn difference_rows(delta: &[f64], rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let reach = delta.len() - 1;
    let k = rows.first().map(Vec::len).unwrap_or(0);
    if k == 0 {
        return vec![Vec::new(); rows.len().saturating_sub(reach)];
    }
    let columns: Vec<Vec<f64>> = (0..k)
        .map(|j| {
            let col: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            apply_polynomial(delta, &col)
        })
        .collect();
    let m = columns[0].len();
    (0..m).map(|t| columns.iter().map(|c| c[t]).collect()).collect()
}

/// Fit `spec` to `series` with one-step-ahead in-sample predictions.
///
/// `exog` must contain one series per name in `spec.exogenous`. `step` is the
/// index step used to place forecasts; it is inferred from the index when
/// absent.
pub fn fit_model(
    series: &TimeSeries,
    exog: &[TimeSeries],
    spec: &ModelSpec,
    options: &FitOptions,
    step: Option<Step>,
) -> Result<FitResult> {
    fit_model_with(series, exog, spec, options, step, false)
}

/// [`fit_model`] with a choice of in-sample prediction: when `dynamic` is set
/// every row after the conditioning window is predicted from earlier
/// predictions instead of the observed values.
pub fn fit_model_with(
    series: &TimeSeries,
    exog: &[TimeSeries],
    spec: &ModelSpec,
    options: &FitOptions,
    step: Option<Step>,
    dynamic: bool,
) -> Result<FitResult> {
    spec.validate()?;
    let raw = series.dense_values()?;
    let n = raw.len();
    if n < spec.min_rows() {
        return Err(TsError::InsufficientData {
            required: spec.min_rows(),
            actual: n,
        });
    }
    if spec.log_transform && raw.iter().any(|v| *v <= 0.0) {
        return Err(TsError::InvalidData(
            "log transform requires strictly positive values".to_string(),
        ));
    }
    let y: Vec<f64> = if spec.log_transform {
        raw.iter().map(|v| v.ln()).collect()
    } else {
        raw.clone()
    };
    let x_rows = exog_rows(series, exog, &spec.exogenous)?;

    let layout = ParamLayout::from_spec(spec);
    let delta = differencing_for(spec);
    let reach = delta.len() - 1;
    let ar_reach = layout.p + layout.seasonal_p * layout.period;
    let required = reach + ar_reach + layout.len() + 1;
    if n < required {
        return Err(TsError::InsufficientData { required, actual: n });
    }

    let w = apply_polynomial(&delta, &y);
    let xw = difference_rows(&delta, &x_rows);
    let period = layout.period;

    let (x0, steps) = initial_guess(&w, &xw, &layout);
    let objective = |x: &[f64]| {
        css::evaluate(&w, &xw, &layout.transform(x), period)
            .map(|e| -e.loglik)
            .unwrap_or(f64::NAN)
    };
    let min = minimize(objective, &x0, &steps, options)?;

    let coefficients = layout.transform(&min.params);
    let eval = css::evaluate(&w, &xw, &coefficients, period)
        .ok_or_else(|| TsError::Convergence {
            iterations: min.iterations,
            reason: "likelihood is degenerate at the optimum".to_string(),
        })?;

    let natural = coefficients.pack(&layout);
    let std_errors = hessian_std_errors(&natural, |theta| {
        css::evaluate(&w, &xw, &layout.unpack(theta), period)
            .map(|e| -e.loglik)
            .unwrap_or(f64::NAN)
    });
    let parameters = layout
        .names(&spec.exogenous)
        .into_iter()
        .zip(&natural)
        .zip(std_errors)
        .map(|((name, &value), std_error)| ParameterEstimate { name, value, std_error })
        .collect();

    let predicted = if dynamic {
        dynamic_predictions(&y, &w, &eval, &coefficients, &delta, period)
    } else {
        one_step_predictions(&y, &eval, reach)
    };
    let (in_sample, residuals) = in_sample_fit(&raw, &predicted, spec.log_transform);
    let observed: Vec<f64> = residuals.iter().flatten().copied().collect();
    let count = observed.len().max(1) as f64;
    let mse = observed.iter().map(|r| r * r).sum::<f64>() / count;
    let mae = observed.iter().map(|r| r.abs()).sum::<f64>() / count;

    let k = (layout.len() + 1) as f64;
    let aic = -2.0 * eval.loglik + 2.0 * k;
    let bic = -2.0 * eval.loglik + k * (eval.n_eff as f64).ln();

    let step = step
        .or_else(|| infer_frequency(series).map(|r| r.step))
        .unwrap_or(Step::Positions(1));
    let ma_reach = coefficients.ma_polynomial(period).len() - 1;

    info!(
        model = %spec.label(),
        iterations = min.iterations,
        loglik = eval.loglik,
        sigma2 = eval.sigma2,
        "model fitted"
    );

    let model = FittedModel {
        spec: spec.clone(),
        layout,
        coefficients,
        parameters,
        sigma2: eval.sigma2,
        loglik: eval.loglik,
        aic,
        bic,
        mse,
        mae,
        n_obs: eval.n_eff,
        iterations: min.iterations,
        series_name: series.name.clone(),
        index_name: series.index_name.clone(),
        index_tail: series.index.tail(),
        step,
        history: tail(&y, reach),
        error_tail: tail(&eval.errors, ar_reach),
        innovation_tail: tail(&eval.innovations, ma_reach),
        exog_tail: if spec.exogenous.is_empty() {
            Vec::new()
        } else {
            x_rows[n - reach..].to_vec()
        },
    };

    Ok(FitResult {
        model,
        index: series.index.clone(),
        in_sample,
        residuals,
    })
}

fn tail(v: &[f64], k: usize) -> Vec<f64> {
    v[v.len().saturating_sub(k)..].to_vec()
}

/// Starting point and simplex steps for the unconstrained parameter vector.
fn initial_guess(w: &[f64], xw: &[Vec<f64>], layout: &ParamLayout) -> (Vec<f64>, Vec<f64>) {
    let m = w.len();
    let scale = variance(w, 1).map(f64::sqrt).filter(|s| *s > 0.0).unwrap_or(1.0);
    let n_reg = layout.n_regression();

    let mut beta = vec![0.0; n_reg];
    if n_reg > 0 {
        let design = DMatrix::from_fn(m, n_reg, |t, j| match (layout.intercept, j) {
            (true, 0) => 1.0,
            (true, j) => xw[t][j - 1],
            (false, j) => xw[t][j],
        });
        let target = DVector::from_column_slice(w);
        if let Some(b) = solve_least_squares(&design, &target) {
            beta = b.iter().copied().collect();
        }
    }

    let mut x0 = beta.clone();
    let mut steps: Vec<f64> = beta
        .iter()
        .enumerate()
        .map(|(j, b)| {
            let col_scale = match (layout.intercept, j) {
                (true, 0) => 1.0,
                (true, j) => column_scale(xw, j - 1),
                (false, j) => column_scale(xw, j),
            };
            (0.1 * b.abs()).max(0.1 * scale / col_scale)
        })
        .collect();

    let errors: Vec<f64> = (0..m)
        .map(|t| {
            let mut reg = 0.0;
            for (j, b) in beta.iter().enumerate() {
                reg += b * match (layout.intercept, j) {
                    (true, 0) => 1.0,
                    (true, j) => xw[t][j - 1],
                    (false, j) => xw[t][j],
                };
            }
            w[t] - reg
        })
        .collect();

    let partials = if layout.p > 0 && layout.p < m {
        acf(&errors, layout.p).map(|r| pacf_durbin_levinson(&r)).unwrap_or_default()
    } else {
        Vec::new()
    };
    for i in 0..layout.p {
        let r = partials.get(i).copied().filter(|v| v.is_finite()).unwrap_or(0.0);
        x0.push(unconstrain_partial(r));
    }
    let arma = layout.seasonal_p + layout.q + layout.seasonal_q;
    x0.extend(std::iter::repeat_n(0.0, arma));
    steps.extend(std::iter::repeat_n(ARMA_STEP, layout.p + arma));
    (x0, steps)
}

fn column_scale(rows: &[Vec<f64>], j: usize) -> f64 {
    let col: Vec<f64> = rows.iter().map(|r| r[j]).collect();
    variance(&col, 1).map(f64::sqrt).filter(|s| *s > 0.0).unwrap_or(1.0)
}

/// One-step-ahead predictions on the model scale: `y_t - e_t`.
fn one_step_predictions(y: &[f64], eval: &CssEvaluation, reach: usize) -> Vec<Option<f64>> {
    let skip = reach + eval.conditioning;
    (0..y.len())
        .map(|t| (t >= skip).then(|| y[t] - eval.innovations[t - reach]))
        .collect()
}

/// Dynamic predictions on the model scale.
///
/// Observations seed the recursion up to the end of the conditioning window;
/// after that the regression errors and levels are the model's own
/// predictions and innovations are zero.
fn dynamic_predictions(
    y: &[f64],
    w: &[f64],
    eval: &CssEvaluation,
    coefs: &Coefficients,
    delta: &[f64],
    period: usize,
) -> Vec<Option<f64>> {
    let ar = coefs.ar_polynomial(period);
    let ma = coefs.ma_polynomial(period);
    let reach = delta.len() - 1;
    let start = eval.conditioning;
    let skip = reach + start;

    let mut errors = eval.errors[..start].to_vec();
    let mut innovations = eval.innovations[..start].to_vec();
    let mut levels = y[..skip.min(y.len())].to_vec();
    let mut out = vec![None; levels.len()];
    for t in skip..y.len() {
        let k = t - reach;
        let mut u = 0.0;
        for (i, a) in ar.iter().enumerate().skip(1) {
            u -= a * errors[k - i];
        }
        for (j, b) in ma.iter().enumerate().skip(1) {
            if let Some(prev) = k.checked_sub(j).map(|i| innovations[i]) {
                u += b * prev;
            }
        }
        errors.push(u);
        innovations.push(0.0);

        // Regression mean of the differenced point plus the predicted error.
        let mut level = w[k] - eval.errors[k] + u;
        for (i, d) in delta.iter().enumerate().skip(1) {
            level -= d * levels[t - i];
        }
        levels.push(level);
        out.push(Some(level));
    }
    out
}

/// Map model-scale predictions back and attach residuals.
fn in_sample_fit(
    raw: &[f64],
    predicted: &[Option<f64>],
    log_transform: bool,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let fitted: Vec<Option<f64>> = predicted
        .iter()
        .map(|p| p.map(|v| if log_transform { v.exp() } else { v }))
        .collect();
    let residuals = fitted
        .iter()
        .zip(raw)
        .map(|(f, v)| f.map(|f| v - f))
        .collect();
    (fitted, residuals)
}

/// Standard errors from the inverse of a central-difference Hessian of `f`
/// (a negative log-likelihood) at `theta`.
fn hessian_std_errors<F>(theta: &[f64], f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let k = theta.len();
    if k == 0 {
        return Vec::new();
    }
    let h: Vec<f64> = theta.iter().map(|v| 1e-4 * v.abs().max(1.0)).collect();
    let at = |shifts: &[(usize, f64)]| {
        let mut x = theta.to_vec();
        for &(i, s) in shifts {
            x[i] += s;
        }
        f(&x)
    };
    let f0 = f(theta);

    let pairs: Vec<(usize, usize)> = (0..k).flat_map(|i| (i..k).map(move |j| (i, j))).collect();
    let entries: Vec<((usize, usize), f64)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let v = if i == j {
                (at(&[(i, h[i])]) - 2.0 * f0 + at(&[(i, -h[i])])) / (h[i] * h[i])
            } else {
                (at(&[(i, h[i]), (j, h[j])]) - at(&[(i, h[i]), (j, -h[j])]) - at(&[(i, -h[i]), (j, h[j])])
                    + at(&[(i, -h[i]), (j, -h[j])]))
                    / (4.0 * h[i] * h[j])
            };
            ((i, j), v)
        })
        .collect();

    let mut hessian = DMatrix::zeros(k, k);
    for ((i, j), v) in entries {
        hessian[(i, j)] = v;
        hessian[(j, i)] = v;
    }
    if !hessian.iter().all(|v| v.is_finite()) {
        debug!("hessian has non-finite entries; standard errors unavailable");
        return vec![None; k];
    }
    match hessian.try_inverse() {
        Some(cov) => (0..k)
            .map(|i| Some(cov[(i, i)]).filter(|v| v.is_finite() && *v > 0.0).map(f64::sqrt))
            .collect(),
        None => {
            debug!("hessian is singular; standard errors unavailable");
            vec![None; k]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate_arima};

    #[test]
    fn recovers_ar1_coefficient() {
        let y = simulate_arima(&SimulationSpec::ar1(0.6, 500, 7).with_mean(10.0)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let fit = fit_model(&s, &[], &ModelSpec::arima(1, 0, 0), &FitOptions::default(), None).unwrap();
        let m = &fit.model;
        assert!((m.coefficients.ar[0] - 0.6).abs() < 0.1, "phi = {}", m.coefficients.ar[0]);
        assert!((m.coefficients.intercept - 10.0).abs() < 0.5);
        assert!((m.sigma2 - 1.0).abs() < 0.2);

        let se = m.parameters[1].std_error.unwrap();
        assert!(se > 0.02 && se < 0.06, "se = {se}");
        assert_eq!(m.parameters[1].name, "ar.L1");
        assert!(m.aic < m.bic);
    }

    #[test]
    fn in_sample_output_is_aligned_to_rows() {
        let y = simulate_arima(&SimulationSpec::ar1(0.5, 80, 3).with_differencing(1)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let fit = fit_model(&s, &[], &ModelSpec::arima(1, 1, 0), &FitOptions::default(), None).unwrap();
        assert_eq!(fit.in_sample.len(), 80);
        // One lost to differencing, one to AR conditioning.
        assert!(fit.in_sample[..2].iter().all(Option::is_none));
        assert!(fit.in_sample[2..].iter().all(Option::is_some));
        for t in 2..80 {
            let r = fit.residuals[t].unwrap();
            assert!((fit.in_sample[t].unwrap() + r - y[t]).abs() < 1e-9);
        }
        assert_eq!(fit.model.history.len(), 1);
        assert_eq!(fit.model.history[0], y[79]);
    }

    #[test]
    fn dynamic_predictions_feed_back_and_decay_to_the_mean() {
        let y = simulate_arima(&SimulationSpec::ar1(0.6, 300, 19).with_mean(10.0)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let spec = ModelSpec::arima(1, 0, 0);
        let one_step = fit_model(&s, &[], &spec, &FitOptions::default(), None).unwrap();
        let dynamic = fit_model_with(&s, &[], &spec, &FitOptions::default(), None, true).unwrap();
        assert_eq!(one_step.model.coefficients, dynamic.model.coefficients);

        assert_eq!(dynamic.in_sample[0], None);
        // The first prediction only sees observed lags.
        let (a, b) = (one_step.in_sample[1].unwrap(), dynamic.in_sample[1].unwrap());
        assert!((a - b).abs() < 1e-12);

        let largest_gap = (2..300)
            .map(|t| (one_step.in_sample[t].unwrap() - dynamic.in_sample[t].unwrap()).abs())
            .fold(0.0, f64::max);
        assert!(largest_gap > 0.5, "gap = {largest_gap}");
        let mean = dynamic.model.coefficients.intercept;
        assert!((dynamic.in_sample[299].unwrap() - mean).abs() < 1e-6);
        assert!((dynamic.residuals[299].unwrap() - (y[299] - mean)).abs() < 1e-6);
    }

    #[test]
    fn dynamic_predictions_undo_differencing_with_predicted_levels() {
        let y = simulate_arima(&SimulationSpec::ar1(0.5, 120, 6).with_differencing(1)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let spec = ModelSpec::arima(1, 1, 0);
        let fit = fit_model_with(&s, &[], &spec, &FitOptions::default(), None, true).unwrap();
        assert!(fit.in_sample[..2].iter().all(Option::is_none));
        assert!(fit.in_sample[2..].iter().all(Option::is_some));
        // Without intercept the predicted increments shrink geometrically, so
        // the path levels off.
        let tail: Vec<f64> = fit.in_sample[110..].iter().flatten().copied().collect();
        assert!(tail.windows(2).all(|p| (p[1] - p[0]).abs() < 1e-6));
    }

    #[test]
    fn estimates_exogenous_coefficient() {
        let noise = simulate_arima(&SimulationSpec::ar1(0.3, 300, 11)).unwrap();
        let x: Vec<f64> = (0..300).map(|t| ((t * 7) % 11) as f64).collect();
        let y: Vec<f64> = noise.iter().zip(&x).map(|(e, x)| 5.0 + 2.0 * x + e).collect();
        let s = TimeSeries::from_values("y", &y);
        let xs = TimeSeries::from_values("promo", &x);
        let spec = ModelSpec::arima(1, 0, 0).with_exogenous(vec!["promo".into()]);
        let fit = fit_model(&s, &[xs], &spec, &FitOptions::default(), None).unwrap();
        assert!((fit.model.coefficients.exog[0] - 2.0).abs() < 0.1);
        assert_eq!(fit.model.exog_tail.len(), 0);
    }

    #[test]
    fn missing_regressor_is_reported() {
        let s = TimeSeries::from_values("y", &[1.0; 20]);
        let spec = ModelSpec::arima(0, 0, 0).with_exogenous(vec!["price".into()]);
        let err = fit_model(&s, &[], &spec, &FitOptions::default(), None).unwrap_err();
        assert!(matches!(err, TsError::MissingExogenousData(_)));
    }

    #[test]
    fn log_transform_needs_positive_values() {
        let s = TimeSeries::from_values("y", &[1.0, 2.0, 0.0, 3.0, 4.0, 5.0]);
        let spec = ModelSpec::arima(0, 0, 0).with_log_transform(true);
        let err = fit_model(&s, &[], &spec, &FitOptions::default(), None).unwrap_err();
        assert!(matches!(err, TsError::InvalidData(_)));
    }

    #[test]
    fn too_few_points_for_the_parameters() {
        let s = TimeSeries::from_values("y", &[1.0, 2.0, 1.5, 3.0]);
        let err = fit_model(&s, &[], &ModelSpec::arima(2, 1, 1), &FitOptions::default(), None).unwrap_err();
        assert!(matches!(err, TsError::InsufficientData { .. }));
    }

    #[test]
    fn iteration_cap_is_a_convergence_error() {
        let y = simulate_arima(&SimulationSpec::ar1(0.6, 200, 2).with_ma(vec![0.3])).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let options = FitOptions {
            max_iterations: 2,
            tolerance: 1e-12,
        };
        let err = fit_model(&s, &[], &ModelSpec::arima(1, 0, 1), &options, None).unwrap_err();
        assert!(matches!(err, TsError::Convergence { .. }));
    }
}
