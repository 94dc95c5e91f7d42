//! Forecasting engine: (S)ARIMA(X) estimation and forecasting.
//!
//! [`ForecastEngine`] wraps [`fit_model`] and [`forecast_model`] in a small
//! state machine:
//!
//! ```text
//! Unfit --fit ok--> Fitted --forecast--> Fitted
//!   |
//!   +--fit error--> Failed   (terminal; build a new engine to retry)
//! ```

pub mod css;
pub mod fit;
pub mod params;
pub mod predict;

pub use fit::{FitResult, FittedModel, ParameterEstimate, fit_model, fit_model_with};
pub use params::{Coefficients, ParamLayout};
pub use predict::forecast_model;

use tracing::warn;

use crate::domain::{FitOptions, ForecastResult, ModelSpec, Step, TimeSeries};
use crate::error::{Result, TsError};

#[derive(Debug, Clone)]
enum EngineState {
    Unfit,
    Fitted(Box<FitResult>),
    Failed,
}

/// One model, fitted at most once.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    spec: ModelSpec,
    options: FitOptions,
    step: Option<Step>,
    dynamic: bool,
    state: EngineState,
}

impl ForecastEngine {
    pub fn new(spec: ModelSpec, options: FitOptions) -> Self {
        Self {
            spec,
            options,
            step: None,
            dynamic: false,
            state: EngineState::Unfit,
        }
    }

    /// Index step used to place forecasts (inferred when not set).
    pub fn with_step(mut self, step: Option<Step>) -> Self {
        self.step = step;
        self
    }

    /// Predict in-sample rows from earlier predictions instead of observations.
    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Engine in the fitted state around a previously saved model.
    pub fn from_saved(model: FittedModel) -> Self {
        let spec = model.spec.clone();
        let result = FitResult {
            index: model.index_tail.clone(),
            model,
            in_sample: Vec::new(),
            residuals: Vec::new(),
        };
        Self {
            spec,
            options: FitOptions::default(),
            step: None,
            dynamic: false,
            state: EngineState::Fitted(Box::new(result)),
        }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, EngineState::Fitted(_))
    }

    pub fn fit_result(&self) -> Option<&FitResult> {
        match &self.state {
            EngineState::Fitted(result) => Some(result),
            _ => None,
        }
    }

    /// Estimate the model. Only valid once, from the unfit state.
    pub fn fit(&mut self, series: &TimeSeries, exog: &[TimeSeries]) -> Result<&FitResult> {
        match self.state {
            EngineState::Unfit => {}
            EngineState::Fitted(_) => {
                return Err(TsError::invalid_parameter("engine", "model is already fitted"));
            }
            EngineState::Failed => {
                return Err(TsError::invalid_parameter(
                    "engine",
                    "a previous fit failed; create a new engine to retry",
                ));
            }
        }
        match fit_model_with(series, exog, &self.spec, &self.options, self.step, self.dynamic) {
            Ok(result) => {
                self.state = EngineState::Fitted(Box::new(result));
                self.fit_result()
                    .ok_or_else(|| TsError::invalid_parameter("engine", "fit result unavailable"))
            }
            Err(err) => {
                warn!(model = %self.spec.label(), error = %err, "fit failed");
                self.state = EngineState::Failed;
                Err(err)
            }
        }
    }

    /// Forecast from the fitted model; repeatable.
    pub fn forecast(&self, horizon: usize, future_exog: &[TimeSeries], confidence_level: f64) -> Result<ForecastResult> {
        match &self.state {
            EngineState::Fitted(result) => forecast_model(&result.model, horizon, future_exog, confidence_level),
            _ => Err(TsError::invalid_parameter("engine", "forecast requires a fitted model")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate_arima};

    #[test]
    fn forecast_before_fit_is_rejected() {
        let engine = ForecastEngine::new(ModelSpec::arima(1, 0, 0), FitOptions::default());
        assert!(!engine.is_fitted());
        assert!(engine.forecast(3, &[], 0.95).is_err());
    }

    #[test]
    fn fitted_engine_forecasts_repeatedly_but_refits_never() {
        let y = simulate_arima(&SimulationSpec::ar1(0.5, 100, 4)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let mut engine = ForecastEngine::new(ModelSpec::arima(1, 0, 0), FitOptions::default());
        engine.fit(&s, &[]).unwrap();
        let a = engine.forecast(5, &[], 0.95).unwrap();
        let b = engine.forecast(5, &[], 0.95).unwrap();
        assert_eq!(a, b);
        assert!(engine.fit(&s, &[]).is_err());
        assert!(engine.is_fitted());
    }

    #[test]
    fn failed_fit_is_terminal() {
        let y = simulate_arima(&SimulationSpec::ar1(0.5, 100, 4)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let options = FitOptions {
            max_iterations: 1,
            tolerance: 1e-12,
        };
        let mut engine = ForecastEngine::new(ModelSpec::arima(1, 0, 1), options);
        let err = engine.fit(&s, &[]).unwrap_err();
        assert!(matches!(err, TsError::Convergence { .. }));
        assert!(engine.forecast(1, &[], 0.95).is_err());
        assert!(matches!(engine.fit(&s, &[]), Err(TsError::InvalidParameter { .. })));
    }

    #[test]
    fn saved_model_forecasts_like_the_original() {
        let y = simulate_arima(&SimulationSpec::ar1(0.7, 150, 8).with_differencing(1)).unwrap();
        let s = TimeSeries::from_values("y", &y);
        let mut engine = ForecastEngine::new(ModelSpec::arima(1, 1, 0), FitOptions::default());
        let model = engine.fit(&s, &[]).unwrap().model.clone();
        let json = serde_json::to_string(&model).unwrap();
        let restored: FittedModel = serde_json::from_str(&json).unwrap();
        let reloaded = ForecastEngine::from_saved(restored);
        let a = engine.forecast(6, &[], 0.8).unwrap();
        let b = reloaded.forecast(6, &[], 0.8).unwrap();
        for (p, q) in a.points.iter().zip(&b.points) {
            assert_eq!(p.index, q.index);
            assert!((p.forecast - q.forecast).abs() < 1e-9);
            assert!((p.upper_bound - q.upper_bound).abs() < 1e-9);
        }
    }
}
