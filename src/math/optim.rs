//! Derivative-free minimization (argmin's Nelder–Mead).
//!
//! The iteration budget is a hard cap: if the simplex has not collapsed when
//! the cap is reached, the result is a `ConvergenceError` and no parameters
//! are returned.

use argmin::core::{CostFunction, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use tracing::debug;

use crate::domain::FitOptions;
use crate::error::{Result, TsError};

/// Cost reported for parameter vectors where the objective is not finite.
const PENALTY: f64 = 1e50;

/// Result of a successful minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub params: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
}

struct Objective<F> {
    f: F,
}

impl<F> CostFunction for Objective<F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        let v = (self.f)(params);
        Ok(if v.is_finite() { v } else { PENALTY })
    }
}

/// Minimize `f` starting at `x0`; `steps[i]` is the initial simplex edge
/// along coordinate `i`.
pub fn minimize<F>(f: F, x0: &[f64], steps: &[f64], options: &FitOptions) -> Result<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    if x0.is_empty() {
        let cost = f(x0);
        return Ok(Minimum {
            params: Vec::new(),
            cost,
            iterations: 0,
        });
    }
    if steps.len() != x0.len() {
        return Err(TsError::invalid_parameter(
            "steps",
            format!("expected {} simplex steps, got {}", x0.len(), steps.len()),
        ));
    }
    if options.max_iterations == 0 {
        return Err(TsError::invalid_parameter("max iterations", "must be >= 1"));
    }

    let mut simplex = Vec::with_capacity(x0.len() + 1);
    simplex.push(x0.to_vec());
    for (i, &step) in steps.iter().enumerate() {
        let mut vertex = x0.to_vec();
        vertex[i] += if step != 0.0 { step } else { 0.1 };
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(options.tolerance)
        .map_err(|e| TsError::invalid_parameter("tolerance", e.to_string()))?;

    let res = Executor::new(Objective { f }, solver)
        .configure(|state| state.max_iters(options.max_iterations))
        .run()
        .map_err(|e| TsError::Convergence {
            iterations: 0,
            reason: e.to_string(),
        })?;

    let state = res.state();
    let iterations = state.get_iter();
    let termination = state.get_termination_status();
    let converged = matches!(
        termination,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    );
    if !converged {
        return Err(TsError::Convergence {
            iterations,
            reason: termination.to_string(),
        });
    }

    let params = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| TsError::Convergence {
            iterations,
            reason: "optimizer returned no parameters".to_string(),
        })?;
    let cost = state.get_best_cost();
    debug!(iterations, cost, "nelder-mead converged");

    Ok(Minimum { params, cost, iterations })
}
