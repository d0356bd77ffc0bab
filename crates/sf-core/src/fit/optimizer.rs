//! Bounded, linearly constrained minimization.
//!
//! Nelder–Mead from `argmin` runs on a feasibility-mapped objective: each
//! trial point `x` is projected onto the feasible region, the objective is
//! evaluated at the projection, and `ρ‖x - proj(x)‖²` is added so the simplex
//! is pulled back towards the region. The reported optimum is the projection
//! of the best vertex, which satisfies bounds and constraints exactly.

use std::cell::RefCell;

use argmin::core::{
    CostFunction, Error as ArgminError, Executor, TerminationReason, TerminationStatus,
};
use argmin::solver::neldermead::NelderMead;
use serde::Serialize;

use crate::constraints::FeasibleRegion;
use crate::error::FitError;

/// Relative simplex step for non-zero coordinates.
const NONZERO_STEP: f64 = 0.05;

/// Absolute simplex step for coordinates at zero.
const ZERO_STEP: f64 = 0.00025;

/// Minimizer knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizerSettings {
    pub max_iters: u64,
    pub sd_tolerance: f64,
    pub infeasibility_penalty: f64,
}

/// Result of one minimization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Minimum {
    /// Best feasible point found.
    pub x: Vec<f64>,
    /// Objective at `x` (without penalty).
    pub value: f64,
    pub iterations: u64,
    /// Whether the simplex met its tolerance before the iteration cap.
    pub converged: bool,
    pub termination: String,
}

struct Penalized<'a, F> {
    objective: F,
    region: &'a FeasibleRegion,
    penalty: f64,
    failure: &'a RefCell<Option<FitError>>,
}

impl<F> CostFunction for Penalized<'_, F>
where
    F: Fn(&[f64]) -> Result<f64, FitError>,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, ArgminError> {
        let projected = self.region.project(x);
        let distance_sq: f64 = x
            .iter()
            .zip(&projected)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();

        match (self.objective)(&projected) {
            Ok(value) if value.is_nan() => Ok(f64::INFINITY),
            Ok(value) => Ok(value + self.penalty * distance_sq),
            Err(e) => {
                let message = e.to_string();
                let mut slot = self.failure.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                Err(ArgminError::msg(message))
            }
        }
    }
}

/// Minimize `objective` over `region`, starting from `x0`.
///
/// Hitting the iteration cap is not an error; check [`Minimum::converged`].
/// Chain failures raised by `objective` are returned unchanged.
pub fn minimize<F>(
    objective: F,
    x0: &[f64],
    region: &FeasibleRegion,
    settings: &MinimizerSettings,
) -> Result<Minimum, FitError>
where
    F: Fn(&[f64]) -> Result<f64, FitError>,
{
    let start = region.project(x0);
    if start.is_empty() {
        let value = objective(&start)?;
        return Ok(Minimum {
            x: start,
            value,
            iterations: 0,
            converged: true,
            termination: "empty parameter vector".to_string(),
        });
    }

    let failure = RefCell::new(None);
    let problem = Penalized {
        objective: &objective,
        region,
        penalty: settings.infeasibility_penalty,
        failure: &failure,
    };

    let solver = NelderMead::new(initial_simplex(&start))
        .with_sd_tolerance(settings.sd_tolerance)
        .map_err(|e| FitError::Optimizer(format!("invalid sd_tolerance: {}", e)))?;

    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(settings.max_iters))
        .run();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            let captured = failure.borrow_mut().take();
            return Err(captured.unwrap_or_else(|| FitError::Optimizer(e.to_string())));
        }
    };

    let state = result.state();
    let best = state.best_param.clone().unwrap_or_else(|| start.clone());
    let x = region.project(&best);
    let value = objective(&x)?;
    let converged = matches!(
        state.termination_status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
    );

    tracing::debug!(
        iterations = state.iter,
        value,
        converged,
        "minimization finished"
    );

    Ok(Minimum {
        x,
        value,
        iterations: state.iter,
        converged,
        termination: format!("{:?}", state.termination_status),
    })
}

/// `n + 1` vertices: `x0` plus one perturbed copy per coordinate.
fn initial_simplex(x0: &[f64]) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(x0.len() + 1);
    vertices.push(x0.to_vec());
    for i in 0..x0.len() {
        let mut v = x0.to_vec();
        v[i] = if v[i].abs() > 1e-8 {
            v[i] * (1.0 + NONZERO_STEP)
        } else {
            ZERO_STEP
        };
        vertices.push(v);
    }
    vertices
}
