//! Evolution of a state distribution towards its limit.

use serde::Serialize;
use sf_math::{euclidean_distance, vec_mul};

use super::Chain;
use crate::error::ChainError;

/// Euclidean distance between successive distributions that counts as settled.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Step cap for [`Chain::convergence`].
pub const DEFAULT_MAX_ITERATIONS: usize = 5000;

/// Distribution trajectory `start, start·P, start·P², …`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceTrace {
    /// Every distribution visited, starting with the input.
    pub distributions: Vec<Vec<f64>>,
    /// Whether the tolerance was met before the step cap.
    pub converged: bool,
}

impl ConvergenceTrace {
    /// Number of multiplication steps performed.
    pub fn steps(&self) -> usize {
        self.distributions.len().saturating_sub(1)
    }

    /// Last distribution reached.
    pub fn last(&self) -> &[f64] {
        self.distributions.last().map_or(&[], Vec::as_slice)
    }
}

/// Distribution with all mass on `state`.
pub fn point_mass(num_states: usize, state: usize) -> Vec<f64> {
    let mut v = vec![0.0; num_states];
    if let Some(slot) = v.get_mut(state) {
        *slot = 1.0;
    }
    v
}

pub(super) fn iterate(
    chain: &Chain,
    start: &[f64],
    tolerance: f64,
    max_iterations: usize,
) -> Result<ConvergenceTrace, ChainError> {
    let n = chain.num_states();
    if start.len() != n {
        return Err(ChainError::DistributionLength {
            expected: n,
            got: start.len(),
        });
    }

    let mut distributions = vec![start.to_vec()];
    let mut previous = start.to_vec();
    let mut converged = false;
    for _ in 0..max_iterations {
        let current = vec_mul(chain.transition_matrix(), &previous)
            .map_err(|_| ChainError::DistributionLength {
                expected: n,
                got: previous.len(),
            })?;
        let delta = euclidean_distance(&previous, &current);
        distributions.push(current.clone());
        if delta < tolerance {
            converged = true;
            break;
        }
        previous = current;
    }

    if !converged {
        tracing::warn!(
            max_iterations,
            tolerance,
            "distribution did not converge within iteration limit"
        );
    }

    Ok(ConvergenceTrace {
        distributions,
        converged,
    })
}
