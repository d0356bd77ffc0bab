//! Discrete-time absorbing Markov chain analytics.
//!
//! A [`Chain`] wraps a row-stochastic transition matrix `P` and answers the
//! questions calibration needs:
//!
//! - which states are absorbing (`P[s][s] == 1.0` exactly) or transient
//! - the probability of ever hitting a set of states from a start state
//! - the expected time spent in a stage before absorption
//! - the fundamental matrix `(I - Q)^-1` of the transient sub-chain
//!
//! # Hitting probabilities
//!
//! The minimal non-negative solution of `h = P h` with boundary conditions
//! `h[t] = 1` for every target `t` and `h[a] = 0` for every other absorbing
//! state `a` is found by solving `(P - I) h = r`, where target rows are
//! replaced by identity rows (`r[t] = 1`) and absorbing diagonals are set to 1.
//!
//! # Durations
//!
//! `duration_stage(s)` solves `(I - P) x = e_s` with absorbing rows forced to
//! identity and reports `unit_of_time · x[s]`: the expected number of visits
//! to `s` after entering it, expressed in real time.
//!
//! # Conditioning
//!
//! Every system is assembled from `P - I` with the diagonal written as
//! minus the row's exit mass `Σ_{j≠i} P[i][j]`, not as `P[i][i] - 1`, so a
//! stage that leaves with probability 1e-13 keeps its exact exit rate. A
//! system is singular only when some state cannot reach the boundary of the
//! walk; such chains fail with [`ChainError::Singular`] before any solve.

mod convergence;
mod path;

pub use convergence::{point_mass, ConvergenceTrace, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
pub use path::SamplePath;

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use sf_math::{inverse, solve, submatrix, Matrix};

use crate::error::ChainError;

/// Markov chain over states `0..n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    matrix: Matrix,
    unit_of_time: f64,
}

impl Chain {
    /// Create a chain from a square transition matrix.
    ///
    /// `unit_of_time` is the real-world time represented by one step.
    pub fn new(matrix: Matrix, unit_of_time: f64) -> Result<Self, ChainError> {
        check_square(&matrix)?;
        Ok(Self {
            matrix,
            unit_of_time,
        })
    }

    pub fn num_states(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn unit_of_time(&self) -> f64 {
        self.unit_of_time
    }

    pub fn transition_matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Swap in a new transition matrix of the same order.
    pub fn set_transition_matrix(&mut self, matrix: Matrix) -> Result<(), ChainError> {
        check_square(&matrix)?;
        if matrix.nrows() != self.num_states() {
            return Err(ChainError::OrderMismatch {
                expected: self.num_states(),
                got: matrix.nrows(),
            });
        }
        self.matrix = matrix;
        Ok(())
    }

    // ── Classification ───────────────────────────────────────────────

    /// Whether `state` never leaves itself.
    ///
    /// Compared exactly against 1.0; fixed self-loops are written as the
    /// literal 1.0 by the matrix builder.
    #[allow(clippy::float_cmp)]
    pub fn is_absorbing(&self, state: usize) -> bool {
        self.matrix[(state, state)] == 1.0
    }

    pub fn is_transient(&self, state: usize) -> bool {
        self.matrix[(state, state)] < 1.0
    }

    pub fn absorbing_states(&self) -> BTreeSet<usize> {
        (0..self.num_states())
            .filter(|&s| self.is_absorbing(s))
            .collect()
    }

    /// Complement of [`Chain::absorbing_states`].
    pub fn transient_states(&self) -> BTreeSet<usize> {
        (0..self.num_states())
            .filter(|&s| !self.is_absorbing(s))
            .collect()
    }

    // ── Linear solves ────────────────────────────────────────────────

    /// Probability of ever entering any of `targets` when starting in `start`.
    pub fn hitting_probability(
        &self,
        start: usize,
        targets: &BTreeSet<usize>,
    ) -> Result<f64, ChainError> {
        let n = self.num_states();
        self.check_state(start)?;
        for &t in targets {
            self.check_state(t)?;
        }
        let mut boundary = self.absorbing_states();
        boundary.extend(targets);
        self.check_exits("hitting_probability", &boundary)?;

        let mut coefficients = self.generator();
        let mut rhs = vec![0.0; n];
        for &t in targets {
            for j in 0..n {
                coefficients[(t, j)] = if j == t { 1.0 } else { 0.0 };
            }
            rhs[t] = 1.0;
        }
        for a in self.absorbing_states() {
            coefficients[(a, a)] = 1.0;
        }

        let hit =
            solve(&coefficients, &rhs).map_err(|e| ChainError::solve("hitting_probability", e))?;
        Ok(hit[start])
    }

    /// Probability of leaving `state` in one step.
    pub fn exit_rate(&self, state: usize) -> f64 {
        self.matrix
            .row(state)
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != state)
            .map(|(_, p)| p)
            .sum()
    }

    /// `P - I`, with each diagonal taken as minus the row's exit rate.
    fn generator(&self) -> Matrix {
        let mut g = self.matrix.clone();
        for i in 0..self.num_states() {
            g[(i, i)] = -self.exit_rate(i);
        }
        g
    }

    /// Single-target convenience for [`Chain::hitting_probability`].
    pub fn hitting_probability_to(&self, start: usize, target: usize) -> Result<f64, ChainError> {
        self.hitting_probability(start, &BTreeSet::from([target]))
    }

    /// Expected time spent in `stage` once it is entered.
    ///
    /// Absorbing stages are never left, so their duration is infinite.
    pub fn duration_stage(&self, stage: usize) -> Result<f64, ChainError> {
        self.check_state(stage)?;
        let absorbing = self.absorbing_states();
        if absorbing.contains(&stage) {
            return Ok(f64::INFINITY);
        }
        self.check_exits("duration_stage", &absorbing)?;

        let n = self.num_states();
        let mut coefficients = -self.generator();
        for &a in &absorbing {
            coefficients[(a, a)] = 1.0;
        }
        let mut rhs = vec![0.0; n];
        rhs[stage] = 1.0;

        let visits =
            solve(&coefficients, &rhs).map_err(|e| ChainError::solve("duration_stage", e))?;
        Ok(self.unit_of_time * visits[stage])
    }

    /// Sum of [`Chain::duration_stage`] over `stages`.
    pub fn duration_stages(&self, stages: &BTreeSet<usize>) -> Result<f64, ChainError> {
        stages
            .iter()
            .try_fold(0.0, |acc, &s| Ok(acc + self.duration_stage(s)?))
    }

    /// Expected time spent in each transient state `to` starting from each
    /// transient state `from`: `unit_of_time · (I - Q)^-1`.
    pub fn mean_time(&self) -> Result<BTreeMap<(usize, usize), f64>, ChainError> {
        let transient: Vec<usize> = self.transient_states().into_iter().collect();
        if transient.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.check_exits("mean_time", &self.absorbing_states())?;
        let i_minus_q = submatrix(&-self.generator(), &transient, &transient);
        let fundamental = inverse(&i_minus_q)
            .map_err(|e| ChainError::solve("mean_time", e))?
            * self.unit_of_time;

        let mut out = BTreeMap::new();
        for (i, &from) in transient.iter().enumerate() {
            for (j, &to) in transient.iter().enumerate() {
                out.insert((from, to), fundamental[(i, j)]);
            }
        }
        Ok(out)
    }

    // ── Dynamics ─────────────────────────────────────────────────────

    /// Lazily walk the chain from `initial` until an absorbing state.
    pub fn simulate<R: Rng>(&self, initial: usize, rng: R) -> Result<SamplePath<R>, ChainError> {
        self.check_state(initial)?;
        Ok(SamplePath::new(self, initial, rng))
    }

    /// Iterate `start · P^k` until successive distributions differ by less
    /// than `tolerance` or `max_iterations` steps have been taken.
    pub fn convergence(
        &self,
        start: &[f64],
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<ConvergenceTrace, ChainError> {
        convergence::iterate(self, start, tolerance, max_iterations)
    }

    /// First state, outside `boundary`, from which no path of positive
    /// transitions leads into `boundary`.
    pub fn trapped_state(&self, boundary: &BTreeSet<usize>) -> Option<usize> {
        let n = self.num_states();
        let mut reaches: Vec<bool> = (0..n).map(|s| boundary.contains(&s)).collect();
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..n {
                if reaches[i] {
                    continue;
                }
                if (0..n).any(|j| j != i && reaches[j] && self.matrix[(i, j)] > 0.0) {
                    reaches[i] = true;
                    changed = true;
                }
            }
        }
        reaches.iter().position(|&r| !r)
    }

    fn check_exits(
        &self,
        operation: &'static str,
        boundary: &BTreeSet<usize>,
    ) -> Result<(), ChainError> {
        match self.trapped_state(boundary) {
            Some(state) => Err(ChainError::Singular { operation, state }),
            None => Ok(()),
        }
    }

    fn check_state(&self, state: usize) -> Result<(), ChainError> {
        if state >= self.num_states() {
            return Err(ChainError::StateOutOfRange {
                state,
                num_states: self.num_states(),
            });
        }
        Ok(())
    }
}

fn check_square(matrix: &Matrix) -> Result<(), ChainError> {
    if !matrix.is_square() {
        return Err(ChainError::NotSquare {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        });
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sf_math::from_rows;

    fn chain(rows: Vec<Vec<f64>>) -> Chain {
        Chain::new(from_rows(rows).unwrap(), 0.5).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// 0 → {0: 0.5, 1: 0.5}, 1 absorbing.
    fn two_state() -> Chain {
        chain(vec![vec![0.5, 0.5], vec![0.0, 1.0]])
    }

    /// 0 → 1 → 2, each transient stays with 0.5.
    fn three_state() -> Chain {
        chain(vec![
            vec![0.5, 0.5, 0.0],
            vec![0.0, 0.5, 0.5],
            vec![0.0, 0.0, 1.0],
        ])
    }

    /// Transient 0 splits into absorbing 1 (0.3) and absorbing 2 (0.2).
    fn competing() -> Chain {
        chain(vec![
            vec![0.5, 0.3, 0.2],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ])
    }

    #[test]
    fn non_square_rejected() {
        let m = Matrix::zeros(2, 3);
        assert!(matches!(
            Chain::new(m, 0.5),
            Err(ChainError::NotSquare { rows: 2, cols: 3 })
        ));
    }

    #[test]
    fn partition_of_states() {
        let c = competing();
        assert_eq!(c.absorbing_states(), BTreeSet::from([1, 2]));
        assert_eq!(c.transient_states(), BTreeSet::from([0]));
        assert!(c.is_transient(0));
        assert!(!c.is_transient(1));
    }

    #[test]
    fn near_one_self_loop_is_not_absorbing() {
        let c = chain(vec![vec![1.0 - 1e-12, 1e-12], vec![0.0, 1.0]]);
        assert!(!c.is_absorbing(0));
        assert!(c.is_absorbing(1));
    }

    #[test]
    fn hitting_two_state() {
        let c = two_state();
        assert!(approx(c.hitting_probability_to(0, 1).unwrap(), 1.0));
    }

    #[test]
    fn hitting_competing_absorbers() {
        let c = competing();
        assert!(approx(c.hitting_probability_to(0, 1).unwrap(), 0.6));
        assert!(approx(c.hitting_probability_to(0, 2).unwrap(), 0.4));
        assert!(approx(
            c.hitting_probability(0, &BTreeSet::from([1, 2])).unwrap(),
            1.0
        ));
        // From a different absorbing state the target is never reached.
        assert!(approx(c.hitting_probability_to(2, 1).unwrap(), 0.0));
        // Already in the target.
        assert!(approx(c.hitting_probability_to(1, 1).unwrap(), 1.0));
    }

    #[test]
    fn hitting_transient_target() {
        let c = three_state();
        assert!(approx(c.hitting_probability_to(0, 1).unwrap(), 1.0));
        assert!(approx(c.hitting_probability_to(1, 0).unwrap(), 0.0));
    }

    #[test]
    fn duration_scenarios() {
        assert!(approx(two_state().duration_stage(0).unwrap(), 1.0));
        assert!(approx(
            three_state()
                .duration_stages(&BTreeSet::from([0, 1]))
                .unwrap(),
            2.0
        ));
    }

    #[test]
    fn duration_of_absorbing_is_infinite() {
        assert!(two_state().duration_stage(1).unwrap().is_infinite());
    }

    #[test]
    fn closed_transient_class_is_singular() {
        // 0 and 1 swap forever, 2 absorbing and unreachable.
        let c = chain(vec![
            vec![0.0, 1.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ]);
        assert!(matches!(
            c.duration_stage(0),
            Err(ChainError::Singular { state: 0, .. })
        ));
        assert!(matches!(
            c.hitting_probability_to(0, 2),
            Err(ChainError::Singular { .. })
        ));
        assert!(matches!(c.mean_time(), Err(ChainError::Singular { .. })));
        // Targeting the cycle itself is well posed.
        assert!(approx(c.hitting_probability_to(0, 1).unwrap(), 1.0));
    }

    #[test]
    fn tiny_exit_rate_still_solves() {
        let c = chain(vec![vec![1.0 - 1e-13, 1e-13], vec![0.0, 1.0]]);
        assert_eq!(c.trapped_state(&c.absorbing_states()), None);
        assert_eq!(c.exit_rate(0), 1e-13);
        assert!(approx(c.hitting_probability_to(0, 1).unwrap(), 1.0));
        let d = c.duration_stage(0).unwrap();
        assert!((d - 0.5e13).abs() / d < 1e-9, "d = {d}");
        let t = c.mean_time().unwrap();
        assert!((t[&(0, 0)] - d).abs() / d < 1e-9);
    }

    #[test]
    fn zero_exit_row_is_trapped() {
        // State 1 has every exit at zero but is not written as absorbing.
        let c = chain(vec![
            vec![0.5, 0.25, 0.25],
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ]);
        assert_eq!(c.trapped_state(&c.absorbing_states()), Some(1));
        assert!(matches!(
            c.duration_stage(0),
            Err(ChainError::Singular { state: 1, .. })
        ));
    }

    #[test]
    fn mean_time_matches_fundamental_matrix() {
        let c = three_state();
        let t = c.mean_time().unwrap();
        assert_eq!(t.len(), 4);
        assert!(approx(t[&(0, 0)], 1.0));
        assert!(approx(t[&(0, 1)], 1.0));
        assert!(approx(t[&(1, 0)], 0.0));
        assert!(approx(t[&(1, 1)], 1.0));
        for s in c.transient_states() {
            assert!(t[&(s, s)] >= c.unit_of_time());
        }
    }

    #[test]
    fn out_of_range_state_rejected() {
        assert!(matches!(
            two_state().hitting_probability_to(0, 5),
            Err(ChainError::StateOutOfRange { state: 5, .. })
        ));
    }

    #[test]
    fn set_transition_matrix_checks_order() {
        let mut c = two_state();
        assert!(c.set_transition_matrix(Matrix::identity(3, 3)).is_err());
        c.set_transition_matrix(Matrix::identity(2, 2)).unwrap();
        assert_eq!(c.absorbing_states().len(), 2);
    }
}
