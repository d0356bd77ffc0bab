//! Random sample paths.

use std::collections::BTreeSet;

use rand::Rng;
use sf_math::to_rows;

use super::Chain;

/// Lazy walk through a chain, ending at the first absorbing state.
///
/// Yields the initial state first. Each further step draws `u ~ U[0, 1)` and
/// moves to the first state whose cumulative row probability exceeds `u`.
/// The walk is single-use; a chain without a reachable absorbing state
/// produces an unbounded path.
pub struct SamplePath<R> {
    cumulative: Vec<Vec<f64>>,
    absorbing: BTreeSet<usize>,
    next: Option<usize>,
    rng: R,
}

impl<R: Rng> SamplePath<R> {
    pub(super) fn new(chain: &Chain, initial: usize, rng: R) -> Self {
        Self {
            cumulative: cumulative_rows(&to_rows(chain.transition_matrix())),
            absorbing: chain.absorbing_states(),
            next: Some(initial),
            rng,
        }
    }

    fn step(&mut self, state: usize) -> usize {
        let u: f64 = self.rng.random();
        let row = &self.cumulative[state];
        row.iter()
            .position(|&c| c > u)
            // Rounding can leave the last cumulative entry just below u.
            .unwrap_or_else(|| last_reachable(row).unwrap_or(state))
    }
}

impl<R: Rng> Iterator for SamplePath<R> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let state = self.next?;
        self.next = if self.absorbing.contains(&state) {
            None
        } else {
            Some(self.step(state))
        };
        Some(state)
    }
}

fn cumulative_rows(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .scan(0.0, |acc, &p| {
                    *acc += p;
                    Some(*acc)
                })
                .collect()
        })
        .collect()
}

fn last_reachable(cumulative_row: &[f64]) -> Option<usize> {
    let mut prev = 0.0;
    let mut last = None;
    for (i, &c) in cumulative_row.iter().enumerate() {
        if c > prev {
            last = Some(i);
        }
        prev = c;
    }
    last
}
