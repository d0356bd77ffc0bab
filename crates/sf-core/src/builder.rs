//! Parameter vector → transition matrix.

use sf_config::ChainLayout;
use sf_math::{row_vec, Matrix};

use crate::error::BuildError;

/// Builds full transition matrices from free-parameter vectors.
///
/// Filling order:
/// 1. all-zero `n × n` matrix
/// 2. fixed entries
/// 3. free entries in declared order
/// 4. each diagonal set to `1 - Σ off-diagonal`
/// 5. queue rule: the queue row copies the source row, takes the source's
///    self-loop as its own, and the queue → source entry is zeroed
///
/// Entries are not checked for non-negativity; bounds and constraints on the
/// optimizer side keep fitted parameters in the valid region.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBuilder {
    layout: ChainLayout,
}

impl MatrixBuilder {
    pub fn new(layout: ChainLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ChainLayout {
        &self.layout
    }

    pub fn num_stages(&self) -> usize {
        self.layout.num_stages()
    }

    pub fn num_parameters(&self) -> usize {
        self.layout.num_parameters()
    }

    /// Build the transition matrix for `x`.
    ///
    /// Entries of `x` beyond the declared free transitions are ignored.
    pub fn build(&self, x: &[f64]) -> Result<Matrix, BuildError> {
        let unknown = self.layout.unknown();
        if x.len() < unknown.len() {
            return Err(BuildError::InsufficientParameters {
                expected: unknown.len(),
                got: x.len(),
            });
        }

        let n = self.layout.num_stages();
        let mut matrix = Matrix::zeros(n, n);
        for &((from, to), value) in self.layout.fixed() {
            matrix[(from, to)] = value;
        }
        for (&(from, to), &value) in unknown.iter().zip(x) {
            matrix[(from, to)] = value;
        }

        for i in 0..n {
            let off_diagonal: f64 = matrix
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, v)| v)
                .sum();
            matrix[(i, i)] = 1.0 - off_diagonal;
        }

        if let Some((queue, source)) = self.layout.queue_rule() {
            apply_queue_rule(&mut matrix, queue, source);
        }
        Ok(matrix)
    }

    /// Read the free entries back out of a matrix, in parameter order.
    pub fn free_entries(&self, matrix: &Matrix) -> Vec<f64> {
        self.layout
            .unknown()
            .iter()
            .map(|&(from, to)| matrix[(from, to)])
            .collect()
    }
}

fn apply_queue_rule(matrix: &mut Matrix, queue: usize, source: usize) {
    let mut row = row_vec(matrix, source);
    row[queue] = matrix[(source, source)];
    row[source] = 0.0;
    for (j, v) in row.into_iter().enumerate() {
        matrix[(queue, j)] = v;
    }
}
