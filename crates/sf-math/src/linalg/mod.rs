//! Core linear algebra modules.

pub mod distance;
pub mod matrix;
pub mod solve;

use thiserror::Error;

/// Errors raised by dense matrix operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("dimension mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Rows passed to a constructor have different lengths.
    #[error("row {row} has length {len} (expected {expected})")]
    Ragged { row: usize, len: usize, expected: usize },

    /// LU elimination met an exactly zero pivot.
    #[error("matrix is singular")]
    Singular,

    /// The solve finished but produced NaN or infinite entries.
    #[error("solution has non-finite entries")]
    NonFinite,

    #[error("matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}
