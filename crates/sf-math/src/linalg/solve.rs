//! Dense linear solves through `nalgebra`'s LU with partial pivoting.
//!
//! A system counts as singular only when elimination meets an exactly zero
//! pivot. Tiny pivots are kept, so a state with a very small exit rate gives
//! a large but finite answer.

use nalgebra::DVector;

use super::matrix::Matrix;
use super::MathError;

fn check_square(a: &Matrix) -> Result<(), MathError> {
    if !a.is_square() {
        return Err(MathError::NotSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }
    Ok(())
}

/// Solve the dense system `a·x = b`.
pub fn solve(a: &Matrix, b: &[f64]) -> Result<Vec<f64>, MathError> {
    check_square(a)?;
    if b.len() != a.nrows() {
        return Err(MathError::DimensionMismatch {
            expected: (a.nrows(), 1),
            actual: (b.len(), 1),
        });
    }
    let x = a
        .clone()
        .lu()
        .solve(&DVector::from_column_slice(b))
        .ok_or(MathError::Singular)?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::NonFinite);
    }
    Ok(x.iter().copied().collect())
}

/// Invert a square matrix.
pub fn inverse(a: &Matrix) -> Result<Matrix, MathError> {
    check_square(a)?;
    let inv = a.clone().try_inverse().ok_or(MathError::Singular)?;
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(MathError::NonFinite);
    }
    Ok(inv)
}
