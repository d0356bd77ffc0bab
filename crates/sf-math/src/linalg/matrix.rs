//! Dense matrix alias and row-oriented helpers.

use nalgebra::{DMatrix, DVector};

use super::MathError;

/// Dense matrix of `f64`.
pub type Matrix = DMatrix<f64>;

/// Build from a list of rows. All rows must have equal length.
pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Matrix, MathError> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    let mut data = Vec::with_capacity(n_rows * n_cols);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != n_cols {
            return Err(MathError::Ragged {
                row: i,
                len: row.len(),
                expected: n_cols,
            });
        }
        data.extend(row);
    }
    Ok(DMatrix::from_row_slice(n_rows, n_cols, &data))
}

/// Copy row `i` out.
pub fn row_vec(m: &Matrix, i: usize) -> Vec<f64> {
    m.row(i).iter().copied().collect()
}

/// Copy out as nested vectors.
pub fn to_rows(m: &Matrix) -> Vec<Vec<f64>> {
    (0..m.nrows()).map(|i| row_vec(m, i)).collect()
}

/// Sum of each row.
pub fn row_sums(m: &Matrix) -> Vec<f64> {
    m.row_iter().map(|r| r.sum()).collect()
}

/// Select the rows and columns given by `row_idx` × `col_idx`.
pub fn submatrix(m: &Matrix, row_idx: &[usize], col_idx: &[usize]) -> Matrix {
    m.select_rows(row_idx).select_columns(col_idx)
}

/// Row vector times matrix: `v · m`.
pub fn vec_mul(m: &Matrix, v: &[f64]) -> Result<Vec<f64>, MathError> {
    if v.len() != m.nrows() {
        return Err(MathError::DimensionMismatch {
            expected: (1, m.nrows()),
            actual: (1, v.len()),
        });
    }
    let out = m.tr_mul(&DVector::from_column_slice(v));
    Ok(out.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_is_row_major() {
        let m = from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(1, 0)], 3.0);
        assert_eq!(to_rows(&m), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(
            err,
            MathError::Ragged {
                row: 1,
                len: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn vec_mul_propagates_distribution() {
        let p = from_rows(vec![vec![0.5, 0.5], vec![0.0, 1.0]]).unwrap();
        let next = vec_mul(&p, &[1.0, 0.0]).unwrap();
        assert_eq!(next, vec![0.5, 0.5]);
        let next = vec_mul(&p, &next).unwrap();
        assert!((next[0] - 0.25).abs() < 1e-15);
        assert!((next[1] - 0.75).abs() < 1e-15);
        assert!(vec_mul(&p, &[1.0]).is_err());
    }

    #[test]
    fn submatrix_selects_requested_entries() {
        let m = from_rows(vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        let sub = submatrix(&m, &[0, 2], &[1, 2]);
        assert_eq!(to_rows(&sub), vec![vec![2.0, 3.0], vec![8.0, 9.0]]);
    }

    #[test]
    fn row_sums_per_row() {
        let m = from_rows(vec![vec![0.0, 0.0], vec![0.25, 0.75]]).unwrap();
        assert_eq!(row_sums(&m), vec![0.0, 1.0]);
        assert_eq!(row_vec(&m, 1), vec![0.25, 0.75]);
    }
}
