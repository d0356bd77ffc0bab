//! Norms, pairwise distances and block assembly.

use super::matrix::Matrix;

/// Euclidean norm.
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Euclidean distance between two equal-length vectors.
///
/// Extra trailing entries of the longer vector are ignored.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Full symmetric matrix of pairwise Euclidean distances between `points`.
///
/// Entry `(i, j)` is the distance between point `i` and point `j`; the
/// diagonal is zero.
pub fn distance_matrix(points: &[Vec<f64>]) -> Matrix {
    let n = points.len();
    Matrix::from_fn(n, n, |i, j| euclidean_distance(&points[i], &points[j]))
}

/// Place `blocks` along the diagonal of a larger zero matrix.
pub fn block_diag(blocks: &[Matrix]) -> Matrix {
    let rows = blocks.iter().map(Matrix::nrows).sum();
    let cols = blocks.iter().map(Matrix::ncols).sum();
    let mut out = Matrix::zeros(rows, cols);
    let (mut r0, mut c0) = (0, 0);
    for block in blocks {
        out.view_mut((r0, c0), block.shape()).copy_from(block);
        r0 += block.nrows();
        c0 += block.ncols();
    }
    out
}
