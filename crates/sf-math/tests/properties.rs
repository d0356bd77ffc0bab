//! Property-based tests for sf-math linear algebra.
//!
//! Uses proptest to verify algebraic identities across random inputs.

use proptest::prelude::*;
use sf_math::{block_diag, distance_matrix, from_rows, inverse, row_sums, solve, Matrix};

/// Tolerance for residual checks.
const TOL: f64 = 1e-9;

/// Strategy for a strictly diagonally dominant (hence non-singular) matrix.
fn dominant_matrix(n: usize) -> impl Strategy<Value = Matrix> {
    prop::collection::vec(prop::collection::vec(-1.0..1.0f64, n), n).prop_map(move |mut rows| {
        for (i, row) in rows.iter_mut().enumerate() {
            let off: f64 = row
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, v)| v.abs())
                .sum();
            row[i] = off + 1.0;
        }
        from_rows(rows).unwrap()
    })
}

// ============================================================================
// solve / inverse
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The solution of A·x = b reproduces b.
    #[test]
    fn solve_residual_is_small(
        (a, b) in (1usize..8).prop_flat_map(|n| (dominant_matrix(n), prop::collection::vec(-10.0..10.0f64, n)))
    ) {
        let x = solve(&a, &b).unwrap();
        let ax = &a * nalgebra::DVector::from_column_slice(&x);
        for (lhs, rhs) in ax.iter().zip(&b) {
            prop_assert!((lhs - rhs).abs() < TOL, "residual {} vs {}", lhs, rhs);
        }
    }

    /// inverse(A)·A is the identity.
    #[test]
    fn inverse_is_left_inverse(a in (1usize..7).prop_flat_map(dominant_matrix)) {
        let inv = inverse(&a).unwrap();
        let n = a.nrows();
        for i in 0..n {
            for j in 0..n {
                let mut acc = 0.0;
                for k in 0..n {
                    acc += inv[(i, k)] * a[(k, j)];
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                prop_assert!((acc - expected).abs() < TOL);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A two-state chain leaving with a tiny probability still solves.
    #[test]
    fn tiny_exit_rate_is_not_singular(exit in prop_oneof![Just(1e-15), 1e-15..1e-9f64, 1e-9..0.5f64]) {
        let stay = 1.0 - exit;
        let a = from_rows(vec![vec![1.0 - stay, -exit], vec![0.0, 1.0]]).unwrap();
        let x = solve(&a, &[1.0, 0.0]).unwrap();
        prop_assert!(x[0].is_finite() && x[0] > 0.0);
    }
}

// ============================================================================
// distance_matrix / block_diag
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Pairwise distances are symmetric, non-negative and zero on the diagonal.
    #[test]
    fn distance_matrix_is_a_metric_table(
        points in prop::collection::vec(prop::collection::vec(0.0..1.0f64, 4), 0..6)
    ) {
        let d = distance_matrix(&points);
        let n = points.len();
        for i in 0..n {
            prop_assert_eq!(d[(i, i)], 0.0);
            for j in 0..n {
                prop_assert_eq!(d[(i, j)], d[(j, i)]);
                prop_assert!(d[(i, j)] >= 0.0);
            }
        }
    }

    /// Identical points have zero total distance.
    #[test]
    fn identical_points_sum_to_zero(
        point in prop::collection::vec(0.0..1.0f64, 5),
        copies in 1usize..6,
    ) {
        let points = vec![point; copies];
        let d = distance_matrix(&points);
        let total: f64 = row_sums(&d).iter().sum();
        prop_assert_eq!(total, 0.0);
    }

    /// block_diag keeps each block and leaves off-diagonal blocks zero.
    #[test]
    fn block_diag_preserves_blocks(
        blocks in prop::collection::vec(
            (1usize..4, 1usize..4).prop_flat_map(|(r, c)| {
                prop::collection::vec(prop::collection::vec(-5.0..5.0f64, c), r)
            }),
            1..4,
        )
    ) {
        let mats: Vec<Matrix> = blocks.into_iter().map(|b| from_rows(b).unwrap()).collect();
        let big = block_diag(&mats);
        let total: f64 = row_sums(&big).iter().sum();
        let expected: f64 = mats.iter().map(|m| row_sums(m).iter().sum::<f64>()).sum();
        prop_assert!((total - expected).abs() < 1e-9);

        let (mut r0, mut c0) = (0, 0);
        for m in &mats {
            for i in 0..m.nrows() {
                for j in 0..big.ncols() {
                    let inside = j >= c0 && j < c0 + m.ncols();
                    if inside {
                        prop_assert_eq!(big[(r0 + i, j)], m[(i, j - c0)]);
                    } else {
                        prop_assert_eq!(big[(r0 + i, j)], 0.0);
                    }
                }
            }
            r0 += m.nrows();
            c0 += m.ncols();
        }
    }
}
