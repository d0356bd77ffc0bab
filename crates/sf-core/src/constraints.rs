//! Box bounds and row-sum constraints on free parameters.
//!
//! Each stage that is the source of at least one free transition gets one
//! constraint `Σ x[i] ≤ 1` over its free outgoing entries (no lower bound).
//! Every parameter belongs to exactly one such group, so the groups are
//! disjoint and the feasible region `{lb ≤ x ≤ ub, Σ_group x ≤ 1}` can be
//! projected onto group by group.

use serde::Serialize;
use sf_config::ChainLayout;
use sf_math::{block_diag, Matrix};

/// Per-parameter lower and upper bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    /// `[lower, upper]` for each of `n` parameters.
    pub fn uniform(n: usize, lower: f64, upper: f64) -> Self {
        Self {
            lower: vec![lower; n],
            upper: vec![upper; n],
        }
    }

    /// Probability bounds `[0, 1]`.
    pub fn unit(n: usize) -> Self {
        Self::uniform(n, 0.0, 1.0)
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Concatenate bounds of consecutive parameter blocks.
    pub fn merge(parts: &[Bounds]) -> Self {
        Self {
            lower: parts.iter().flat_map(|b| b.lower.iter().copied()).collect(),
            upper: parts.iter().flat_map(|b| b.upper.iter().copied()).collect(),
        }
    }

    /// Clamp `x` into the box.
    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&lo, &hi))| v.max(lo).min(hi))
            .collect()
    }
}

/// One inequality `lower ≤ Σ x[indices] ≤ upper`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintGroup {
    /// Source stage the group was derived from, for diagnostics.
    pub stage: usize,
    pub indices: Vec<usize>,
    pub lower: f64,
    pub upper: f64,
}

/// Linear inequality constraints over a parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearConstraints {
    num_parameters: usize,
    groups: Vec<ConstraintGroup>,
}

impl LinearConstraints {
    /// Row-sum constraints for the free transitions of `layout`.
    ///
    /// Groups are ordered by ascending source stage.
    pub fn from_layout(layout: &ChainLayout) -> Self {
        let unknown = layout.unknown();
        let mut sources: Vec<usize> = unknown.iter().map(|&(from, _)| from).collect();
        sources.sort_unstable();
        sources.dedup();

        let groups = sources
            .into_iter()
            .map(|stage| ConstraintGroup {
                stage,
                indices: unknown
                    .iter()
                    .enumerate()
                    .filter(|&(_, &(from, _))| from == stage)
                    .map(|(i, _)| i)
                    .collect(),
                lower: f64::NEG_INFINITY,
                upper: 1.0,
            })
            .collect();

        Self {
            num_parameters: unknown.len(),
            groups,
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.num_parameters
    }

    pub fn groups(&self) -> &[ConstraintGroup] {
        &self.groups
    }

    /// Dense 0/1 coefficient matrix, one row per group.
    pub fn matrix(&self) -> Matrix {
        let mut m = Matrix::zeros(self.groups.len(), self.num_parameters);
        for (r, g) in self.groups.iter().enumerate() {
            for &i in &g.indices {
                m[(r, i)] = 1.0;
            }
        }
        m
    }

    pub fn lower(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.lower).collect()
    }

    pub fn upper(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.upper).collect()
    }

    /// Stack constraints of consecutive parameter blocks.
    ///
    /// The dense view of the result is the block-diagonal combination of the
    /// parts; no constraint couples two blocks.
    pub fn merge(parts: &[LinearConstraints]) -> Self {
        let mut offset = 0;
        let mut groups = Vec::new();
        for part in parts {
            groups.extend(part.groups.iter().map(|g| ConstraintGroup {
                indices: g.indices.iter().map(|i| i + offset).collect(),
                ..g.clone()
            }));
            offset += part.num_parameters;
        }
        Self {
            num_parameters: offset,
            groups,
        }
    }

    /// Block-diagonal dense matrix of several constraint sets.
    pub fn merged_matrix(parts: &[LinearConstraints]) -> Matrix {
        let blocks: Vec<Matrix> = parts.iter().map(LinearConstraints::matrix).collect();
        block_diag(&blocks)
    }

    /// Largest amount by which any group sum leaves its interval.
    pub fn max_violation(&self, x: &[f64]) -> f64 {
        self.groups
            .iter()
            .map(|g| {
                let s: f64 = g.indices.iter().map(|&i| x[i]).sum();
                (s - g.upper).max(g.lower - s).max(0.0)
            })
            .fold(0.0, f64::max)
    }
}

/// Feasible region of a fitting problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasibleRegion {
    pub bounds: Bounds,
    pub constraints: LinearConstraints,
}

impl FeasibleRegion {
    pub fn new(bounds: Bounds, constraints: LinearConstraints) -> Self {
        Self {
            bounds,
            constraints,
        }
    }

    pub fn dimension(&self) -> usize {
        self.bounds.len()
    }

    /// Euclidean projection of `x` onto the region.
    ///
    /// Coordinates outside every group are clamped to their box. For each
    /// group, the projection onto `{lb ≤ y ≤ ub, Σ y ≤ upper}` is
    /// `y = clamp(x - λ, lb, ub)` with the smallest `λ ≥ 0` that satisfies
    /// the sum, found by bisection.
    pub fn project(&self, x: &[f64]) -> Vec<f64> {
        let mut y = self.bounds.clamp(x);
        for g in self.constraints.groups() {
            let sum: f64 = g.indices.iter().map(|&i| y[i]).sum();
            if sum <= g.upper {
                continue;
            }
            let shifted = |lambda: f64| -> f64 {
                g.indices
                    .iter()
                    .map(|&i| (x[i] - lambda).max(self.bounds.lower[i]).min(self.bounds.upper[i]))
                    .sum()
            };
            let mut lo = 0.0;
            let mut hi = g
                .indices
                .iter()
                .map(|&i| x[i] - self.bounds.lower[i])
                .fold(0.0, f64::max);
            for _ in 0..100 {
                let mid = 0.5 * (lo + hi);
                if shifted(mid) > g.upper {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            for &i in &g.indices {
                y[i] = (x[i] - hi).max(self.bounds.lower[i]).min(self.bounds.upper[i]);
            }
        }
        y
    }

    /// Whether `x` satisfies bounds and constraints up to `tolerance`.
    pub fn contains(&self, x: &[f64], tolerance: f64) -> bool {
        x.len() == self.dimension()
            && x
                .iter()
                .zip(self.bounds.lower.iter().zip(&self.bounds.upper))
                .all(|(&v, (&lo, &hi))| v >= lo - tolerance && v <= hi + tolerance)
            && self.constraints.max_violation(x) <= tolerance
    }
}
