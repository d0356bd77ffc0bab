//! Joint calibration of all age groups.
//!
//! The joint objective blends the per-group losses with a penalty on how far
//! apart the groups' parameter vectors are:
//!
//! ```text
//! objective(x) = alpha * Σ_g loss_g(x_g) + (1 - alpha) * Σ_g Σ_h ‖x_g - x_h‖
//! ```
//!
//! The deviation sums the full distance matrix, so every unordered pair is
//! counted twice. Alpha values are chosen against that scale.

use std::fmt;

use rand::rngs::StdRng;
use serde::Serialize;
use sf_math::{distance_matrix, Matrix};

use super::optimizer::minimize;
use super::single::{draw_uniform, AgeReport, SingleFitter};
use super::{FitOptions, FitOutcome};
use crate::builder::MatrixBuilder;
use crate::constraints::{Bounds, FeasibleRegion, LinearConstraints};
use crate::error::FitError;
use crate::target::Target;

/// All age groups fitted together under one blending weight.
#[derive(Debug, Clone)]
pub struct JointFitter {
    fitters: Vec<SingleFitter>,
    alpha: f64,
    per_group: usize,
    x: Vec<f64>,
    region: FeasibleRegion,
    options: FitOptions,
    rng: StdRng,
}

impl JointFitter {
    /// Combine existing per-group fitters.
    ///
    /// Every fitter must have the same number of free parameters.
    pub fn new(fitters: Vec<SingleFitter>, alpha: f64, options: FitOptions) -> Result<Self, FitError> {
        let first = fitters.first().ok_or(FitError::NoAgeGroups)?;
        let per_group = first.num_parameters();
        if fitters.iter().any(|f| f.num_parameters() != per_group) {
            return Err(FitError::ParameterShape {
                groups: fitters.len(),
                per_group,
                got: fitters.iter().map(SingleFitter::num_parameters).sum(),
            });
        }

        Ok(Self {
            alpha,
            per_group,
            x: merged_parameters(&fitters),
            region: FeasibleRegion::new(merged_bounds(&fitters), merged_constraints(&fitters)),
            rng: options.rng(),
            options,
            fitters,
        })
    }

    /// One fitter per age group, each started at uniform draws from
    /// `[0, init_upper)`.
    pub fn from_groups(
        builder: &MatrixBuilder,
        groups: Vec<(String, Vec<Target>)>,
        alpha: f64,
        options: FitOptions,
    ) -> Result<Self, FitError> {
        if groups.is_empty() {
            return Err(FitError::NoAgeGroups);
        }
        let mut rng = options.rng();
        let fitters = groups
            .into_iter()
            .map(|(age, targets)| {
                let x0 = draw_uniform(&mut rng, builder.num_parameters(), options.init_upper);
                SingleFitter::new(age, builder.clone(), targets, x0)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut joint = Self::new(fitters, alpha, options)?;
        joint.rng = rng;
        Ok(joint)
    }

    pub fn fitters(&self) -> &[SingleFitter] {
        &self.fitters
    }

    pub fn age_groups(&self) -> Vec<&str> {
        self.fitters.iter().map(SingleFitter::age).collect()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Combined parameter vector, group blocks in age-group order.
    pub fn parameters(&self) -> &[f64] {
        &self.x
    }

    pub fn region(&self) -> &FeasibleRegion {
        &self.region
    }

    /// Split `x` into per-group blocks and hand each to its fitter.
    pub fn set_parameters(&mut self, x: &[f64]) -> Result<(), FitError> {
        self.check_shape(x)?;
        for (fitter, block) in self.fitters.iter_mut().zip(x.chunks(self.per_group)) {
            fitter.set_parameters(block)?;
        }
        self.x = x.to_vec();
        Ok(())
    }

    /// Concatenation of the fitters' current parameters.
    pub fn merge_parameters(&self) -> Vec<f64> {
        merged_parameters(&self.fitters)
    }

    pub fn merge_bounds(&self) -> Bounds {
        merged_bounds(&self.fitters)
    }

    /// Per-group constraints with indices shifted into the combined vector.
    pub fn merge_constraints(&self) -> LinearConstraints {
        merged_constraints(&self.fitters)
    }

    /// Dense block-diagonal constraint matrix of the combined problem.
    pub fn constraint_matrix(&self) -> Matrix {
        LinearConstraints::merged_matrix(&group_constraints(&self.fitters))
    }

    /// Sum of every group's loss at the current parameters.
    pub fn total_loss(&self) -> Result<f64, FitError> {
        self.fitters
            .iter()
            .try_fold(0.0, |acc, f| -> Result<f64, FitError> {
                Ok(acc + f.evaluate_current()?)
            })
    }

    /// Full-matrix sum of pairwise distances between group parameters.
    pub fn deviation(&self) -> f64 {
        let blocks: Vec<Vec<f64>> = self.fitters.iter().map(|f| f.parameters().to_vec()).collect();
        full_sum(&distance_matrix(&blocks))
    }

    /// Adopt `x` and return the joint objective.
    pub fn evaluate(&mut self, x: &[f64]) -> Result<f64, FitError> {
        self.set_parameters(x)?;
        self.evaluate_current()
    }

    pub fn evaluate_current(&self) -> Result<f64, FitError> {
        Ok(self.blend(self.total_loss()?, self.deviation()))
    }

    /// Joint objective at `x` without changing any fitter.
    pub fn objective_at(&self, x: &[f64]) -> Result<f64, FitError> {
        self.check_shape(x)?;
        let blocks: Vec<Vec<f64>> = x.chunks(self.per_group).map(<[f64]>::to_vec).collect();
        let mut total = 0.0;
        for (fitter, block) in self.fitters.iter().zip(&blocks) {
            total += fitter.loss_at(block)?;
        }
        Ok(self.blend(total, full_sum(&distance_matrix(&blocks))))
    }

    /// Redraw every group's parameters from `[0, init_upper)`.
    pub fn randomize(&mut self) -> Result<(), FitError> {
        let upper = self.options.init_upper;
        for fitter in &mut self.fitters {
            fitter.randomize(&mut self.rng, upper)?;
        }
        self.x = self.merge_parameters();
        Ok(())
    }

    /// Fit each group on its own loss.
    ///
    /// Each group gets up to `local_retries` random restarts and stops early
    /// once its loss drops below `local_tolerance`. The best attempt is kept.
    pub fn optimize_locally(&mut self) -> Result<Vec<LocalOutcome>, FitError> {
        let retries = self.options.local_retries.max(1);
        let tolerance = self.options.local_tolerance;
        let upper = self.options.init_upper;
        let settings = self.options.local;

        let mut outcomes = Vec::with_capacity(self.fitters.len());
        for fitter in &mut self.fitters {
            tracing::info!(age = %fitter.age(), "local fit started");
            let mut best: Option<(Vec<f64>, FitOutcome)> = None;
            let mut attempts = 0;
            for attempt in 1..=retries {
                attempts = attempt;
                fitter.randomize(&mut self.rng, upper)?;
                let outcome = fitter.optimize(&settings)?;
                tracing::debug!(
                    age = %fitter.age(),
                    attempt,
                    loss = outcome.loss,
                    converged = outcome.converged,
                    "local attempt finished"
                );
                if best.as_ref().is_none_or(|(_, b)| outcome.loss < b.loss) {
                    best = Some((fitter.parameters().to_vec(), outcome));
                }
                if outcome.loss < tolerance {
                    break;
                }
            }
            if let Some((x, outcome)) = best {
                fitter.set_parameters(&x)?;
                if outcome.loss >= tolerance {
                    tracing::warn!(
                        age = %fitter.age(),
                        attempts,
                        loss = outcome.loss,
                        tolerance,
                        "local fit did not reach tolerance"
                    );
                } else {
                    tracing::info!(age = %fitter.age(), attempts, loss = outcome.loss, "local fit finished");
                }
                outcomes.push(LocalOutcome {
                    age: fitter.age().to_string(),
                    attempts,
                    outcome,
                });
            }
        }
        self.x = self.merge_parameters();
        Ok(outcomes)
    }

    /// Minimize the joint objective from the current combined vector.
    pub fn optimize_globally(&mut self) -> Result<FitOutcome, FitError> {
        tracing::info!(
            alpha = self.alpha,
            parameters = self.x.len(),
            "joint fit started"
        );
        let minimum = minimize(
            |x| self.objective_at(x),
            &self.x,
            &self.region,
            &self.options.joint,
        )?;
        self.set_parameters(&minimum.x)?;
        if !minimum.converged {
            tracing::warn!(
                alpha = self.alpha,
                iterations = minimum.iterations,
                objective = minimum.value,
                "joint fit stopped at iteration cap"
            );
        }
        Ok(FitOutcome::from(&minimum))
    }

    /// Local phase, then joint phase.
    pub fn optimize(&mut self) -> Result<JointOutcome, FitError> {
        let local = self.optimize_locally()?;
        let global = self.optimize_globally()?;
        Ok(JointOutcome { local, global })
    }

    /// Per-group target reports plus the joint figures.
    pub fn report(&self) -> Result<JointReport, FitError> {
        let ages = self
            .fitters
            .iter()
            .map(SingleFitter::report)
            .collect::<Result<Vec<_>, _>>()?;
        let total_loss = self.total_loss()?;
        let deviation = self.deviation();
        Ok(JointReport {
            alpha: self.alpha,
            ages,
            total_loss,
            deviation,
            objective: self.blend(total_loss, deviation),
        })
    }

    fn blend(&self, total_loss: f64, deviation: f64) -> f64 {
        self.alpha * total_loss + (1.0 - self.alpha) * deviation
    }

    fn check_shape(&self, x: &[f64]) -> Result<(), FitError> {
        if x.len() != self.fitters.len() * self.per_group {
            return Err(FitError::ParameterShape {
                groups: self.fitters.len(),
                per_group: self.per_group,
                got: x.len(),
            });
        }
        Ok(())
    }
}

fn merged_parameters(fitters: &[SingleFitter]) -> Vec<f64> {
    fitters
        .iter()
        .flat_map(|f| f.parameters().iter().copied())
        .collect()
}

fn merged_bounds(fitters: &[SingleFitter]) -> Bounds {
    let parts: Vec<Bounds> = fitters.iter().map(|f| f.bounds().clone()).collect();
    Bounds::merge(&parts)
}

fn group_constraints(fitters: &[SingleFitter]) -> Vec<LinearConstraints> {
    fitters.iter().map(|f| f.constraints().clone()).collect()
}

fn merged_constraints(fitters: &[SingleFitter]) -> LinearConstraints {
    LinearConstraints::merge(&group_constraints(fitters))
}

fn full_sum(m: &Matrix) -> f64 {
    m.sum()
}

/// Result of one group's local phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalOutcome {
    pub age: String,
    /// Random restarts used.
    pub attempts: usize,
    /// Best attempt, which the group keeps.
    pub outcome: FitOutcome,
}

/// Result of [`JointFitter::optimize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointOutcome {
    pub local: Vec<LocalOutcome>,
    pub global: FitOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointReport {
    pub alpha: f64,
    pub ages: Vec<AgeReport>,
    pub total_loss: f64,
    pub deviation: f64,
    pub objective: f64,
}

impl fmt::Display for JointReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for age in &self.ages {
            write!(f, "{}", age)?;
        }
        writeln!(f, "Alpha: {}", self.alpha)?;
        writeln!(f, "Total loss: {}", self.total_loss)?;
        writeln!(f, "Deviation: {}", self.deviation)?;
        writeln!(f, "Weighted objective: {}", self.objective)?;
        writeln!(f, "{}", "*".repeat(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::MinimizerSettings;
    use crate::target::TargetInfo;
    use sf_config::{ChainConfig, ChainLayout};
    use std::collections::BTreeSet;

    fn split_builder() -> MatrixBuilder {
        let layout = ChainLayout::from_indices(
            vec!["S0".into(), "S1".into(), "S2".into()],
            vec![((1, 1), 1.0), ((2, 2), 1.0)],
            vec![(0, 1), (0, 2)],
            None,
            0.5,
        )
        .unwrap();
        MatrixBuilder::new(layout)
    }

    fn group(age: &str, p: f64, duration: f64) -> (String, Vec<Target>) {
        let info = TargetInfo {
            age: age.to_string(),
            ..Default::default()
        };
        (
            age.to_string(),
            vec![
                Target::probability(0, BTreeSet::from([1]), p, 1.0, info.clone()),
                Target::duration(BTreeSet::from([0]), duration, 1.0, info),
            ],
        )
    }

    fn options() -> FitOptions {
        FitOptions {
            local: MinimizerSettings {
                max_iters: 2000,
                sd_tolerance: 1e-14,
                infeasibility_penalty: 1e3,
            },
            seed: Some(11),
            ..Default::default()
        }
    }

    fn two_groups(alpha: f64) -> JointFitter {
        JointFitter::from_groups(
            &split_builder(),
            vec![group("Age_young", 0.25, 2.0), group("Age_old", 0.5, 1.0)],
            alpha,
            options(),
        )
        .unwrap()
    }

    #[test]
    fn identical_groups_have_zero_deviation() {
        let mut joint = two_groups(0.5);
        joint.set_parameters(&[0.1, 0.2, 0.1, 0.2]).unwrap();
        assert_eq!(joint.deviation(), 0.0);
    }

    #[test]
    fn deviation_counts_each_pair_twice() {
        let mut joint = two_groups(0.5);
        joint.set_parameters(&[0.0, 0.0, 0.3, 0.4]).unwrap();
        assert!((joint.deviation() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn objective_blends_loss_and_deviation() {
        let mut joint = two_groups(0.9);
        let x = [0.05, 0.1, 0.2, 0.1];
        let objective = joint.evaluate(&x).unwrap();
        let expected = 0.9 * joint.total_loss().unwrap() + 0.1 * joint.deviation();
        assert!((objective - expected).abs() < 1e-12);
        assert!((joint.objective_at(&x).unwrap() - objective).abs() < 1e-12);
    }

    #[test]
    fn set_parameters_checks_length() {
        let mut joint = two_groups(0.5);
        let err = joint.set_parameters(&[0.1, 0.2, 0.3]).unwrap_err();
        assert!(matches!(
            err,
            FitError::ParameterShape {
                groups: 2,
                per_group: 2,
                got: 3
            }
        ));
        assert!(joint.set_parameters(&[0.1; 5]).is_err());
    }

    #[test]
    fn initial_draws_stay_below_init_upper() {
        let joint = two_groups(0.5);
        assert_eq!(joint.parameters().len(), 4);
        assert!(joint.parameters().iter().all(|&v| (0.0..0.05).contains(&v)));
        assert_eq!(joint.merge_parameters(), joint.parameters());
    }

    #[test]
    fn merged_region_is_block_diagonal() {
        let builder = MatrixBuilder::new(ChainConfig::covid().layout().unwrap());
        let joint = JointFitter::from_groups(
            &builder,
            vec![("A".into(), vec![]), ("B".into(), vec![]), ("C".into(), vec![])],
            0.99,
            options(),
        )
        .unwrap();
        let m = joint.constraint_matrix();
        assert_eq!(m.shape(), (15, 33));
        assert_eq!(m, joint.merge_constraints().matrix());
        // No constraint row touches two groups.
        for row in m.row_iter() {
            let touched: BTreeSet<usize> = row
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0.0)
                .map(|(j, _)| j / 11)
                .collect();
            assert_eq!(touched.len(), 1);
        }
        assert_eq!(joint.merge_bounds().len(), 33);
    }

    #[test]
    fn empty_group_list_rejected() {
        let err = JointFitter::from_groups(&split_builder(), vec![], 0.5, options()).unwrap_err();
        assert!(matches!(err, FitError::NoAgeGroups));
    }

    #[test]
    fn mismatched_fitters_rejected() {
        let a = SingleFitter::new("A", split_builder(), vec![], vec![0.1, 0.1]).unwrap();
        let b = SingleFitter::new(
            "B",
            MatrixBuilder::new(ChainConfig::covid().layout().unwrap()),
            vec![],
            vec![0.01; 11],
        )
        .unwrap();
        assert!(matches!(
            JointFitter::new(vec![a, b], 0.5, options()),
            Err(FitError::ParameterShape { .. })
        ));
    }

    #[test]
    fn local_phase_fits_each_group() {
        let mut joint = two_groups(1.0);
        let outcomes = joint.optimize_locally().unwrap();
        assert_eq!(outcomes.len(), 2);
        for o in &outcomes {
            assert!(o.attempts >= 1 && o.attempts <= 4);
            assert!(o.outcome.loss < 0.1);
        }
        assert_eq!(joint.parameters(), joint.merge_parameters().as_slice());
        assert!(joint.region().contains(joint.parameters(), 1e-12));
    }

    #[test]
    fn joint_phase_does_not_increase_objective() {
        let mut joint = two_groups(0.99);
        joint.optimize_locally().unwrap();
        let before = joint.evaluate_current().unwrap();
        let outcome = joint.optimize_globally().unwrap();
        assert!(outcome.loss <= before + 1e-12);
        assert!((joint.evaluate_current().unwrap() - outcome.loss).abs() < 1e-12);
    }

    #[test]
    fn report_renders_joint_figures() {
        let joint = two_groups(0.99);
        let report = joint.report().unwrap();
        assert_eq!(report.ages.len(), 2);
        let text = report.to_string();
        assert!(text.contains("Age_young"));
        assert!(text.contains("Alpha: 0.99"));
        assert!(text.contains("Weighted objective:"));
    }
}
