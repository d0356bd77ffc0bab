//! Fitting the free transitions of a single age group.

use std::fmt;

use rand::Rng;
use serde::Serialize;
use sf_math::Matrix;

use super::optimizer::{minimize, MinimizerSettings};
use super::FitOutcome;
use crate::builder::MatrixBuilder;
use crate::chain::Chain;
use crate::constraints::{Bounds, FeasibleRegion, LinearConstraints};
use crate::error::FitError;
use crate::target::{Target, TargetReport};

/// Chain, targets and feasible region of one age group.
///
/// The transition matrix is rebuilt from scratch whenever the parameters
/// change; targets are evaluated against the current chain.
#[derive(Debug, Clone)]
pub struct SingleFitter {
    age: String,
    builder: MatrixBuilder,
    chain: Chain,
    x: Vec<f64>,
    targets: Vec<Target>,
    region: FeasibleRegion,
}

impl SingleFitter {
    /// Create a fitter starting at parameters `x0`.
    pub fn new(
        age: impl Into<String>,
        builder: MatrixBuilder,
        targets: Vec<Target>,
        x0: Vec<f64>,
    ) -> Result<Self, FitError> {
        let n = builder.num_parameters();
        let matrix = builder.build(&x0)?;
        let chain = Chain::new(matrix, builder.layout().unit_of_time())?;
        let region = FeasibleRegion::new(
            Bounds::unit(n),
            LinearConstraints::from_layout(builder.layout()),
        );
        let mut x0 = x0;
        x0.truncate(n);
        Ok(Self {
            age: age.into(),
            builder,
            chain,
            x: x0,
            targets,
            region,
        })
    }

    /// Create a fitter with parameters drawn uniformly from `[0, upper)`.
    pub fn with_random_start<R: Rng>(
        age: impl Into<String>,
        builder: MatrixBuilder,
        targets: Vec<Target>,
        rng: &mut R,
        upper: f64,
    ) -> Result<Self, FitError> {
        let x0 = draw_uniform(rng, builder.num_parameters(), upper);
        Self::new(age, builder, targets, x0)
    }

    pub fn age(&self) -> &str {
        &self.age
    }

    pub fn parameters(&self) -> &[f64] {
        &self.x
    }

    pub fn num_parameters(&self) -> usize {
        self.builder.num_parameters()
    }

    pub fn builder(&self) -> &MatrixBuilder {
        &self.builder
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn bounds(&self) -> &Bounds {
        &self.region.bounds
    }

    pub fn constraints(&self) -> &LinearConstraints {
        &self.region.constraints
    }

    pub fn region(&self) -> &FeasibleRegion {
        &self.region
    }

    /// Adopt `x`, rebuild the matrix and return it.
    pub fn set_parameters(&mut self, x: &[f64]) -> Result<&Matrix, FitError> {
        let matrix = self.builder.build(x)?;
        self.chain.set_transition_matrix(matrix)?;
        self.x = x[..self.builder.num_parameters()].to_vec();
        Ok(self.chain.transition_matrix())
    }

    /// Replace the parameters with uniform draws from `[0, upper)`.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R, upper: f64) -> Result<(), FitError> {
        let x = draw_uniform(rng, self.num_parameters(), upper);
        self.set_parameters(&x)?;
        Ok(())
    }

    /// Adopt `x` and return the loss.
    pub fn evaluate(&mut self, x: &[f64]) -> Result<f64, FitError> {
        self.set_parameters(x)?;
        self.evaluate_current()
    }

    /// Sum of weighted squared errors at the current parameters.
    pub fn evaluate_current(&self) -> Result<f64, FitError> {
        total_loss(&self.targets, &self.chain)
    }

    /// Loss at `x` without changing the fitter.
    pub fn loss_at(&self, x: &[f64]) -> Result<f64, FitError> {
        let chain = Chain::new(self.builder.build(x)?, self.chain.unit_of_time())?;
        total_loss(&self.targets, &chain)
    }

    /// Minimize the loss starting from the current parameters and adopt the
    /// result.
    pub fn optimize(&mut self, settings: &MinimizerSettings) -> Result<FitOutcome, FitError> {
        let minimum = minimize(|x| self.loss_at(x), &self.x, &self.region, settings)?;
        if !minimum.converged {
            tracing::debug!(
                age = %self.age,
                iterations = minimum.iterations,
                loss = minimum.value,
                "local minimization stopped before convergence"
            );
        }
        self.set_parameters(&minimum.x)?;
        Ok(FitOutcome::from(&minimum))
    }

    /// Evaluate every target at the current parameters.
    pub fn report(&self) -> Result<AgeReport, FitError> {
        let targets = self
            .targets
            .iter()
            .map(|t| t.report(&self.chain))
            .collect::<Result<Vec<_>, _>>()?;
        let loss = targets.iter().map(|t| t.contribution).sum();
        Ok(AgeReport {
            age: self.age.clone(),
            targets,
            loss,
        })
    }
}

fn total_loss(targets: &[Target], chain: &Chain) -> Result<f64, FitError> {
    targets
        .iter()
        .try_fold(0.0, |acc, t| -> Result<f64, FitError> {
            Ok(acc + t.weighted_sq_error(chain)?)
        })
}

pub(super) fn draw_uniform<R: Rng>(rng: &mut R, n: usize, upper: f64) -> Vec<f64> {
    (0..n).map(|_| rng.random::<f64>() * upper).collect()
}

/// Target-by-target fit of one age group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeReport {
    pub age: String,
    pub targets: Vec<TargetReport>,
    pub loss: f64,
}

impl fmt::Display for AgeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = "*".repeat(60);
        writeln!(f, "{}", line)?;
        writeln!(f, "{}", self.age)?;
        writeln!(f, "{}", line)?;
        for t in &self.targets {
            writeln!(f, "{}", t)?;
        }
        Ok(())
    }
}
