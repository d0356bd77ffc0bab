//! Calibration targets.
//!
//! A target compares one chain-derived quantity against an empirical value.
//! The set of quantities is closed, so targets dispatch on [`TargetKind`].

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::chain::Chain;
use crate::error::ChainError;

/// Age tag meaning "applies to every age group".
pub const ALL_AGES: &str = "Age_all";

/// Chain quantity a target is matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetKind {
    /// Probability of ever hitting `stages` from `start`.
    Probability {
        start: usize,
        stages: BTreeSet<usize>,
    },
    /// Expected time spent in `stages`.
    Duration { stages: BTreeSet<usize> },
}

/// Descriptive metadata. Not used in computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetInfo {
    pub label: String,
    pub description: String,
    pub age: String,
}

impl TargetInfo {
    /// Whether the target applies to `age`.
    pub fn applies_to(&self, age: &str) -> bool {
        self.age == ALL_AGES || self.age == age
    }
}

/// One weighted calibration target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub kind: TargetKind,
    pub target: f64,
    pub weight: f64,
    pub info: TargetInfo,
}

impl Target {
    pub fn probability(
        start: usize,
        stages: BTreeSet<usize>,
        target: f64,
        weight: f64,
        info: TargetInfo,
    ) -> Self {
        Self {
            kind: TargetKind::Probability { start, stages },
            target,
            weight,
            info,
        }
    }

    pub fn duration(stages: BTreeSet<usize>, target: f64, weight: f64, info: TargetInfo) -> Self {
        Self {
            kind: TargetKind::Duration { stages },
            target,
            weight,
            info,
        }
    }

    /// Current value of the quantity in `chain`.
    pub fn value(&self, chain: &Chain) -> Result<f64, ChainError> {
        match &self.kind {
            TargetKind::Probability { start, stages } => chain.hitting_probability(*start, stages),
            TargetKind::Duration { stages } => chain.duration_stages(stages),
        }
    }

    /// `target - value`.
    pub fn error(&self, chain: &Chain) -> Result<f64, ChainError> {
        Ok(self.target - self.value(chain)?)
    }

    /// `weight · error²`, the target's contribution to the loss.
    ///
    /// A zero-weight target contributes 0 without touching the chain, even
    /// when its value is infinite.
    #[allow(clippy::float_cmp)]
    pub fn weighted_sq_error(&self, chain: &Chain) -> Result<f64, ChainError> {
        if self.weight == 0.0 {
            return Ok(0.0);
        }
        let e = self.error(chain)?;
        Ok(contribution(self.weight, e))
    }

    /// Snapshot of the target's fit in `chain`.
    pub fn report(&self, chain: &Chain) -> Result<TargetReport, ChainError> {
        let value = self.value(chain)?;
        let error = self.target - value;
        Ok(TargetReport {
            info: self.info.clone(),
            target: self.target,
            value,
            weight: self.weight,
            contribution: contribution(self.weight, error),
        })
    }
}

#[allow(clippy::float_cmp)]
fn contribution(weight: f64, error: f64) -> f64 {
    if weight == 0.0 {
        0.0
    } else {
        weight * error * error
    }
}

/// Evaluated target, rendered as a diagnostic block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    pub info: TargetInfo,
    pub target: f64,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl fmt::Display for TargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(60))?;
        writeln!(f, "Label: {}", self.info.label)?;
        writeln!(f, "Description: {}", self.info.description)?;
        writeln!(f, "Age: {}", self.info.age)?;
        writeln!(f, "Target: {}", self.target)?;
        writeln!(f, "Value: {}", self.value)?;
        writeln!(f, "Weight: {}", self.weight)?;
        write!(f, "Contribution loss: {}", self.contribution)
    }
}
