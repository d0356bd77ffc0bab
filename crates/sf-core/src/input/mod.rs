//! Calibration input: age groups and empirical targets.
//!
//! Input comes either as one JSON document or as a directory of three CSV
//! tables (`age_groups.csv`, `probability.csv`, `duration.csv`). Both forms
//! deserialize into the same [`InputData`]; stage names are only resolved
//! against a chain layout when targets are built.

mod tables;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sf_config::{ChainLayout, ValidationError};

use crate::error::InputError;
use crate::target::{Target, TargetInfo};

pub use tables::{AGE_GROUPS_FILE, DURATION_FILE, PROBABILITY_FILE};

/// One hitting-probability target as read from input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityRecord {
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Age group, or `Age_all`.
    pub age: String,
    /// Starting stage name.
    pub start: String,
    /// One stage name or a comma-separated list.
    pub stages: String,
    pub target: f64,
    pub weight: f64,
}

/// One expected-duration target as read from input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationRecord {
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub age: String,
    pub stages: String,
    pub target: f64,
    pub weight: f64,
}

/// Everything a calibration run reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputData {
    pub age_groups: Vec<String>,
    #[serde(default)]
    pub probability: Vec<ProbabilityRecord>,
    #[serde(default)]
    pub duration: Vec<DurationRecord>,
}

impl InputData {
    /// Load from a JSON file or a directory of CSV tables.
    pub fn load(path: &Path) -> Result<Self, InputError> {
        let data = if path.is_dir() {
            tables::read_dir(path)?
        } else {
            Self::from_json_file(path)?
        };
        data.check_age_groups()?;
        tracing::debug!(
            path = %path.display(),
            age_groups = data.age_groups.len(),
            probability = data.probability.len(),
            duration = data.duration.len(),
            "input loaded"
        );
        Ok(data)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, InputError> {
        let content = std::fs::read_to_string(path).map_err(|e| InputError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| InputError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn check_age_groups(&self) -> Result<(), InputError> {
        if self.age_groups.is_empty() {
            return Err(InputError::NoAgeGroups);
        }
        let mut seen = HashSet::with_capacity(self.age_groups.len());
        for age in &self.age_groups {
            if !seen.insert(age.as_str()) {
                return Err(InputError::DuplicateAgeGroup(age.clone()));
            }
        }
        Ok(())
    }

    /// Targets applying to `age`: probability targets first, then durations,
    /// each in input order.
    pub fn targets_for(&self, age: &str, layout: &ChainLayout) -> Result<Vec<Target>, InputError> {
        let mut targets = Vec::new();
        for r in &self.probability {
            let info = TargetInfo {
                label: r.label.clone(),
                description: r.description.clone(),
                age: r.age.clone(),
            };
            if !info.applies_to(age) {
                continue;
            }
            check_weight(&r.label, r.weight)?;
            let start = layout
                .stage_index(r.start.trim())
                .ok_or_else(|| InputError::UnknownStage {
                    label: r.label.clone(),
                    stage: r.start.clone(),
                })?;
            let stages = resolve_stages(&r.label, &r.stages, layout)?;
            targets.push(Target::probability(start, stages, r.target, r.weight, info));
        }
        for r in &self.duration {
            let info = TargetInfo {
                label: r.label.clone(),
                description: r.description.clone(),
                age: r.age.clone(),
            };
            if !info.applies_to(age) {
                continue;
            }
            check_weight(&r.label, r.weight)?;
            let stages = resolve_stages(&r.label, &r.stages, layout)?;
            targets.push(Target::duration(stages, r.target, r.weight, info));
        }
        Ok(targets)
    }

    /// `(age, targets)` for every age group, in declared order.
    pub fn groups(&self, layout: &ChainLayout) -> Result<Vec<(String, Vec<Target>)>, InputError> {
        self.age_groups
            .iter()
            .map(|age| Ok((age.clone(), self.targets_for(age, layout)?)))
            .collect()
    }
}

fn check_weight(label: &str, weight: f64) -> Result<(), InputError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(InputError::InvalidWeight {
            label: label.to_string(),
            weight,
        });
    }
    Ok(())
}

fn resolve_stages(
    label: &str,
    text: &str,
    layout: &ChainLayout,
) -> Result<BTreeSet<usize>, InputError> {
    let stages = layout.stage_ids(text).map_err(|e| match e {
        ValidationError::UnknownStage { name, .. } => InputError::UnknownStage {
            label: label.to_string(),
            stage: name,
        },
        other => InputError::UnknownStage {
            label: label.to_string(),
            stage: other.to_string(),
        },
    })?;
    if stages.is_empty() {
        return Err(InputError::EmptyStages {
            label: label.to_string(),
        });
    }
    Ok(stages)
}
