//! Fitted parameter vectors, persisted next to the result tables so a
//! calibration can be re-evaluated or simulated later.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sf_config::{ChainLayout, SettingsSnapshot};

use crate::error::{InputError, OutputError};
use crate::fit::{JointFitter, JointReport};

/// Fitted free parameters of one age group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParameters {
    pub age: String,
    pub parameters: Vec<f64>,
    pub loss: f64,
}

/// Result of one joint calibration at a fixed alpha.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterFile {
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub alpha: f64,
    /// `(from, to)` stage names of the free transitions, in parameter order.
    pub unknown_transitions: Vec<(String, String)>,
    pub groups: Vec<GroupParameters>,
    pub total_loss: f64,
    pub deviation: f64,
    pub objective: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsSnapshot>,
}

impl ParameterFile {
    pub fn from_joint(joint: &JointFitter, report: &JointReport, layout: &ChainLayout) -> Self {
        let unknown_transitions = layout
            .unknown()
            .iter()
            .map(|&(from, to)| {
                (
                    layout.stage_name(from).unwrap_or_default().to_string(),
                    layout.stage_name(to).unwrap_or_default().to_string(),
                )
            })
            .collect();
        let groups = joint
            .fitters()
            .iter()
            .zip(&report.ages)
            .map(|(f, r)| GroupParameters {
                age: f.age().to_string(),
                parameters: f.parameters().to_vec(),
                loss: r.loss,
            })
            .collect();
        Self {
            created_at: Utc::now(),
            run_id: None,
            alpha: report.alpha,
            unknown_transitions,
            groups,
            total_loss: report.total_loss,
            deviation: report.deviation,
            objective: report.objective,
            settings: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_settings(mut self, snapshot: SettingsSnapshot) -> Self {
        self.settings = Some(snapshot);
        self
    }

    pub fn load(path: &Path) -> Result<Self, InputError> {
        let content = std::fs::read_to_string(path).map_err(|e| InputError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| InputError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), OutputError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| OutputError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| OutputError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check that the file was produced for a chain shaped like `layout`.
    pub fn check(&self, layout: &ChainLayout) -> Result<(), InputError> {
        if self.groups.is_empty() {
            return Err(InputError::NoAgeGroups);
        }
        let expected: Vec<(&str, &str)> = layout
            .unknown()
            .iter()
            .map(|&(from, to)| {
                (
                    layout.stage_name(from).unwrap_or_default(),
                    layout.stage_name(to).unwrap_or_default(),
                )
            })
            .collect();
        let declared: Vec<(&str, &str)> = self
            .unknown_transitions
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        if expected != declared {
            return Err(InputError::ParameterMismatch(
                "free transitions differ from the configured chain".to_string(),
            ));
        }
        for g in &self.groups {
            if g.parameters.len() != layout.num_parameters() {
                return Err(InputError::ParameterMismatch(format!(
                    "age group '{}' has {} parameters, chain has {}",
                    g.age,
                    g.parameters.len(),
                    layout.num_parameters()
                )));
            }
        }
        Ok(())
    }

    pub fn group(&self, age: &str) -> Option<&GroupParameters> {
        self.groups.iter().find(|g| g.age == age)
    }
}
