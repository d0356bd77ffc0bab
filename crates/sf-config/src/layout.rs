//! Index-resolved chain layout.
//!
//! The engine works with stage indices only. [`ChainConfig::layout`] checks
//! every declaration and produces a [`ChainLayout`]; a layout that exists is
//! known to be well formed.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::chain::ChainConfig;
use crate::validate::{ValidationError, ValidationResult};

/// A `(from, to)` pair of stage indices.
pub type Transition = (usize, usize);

/// Validated chain layout in index form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLayout {
    stages: Vec<String>,
    fixed: Vec<(Transition, f64)>,
    unknown: Vec<Transition>,
    queue_rule: Option<(usize, usize)>,
    unit_of_time: f64,
    initial_state: usize,
    reference_states: Vec<(usize, String)>,
    cleared_output_state: Option<usize>,
}

impl ChainConfig {
    /// Validate the configuration and resolve stage names to indices.
    pub fn layout(&self) -> ValidationResult<ChainLayout> {
        if self.stages.is_empty() {
            return Err(ValidationError::SemanticError(
                "chain must declare at least one stage".to_string(),
            ));
        }
        let mut index = HashMap::with_capacity(self.stages.len());
        for (i, name) in self.stages.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: format!("stages[{}]", i),
                    message: "stage name must not be empty".to_string(),
                });
            }
            if index.insert(name.as_str(), i).is_some() {
                return Err(ValidationError::DuplicateEntry(format!("stage {}", name)));
            }
        }
        let lookup = |field: &str, name: &str| -> ValidationResult<usize> {
            index.get(name).copied().ok_or_else(|| ValidationError::UnknownStage {
                field: field.to_string(),
                name: name.to_string(),
            })
        };

        let mut fixed = Vec::with_capacity(self.fixed_transitions.len());
        for (i, t) in self.fixed_transitions.iter().enumerate() {
            let field = format!("fixed_transitions[{}]", i);
            fixed.push((
                (lookup(&field, &t.from)?, lookup(&field, &t.to)?),
                t.value,
            ));
        }

        let mut unknown = Vec::with_capacity(self.unknown_transitions.len());
        for (i, t) in self.unknown_transitions.iter().enumerate() {
            let field = format!("unknown_transitions[{}]", i);
            unknown.push((lookup(&field, &t.from)?, lookup(&field, &t.to)?));
        }

        let queue_rule = match &self.queue_rule {
            Some(rule) => Some((
                lookup("queue_rule.queue", &rule.queue)?,
                lookup("queue_rule.source", &rule.source)?,
            )),
            None => None,
        };

        let initial_state = match &self.initial_state {
            Some(name) => lookup("initial_state", name)?,
            None => 0,
        };

        let reference_states = self
            .reference_states
            .iter()
            .map(|r| Ok((lookup("reference_states", &r.stage)?, r.label.clone())))
            .collect::<ValidationResult<Vec<_>>>()?;

        let cleared_output_state = match &self.cleared_output_state {
            Some(name) => Some(lookup("cleared_output_state", name)?),
            None => None,
        };

        ChainLayout::from_indices(
            self.stages.clone(),
            fixed,
            unknown,
            queue_rule,
            self.unit_of_time,
        )
        .map(|layout| ChainLayout {
            initial_state,
            reference_states,
            cleared_output_state,
            ..layout
        })
    }
}

impl ChainLayout {
    /// Build a layout directly from indices.
    ///
    /// Initial state defaults to 0; no reference or cleared states are set.
    pub fn from_indices(
        stages: Vec<String>,
        fixed: Vec<(Transition, f64)>,
        unknown: Vec<Transition>,
        queue_rule: Option<(usize, usize)>,
        unit_of_time: f64,
    ) -> ValidationResult<Self> {
        let n = stages.len();
        if n == 0 {
            return Err(ValidationError::SemanticError(
                "chain must declare at least one stage".to_string(),
            ));
        }
        if !unit_of_time.is_finite() || unit_of_time <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "unit_of_time".to_string(),
                message: format!("must be positive and finite, got {}", unit_of_time),
            });
        }

        let in_range = |field: &str, (from, to): Transition| -> ValidationResult<()> {
            if from >= n || to >= n {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: format!("transition ({}, {}) outside {} stages", from, to, n),
                });
            }
            Ok(())
        };

        let mut fixed_keys = HashSet::with_capacity(fixed.len());
        for (i, &(key, value)) in fixed.iter().enumerate() {
            let field = format!("fixed_transitions[{}]", i);
            in_range(&field, key)?;
            if !value.is_finite() {
                return Err(ValidationError::InvalidValue {
                    field,
                    message: format!("value must be finite, got {}", value),
                });
            }
            if !fixed_keys.insert(key) {
                return Err(ValidationError::DuplicateEntry(format!(
                    "fixed transition ({}, {})",
                    key.0, key.1
                )));
            }
        }

        if unknown.is_empty() {
            return Err(ValidationError::SemanticError(
                "at least one unknown transition is required".to_string(),
            ));
        }
        let mut unknown_keys = HashSet::with_capacity(unknown.len());
        for (i, &key) in unknown.iter().enumerate() {
            let field = format!("unknown_transitions[{}]", i);
            in_range(&field, key)?;
            if key.0 == key.1 {
                return Err(ValidationError::InvalidValue {
                    field,
                    message: format!(
                        "diagonal entry ({}, {}) is derived and cannot be estimated",
                        key.0, key.1
                    ),
                });
            }
            if fixed_keys.contains(&key) {
                return Err(ValidationError::OverlappingTransition {
                    from: key.0,
                    to: key.1,
                });
            }
            if !unknown_keys.insert(key) {
                return Err(ValidationError::DuplicateEntry(format!(
                    "unknown transition ({}, {})",
                    key.0, key.1
                )));
            }
        }

        if let Some((queue, source)) = queue_rule {
            in_range("queue_rule", (queue, source))?;
            if queue == source {
                return Err(ValidationError::InvalidValue {
                    field: "queue_rule".to_string(),
                    message: "queue and source must be different stages".to_string(),
                });
            }
        }

        Ok(Self {
            stages,
            fixed,
            unknown,
            queue_rule,
            unit_of_time,
            initial_state: 0,
            reference_states: Vec::new(),
            cleared_output_state: None,
        })
    }

    /// Set the starting stage used by duration targets.
    pub fn with_initial_state(mut self, state: usize) -> ValidationResult<Self> {
        self.check_stage("initial_state", state)?;
        self.initial_state = state;
        Ok(self)
    }

    /// Set the summary reference stages and their labels.
    pub fn with_reference_states(mut self, states: Vec<(usize, String)>) -> ValidationResult<Self> {
        for (state, _) in &states {
            self.check_stage("reference_states", *state)?;
        }
        self.reference_states = states;
        Ok(self)
    }

    /// Set the stage whose row is zeroed in persisted output.
    pub fn with_cleared_output_state(mut self, state: usize) -> ValidationResult<Self> {
        self.check_stage("cleared_output_state", state)?;
        self.cleared_output_state = Some(state);
        Ok(self)
    }

    fn check_stage(&self, field: &str, state: usize) -> ValidationResult<()> {
        if state >= self.stages.len() {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                message: format!("stage {} outside {} stages", state, self.stages.len()),
            });
        }
        Ok(())
    }

    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    /// Number of free parameters.
    pub fn num_parameters(&self) -> usize {
        self.unknown.len()
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn stage_name(&self, index: usize) -> Option<&str> {
        self.stages.get(index).map(String::as_str)
    }

    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s == name)
    }

    /// Fixed entries with their literal values.
    pub fn fixed(&self) -> &[(Transition, f64)] {
        &self.fixed
    }

    /// Free entries in parameter order.
    pub fn unknown(&self) -> &[Transition] {
        &self.unknown
    }

    /// `(queue, source)` indices of the row-copy rule.
    pub fn queue_rule(&self) -> Option<(usize, usize)> {
        self.queue_rule
    }

    pub fn unit_of_time(&self) -> f64 {
        self.unit_of_time
    }

    pub fn initial_state(&self) -> usize {
        self.initial_state
    }

    /// Summary starting stages with their column labels.
    pub fn reference_states(&self) -> &[(usize, String)] {
        &self.reference_states
    }

    pub fn cleared_output_state(&self) -> Option<usize> {
        self.cleared_output_state
    }

    /// Parse one stage name or a comma-separated list into stage indices.
    pub fn stage_ids(&self, text: &str) -> ValidationResult<BTreeSet<usize>> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| {
                self.stage_index(name)
                    .ok_or_else(|| ValidationError::UnknownStage {
                        field: "stages".to_string(),
                        name: name.to_string(),
                    })
            })
            .collect()
    }
}
