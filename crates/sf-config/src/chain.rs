//! Chain configuration types.
//!
//! A `ChainConfig` names the stages of the disease-progression chain and the
//! sparsity pattern of its transition matrix: which entries are fixed
//! constants, which are free parameters to be estimated, and which stage
//! copies its outgoing row from another. Stage references are by name; use
//! [`ChainConfig::layout`] to validate and resolve them to indices.

use serde::{Deserialize, Serialize};

/// Default real-world time represented by one discrete step (half a day).
pub const DEFAULT_UNIT_OF_TIME: f64 = 0.5;

/// A `(from, to)` transition between two named stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionKey {
    pub from: String,
    pub to: String,
}

impl TransitionKey {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A transition with a literal, never-optimized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedTransition {
    pub from: String,
    pub to: String,
    pub value: f64,
}

impl FixedTransition {
    pub fn new(from: impl Into<String>, to: impl Into<String>, value: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            value,
        }
    }
}

/// Row-copy rule applied after the matrix is filled.
///
/// The `queue` stage takes over the outgoing row of `source`, keeps the
/// source's self-loop as its own, and never moves back into `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRule {
    pub queue: String,
    pub source: String,
}

/// A starting stage reported in the summary table, with its column label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceState {
    pub stage: String,
    pub label: String,
}

impl ReferenceState {
    pub fn new(stage: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            label: label.into(),
        }
    }
}

/// Full chain configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Stage names in index order.
    pub stages: Vec<String>,

    /// Entries with literal values (absorbing self-loops, artificial seeds).
    #[serde(default)]
    pub fixed_transitions: Vec<FixedTransition>,

    /// Entries estimated by the optimizer, in parameter-vector order.
    pub unknown_transitions: Vec<TransitionKey>,

    /// Optional queue-copy post-processing rule.
    #[serde(default)]
    pub queue_rule: Option<QueueRule>,

    /// Time units represented by one step of the chain.
    #[serde(default = "default_unit_of_time")]
    pub unit_of_time: f64,

    /// Stage the chain starts in (defaults to the first stage).
    #[serde(default)]
    pub initial_state: Option<String>,

    /// Starting stages reported in the summary table.
    #[serde(default)]
    pub reference_states: Vec<ReferenceState>,

    /// Stage whose outgoing row is zeroed in persisted output.
    #[serde(default)]
    pub cleared_output_state: Option<String>,
}

fn default_unit_of_time() -> f64 {
    DEFAULT_UNIT_OF_TIME
}

/// Stage names of the COVID-19 progression chain.
pub mod stages {
    pub const HEALTHY: &str = "HEALTHY";
    pub const INFECTED_NOSYMPTOMS_NOTCONTAGIOUS: &str = "INFECTED_NOSYMPTOMS_NOTCONTAGIOUS";
    pub const INFECTED_NOSYMPTOMS_ISCONTAGIOUS: &str = "INFECTED_NOSYMPTOMS_ISCONTAGIOUS";
    pub const INFECTED_SYMPTOMS_MILD: &str = "INFECTED_SYMPTOMS_MILD";
    pub const INFECTED_SYMPTOMS_SEVERE_IC_POSSIBLE: &str = "INFECTED_SYMPTOMS_SEVERE_ICpossible";
    pub const INFECTED_SYMPTOMS_SEVERE_IC_NOT_POSSIBLE: &str =
        "INFECTED_SYMPTOMS_SEVERE_ICnotpossible";
    pub const INFECTED_SYMPTOMS_SEVERE_QUEUE: &str = "INFECTED_SYMPTOMS_SEVERE_QUEUE";
    pub const CURED: &str = "CURED";
    pub const DEAD: &str = "DEAD";

    /// All stages in index order.
    pub const ALL: [&str; 9] = [
        HEALTHY,
        INFECTED_NOSYMPTOMS_NOTCONTAGIOUS,
        INFECTED_NOSYMPTOMS_ISCONTAGIOUS,
        INFECTED_SYMPTOMS_MILD,
        INFECTED_SYMPTOMS_SEVERE_IC_POSSIBLE,
        INFECTED_SYMPTOMS_SEVERE_IC_NOT_POSSIBLE,
        INFECTED_SYMPTOMS_SEVERE_QUEUE,
        CURED,
        DEAD,
    ];
}

impl ChainConfig {
    /// The nine-stage COVID-19 progression chain.
    pub fn covid() -> Self {
        use stages::*;

        let unknown = [
            (INFECTED_NOSYMPTOMS_NOTCONTAGIOUS, INFECTED_NOSYMPTOMS_ISCONTAGIOUS),
            (INFECTED_NOSYMPTOMS_NOTCONTAGIOUS, CURED),
            (INFECTED_NOSYMPTOMS_ISCONTAGIOUS, INFECTED_SYMPTOMS_MILD),
            (INFECTED_NOSYMPTOMS_ISCONTAGIOUS, CURED),
            (INFECTED_SYMPTOMS_MILD, INFECTED_SYMPTOMS_SEVERE_IC_POSSIBLE),
            (INFECTED_SYMPTOMS_MILD, INFECTED_SYMPTOMS_SEVERE_IC_NOT_POSSIBLE),
            (INFECTED_SYMPTOMS_MILD, CURED),
            (INFECTED_SYMPTOMS_SEVERE_IC_POSSIBLE, CURED),
            (INFECTED_SYMPTOMS_SEVERE_IC_POSSIBLE, DEAD),
            (INFECTED_SYMPTOMS_SEVERE_IC_NOT_POSSIBLE, CURED),
            (INFECTED_SYMPTOMS_SEVERE_IC_NOT_POSSIBLE, DEAD),
        ];

        Self {
            stages: ALL.iter().map(|s| s.to_string()).collect(),
            fixed_transitions: vec![
                // Artificial: the real exit from HEALTHY is driven by the simulation.
                FixedTransition::new(HEALTHY, INFECTED_NOSYMPTOMS_NOTCONTAGIOUS, 1.0),
                FixedTransition::new(
                    INFECTED_SYMPTOMS_SEVERE_QUEUE,
                    INFECTED_SYMPTOMS_SEVERE_QUEUE,
                    1.0,
                ),
                FixedTransition::new(CURED, CURED, 1.0),
                FixedTransition::new(DEAD, DEAD, 1.0),
            ],
            unknown_transitions: unknown
                .iter()
                .map(|(from, to)| TransitionKey::new(*from, *to))
                .collect(),
            queue_rule: Some(QueueRule {
                queue: INFECTED_SYMPTOMS_SEVERE_QUEUE.to_string(),
                source: INFECTED_SYMPTOMS_SEVERE_IC_NOT_POSSIBLE.to_string(),
            }),
            unit_of_time: DEFAULT_UNIT_OF_TIME,
            initial_state: Some(HEALTHY.to_string()),
            reference_states: vec![
                ReferenceState::new(INFECTED_NOSYMPTOMS_NOTCONTAGIOUS, "INN"),
                ReferenceState::new(INFECTED_SYMPTOMS_MILD, "IM"),
                ReferenceState::new(INFECTED_SYMPTOMS_SEVERE_IC_POSSIBLE, "IC"),
            ],
            cleared_output_state: Some(HEALTHY.to_string()),
        }
    }

    /// Number of stages.
    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    /// Number of free parameters per age group.
    pub fn num_parameters(&self) -> usize {
        self.unknown_transitions.len()
    }

    /// Look up a stage index by name.
    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s == name)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::covid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covid_chain_shape() {
        let cfg = ChainConfig::covid();
        assert_eq!(cfg.num_stages(), 9);
        assert_eq!(cfg.num_parameters(), 11);
        assert_eq!(cfg.stage_index("CURED"), Some(7));
        assert_eq!(cfg.stage_index("UNKNOWN"), None);
    }

    #[test]
    fn json_defaults_fill_in() {
        let json = r#"{
            "stages": ["A", "B"],
            "unknown_transitions": [{"from": "A", "to": "B"}]
        }"#;
        let cfg: ChainConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.unit_of_time, DEFAULT_UNIT_OF_TIME);
        assert!(cfg.fixed_transitions.is_empty());
        assert!(cfg.queue_rule.is_none());
        assert!(cfg.initial_state.is_none());
    }

    #[test]
    fn covid_round_trips_through_json() {
        let cfg = ChainConfig::covid();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ChainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
