//! Settings snapshots stored alongside calibration results.
//!
//! A snapshot records which settings produced a result set, so a table on
//! disk can be traced back to its chain layout and fitting knobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::SettingsPath;
use crate::settings::Settings;

/// A frozen snapshot of the settings used for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the settings.
    pub schema_version: String,

    /// Path where settings were loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// Source of the settings.
    pub source: String,

    /// SHA-256 of the canonical settings JSON.
    pub hash: String,

    /// Key values for quick reference.
    pub summary: SettingsSummary,
}

/// Key settings values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSummary {
    pub num_stages: usize,
    pub num_parameters: usize,
    pub unit_of_time: f64,
    pub alphas: Vec<f64>,
    pub local_retries: usize,
    pub joint_max_iters: u64,
    pub seed: Option<u64>,
}

impl SettingsSnapshot {
    /// Snapshot the given settings with their provenance.
    pub fn new(settings: &Settings, path: &SettingsPath) -> Self {
        let canonical = serde_json::to_string(settings).unwrap_or_default();

        SettingsSnapshot {
            timestamp: Utc::now(),
            schema_version: settings.schema_version.clone(),
            path: path.path.as_ref().map(|p| p.display().to_string()),
            source: path.source.to_string(),
            hash: hash_content(&canonical),
            summary: SettingsSummary {
                num_stages: settings.chain.num_stages(),
                num_parameters: settings.chain.num_parameters(),
                unit_of_time: settings.chain.unit_of_time,
                alphas: settings.calibration.alphas.clone(),
                local_retries: settings.calibration.local_retries,
                joint_max_iters: settings.calibration.joint_max_iters,
                seed: settings.calibration.seed,
            },
        }
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether two snapshots describe the same settings.
    pub fn matches(&self, other: &SettingsSnapshot) -> bool {
        self.hash == other.hash
    }

    /// First 12 hex characters of the hash.
    pub fn short_id(&self) -> &str {
        &self.hash[..12.min(self.hash.len())]
    }
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_settings_match() {
        let settings = Settings::default();
        let a = SettingsSnapshot::new(&settings, &SettingsPath::default());
        let b = SettingsSnapshot::new(&settings, &SettingsPath::default());
        assert!(a.matches(&b));
        assert_eq!(a.short_id().len(), 12);
        assert_eq!(a.source, "builtin default");
    }

    #[test]
    fn changed_seed_changes_hash() {
        let mut settings = Settings::default();
        let a = SettingsSnapshot::new(&settings, &SettingsPath::default());
        settings.calibration.seed = Some(42);
        let b = SettingsSnapshot::new(&settings, &SettingsPath::default());
        assert!(!a.matches(&b));
        assert_eq!(b.summary.seed, Some(42));
    }

    #[test]
    fn snapshot_json_round_trip() {
        let snap = SettingsSnapshot::new(&Settings::default(), &SettingsPath::default());
        let back = SettingsSnapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(back.hash, snap.hash);
        assert_eq!(back.summary, snap.summary);
        assert_eq!(back.summary.num_parameters, 11);
    }
}
