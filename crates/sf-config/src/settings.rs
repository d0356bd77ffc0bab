//! Top-level settings file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationConfig;
use crate::chain::ChainConfig;
use crate::resolve::{resolve_settings_path, SettingsPath};
use crate::validate::{validate_settings, ValidationError, ValidationResult};

/// Contents of a `stagefit.json` settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            chain: ChainConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

impl Settings {
    /// Load and validate settings from a JSON file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_str(&content)
    }

    /// Parse and validate settings from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> ValidationResult<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Resolve and load settings, falling back to built-in defaults.
    pub fn load(cli_path: Option<&Path>) -> ValidationResult<(Self, SettingsPath)> {
        let resolved = resolve_settings_path(cli_path);
        let settings = match &resolved.path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok((settings, resolved))
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
