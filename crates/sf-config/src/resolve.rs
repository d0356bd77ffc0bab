//! Settings file resolution.
//!
//! Resolution order: CLI argument → environment variables → XDG path → defaults.

use std::path::{Path, PathBuf};

/// Where a settings file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Resolved settings path with provenance.
#[derive(Debug, Clone, Default)]
pub struct SettingsPath {
    /// Path to the settings file (None when using built-in defaults).
    pub path: Option<PathBuf>,

    /// Where it came from.
    pub source: ConfigSource,
}

/// Environment variable names.
const ENV_SETTINGS_PATH: &str = "STAGEFIT_CONFIG";
const ENV_CONFIG_DIR: &str = "STAGEFIT_CONFIG_DIR";

/// Standard settings file name.
const SETTINGS_FILENAME: &str = "stagefit.json";

/// Application name for XDG directories.
const APP_NAME: &str = "stagefit";

/// Resolve the settings path.
///
/// 1. Explicit CLI path (returned even if missing so the caller reports it)
/// 2. `STAGEFIT_CONFIG` environment variable
/// 3. `STAGEFIT_CONFIG_DIR` environment variable + `stagefit.json`
/// 4. XDG config directory (`~/.config/stagefit/stagefit.json`)
/// 5. Built-in defaults (None)
pub fn resolve_settings_path(cli_path: Option<&Path>) -> SettingsPath {
    if let Some(path) = cli_path {
        return SettingsPath {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    if let Ok(env_path) = std::env::var(ENV_SETTINGS_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return SettingsPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(SETTINGS_FILENAME);
        if path.exists() {
            return SettingsPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(SETTINGS_FILENAME);
        if path.exists() {
            return SettingsPath {
                path: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    SettingsPath::default()
}

/// Get the XDG config directory for stagefit.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}
