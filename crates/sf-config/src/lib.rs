//! Stagefit configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the chain layout and calibration settings
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation that fails fast before any solve
//! - Config snapshots stored next to calibration results

pub mod calibration;
pub mod chain;
pub mod layout;
pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod validate;

pub use calibration::CalibrationConfig;
pub use chain::{ChainConfig, FixedTransition, QueueRule, ReferenceState, TransitionKey};
pub use layout::ChainLayout;
pub use resolve::{resolve_settings_path, ConfigSource, SettingsPath};
pub use settings::Settings;
pub use snapshot::SettingsSnapshot;
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
