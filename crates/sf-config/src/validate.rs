//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::calibration::CalibrationConfig;
use crate::settings::Settings;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown stage '{name}' in {field}")]
    UnknownStage { field: String, name: String },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Transition ({from}, {to}) is declared both fixed and unknown")]
    OverlappingTransition { from: usize, to: usize },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::UnknownStage { .. } => 67,
            ValidationError::DuplicateEntry(_) => 68,
            ValidationError::OverlappingTransition { .. } => 69,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate a complete settings file.
pub fn validate_settings(settings: &Settings) -> ValidationResult<()> {
    if settings.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: settings.schema_version.clone(),
        });
    }

    settings.chain.layout()?;
    validate_calibration(&settings.calibration)
}

/// Validate fitting knobs.
pub fn validate_calibration(cfg: &CalibrationConfig) -> ValidationResult<()> {
    for (i, &alpha) in cfg.alphas.iter().enumerate() {
        validate_unit_interval(&format!("calibration.alphas[{}]", i), alpha)?;
    }

    if cfg.local_retries == 0 {
        return Err(ValidationError::InvalidValue {
            field: "calibration.local_retries".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    validate_non_negative("calibration.local_tolerance", cfg.local_tolerance)?;
    validate_non_negative("calibration.convergence_tolerance", cfg.convergence_tolerance)?;
    validate_non_negative("calibration.sd_tolerance", cfg.sd_tolerance)?;
    validate_non_negative("calibration.infeasibility_penalty", cfg.infeasibility_penalty)?;

    if !(cfg.init_upper > 0.0 && cfg.init_upper <= 1.0) {
        return Err(ValidationError::InvalidValue {
            field: "calibration.init_upper".to_string(),
            message: format!("Must be in (0, 1], got {}", cfg.init_upper),
        });
    }

    if cfg.local_max_iters == 0 || cfg.joint_max_iters == 0 {
        return Err(ValidationError::InvalidValue {
            field: "calibration.max_iters".to_string(),
            message: "Iteration caps must be positive".to_string(),
        });
    }

    if cfg.convergence_max_iters == 0 {
        return Err(ValidationError::InvalidValue {
            field: "calibration.convergence_max_iters".to_string(),
            message: "Must be positive".to_string(),
        });
    }

    Ok(())
}

/// Validate a blending weight or probability in `[0, 1]`.
pub fn validate_unit_interval(field: &str, value: f64) -> ValidationResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be in [0, 1], got {}", value),
        });
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_nan() || value < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be non-negative, got {}", value),
        });
    }
    Ok(())
}
