//! Process exit codes for the `stagefit` CLI.
//!
//! Ranges:
//! - 0: success
//! - 10-19: user or input errors (fixable by the caller)
//! - 20-29: numerical and internal failures

use crate::error::{Error, FitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// All requested calibrations finished and were written.
    Success = 0,

    /// Invalid arguments.
    ArgsError = 10,

    /// Settings file missing, malformed or semantically invalid.
    ConfigError = 11,

    /// Input tables or parameter files unreadable or inconsistent.
    InputError = 12,

    /// A chain solve or minimization failed.
    NumericalError = 20,

    /// Results could not be written.
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Success
    }

    /// Codes 10-19.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&self.as_i32())
    }

    /// Codes 20-29.
    pub fn is_internal_error(self) -> bool {
        self.as_i32() >= 20
    }

    /// Stable name for JSON output.
    pub fn code_name(self) -> &'static str {
        match self {
            ExitCode::Success => "OK_SUCCESS",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::NumericalError => "ERR_NUMERICAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) => ExitCode::ConfigError,
            Error::Input(_) => ExitCode::InputError,
            Error::Fit(FitError::NoAgeGroups) => ExitCode::InputError,
            Error::Chain(_) | Error::Build(_) | Error::Fit(_) => ExitCode::NumericalError,
            Error::Output(_) => ExitCode::IoError,
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
