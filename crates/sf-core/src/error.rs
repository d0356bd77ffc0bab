//! Error types for chain analytics, fitting and I/O.

use std::path::PathBuf;

use sf_config::ValidationError;
use sf_math::MathError;
use thiserror::Error;

/// Errors raised by the Markov-chain engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// Some transient state cannot reach the states that end the walk
    /// (absorbing states, plus the targets of a hitting-probability solve),
    /// so the linear system has no unique solution.
    #[error("singular system in {operation}: state {state} never reaches an absorbing state")]
    Singular { operation: &'static str, state: usize },

    /// The solver itself failed on a system that has an exit.
    #[error("linear solve failed in {operation}: {source}")]
    Solve {
        operation: &'static str,
        #[source]
        source: MathError,
    },

    /// The transition matrix is not square.
    #[error("transition matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// A replacement matrix has a different number of states.
    #[error("expected a {expected}-state transition matrix, got {got} states")]
    OrderMismatch { expected: usize, got: usize },

    /// A state index is outside the chain.
    #[error("state {state} out of range for chain with {num_states} states")]
    StateOutOfRange { state: usize, num_states: usize },

    /// A start distribution has the wrong length.
    #[error("start distribution has {got} entries, chain has {expected} states")]
    DistributionLength { expected: usize, got: usize },
}

impl ChainError {
    pub(crate) fn solve(operation: &'static str, source: MathError) -> Self {
        ChainError::Solve { operation, source }
    }
}

/// Errors raised when turning a parameter vector into a transition matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("not enough parameters: expected at least {expected}, got {got}")]
    InsufficientParameters { expected: usize, got: usize },
}

/// Errors raised while fitting parameters.
#[derive(Error, Debug)]
pub enum FitError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// A joint parameter vector does not reshape into age-group blocks.
    #[error("parameter vector of length {got} does not match {groups} groups of {per_group}")]
    ParameterShape {
        groups: usize,
        per_group: usize,
        got: usize,
    },

    /// Joint fitting needs at least one age group.
    #[error("no age groups to fit")]
    NoAgeGroups,

    /// The minimizer failed for a reason other than a chain evaluation.
    #[error("optimizer failed: {0}")]
    Optimizer(String),
}

/// Errors raised while loading calibration targets.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A target refers to a stage the chain does not have.
    #[error("target '{label}' refers to unknown stage '{stage}'")]
    UnknownStage { label: String, stage: String },

    /// A target names no stages at all.
    #[error("target '{label}' has an empty stage list")]
    EmptyStages { label: String },

    /// A target weight is negative or not finite.
    #[error("target '{label}' has invalid weight {weight}")]
    InvalidWeight { label: String, weight: f64 },

    #[error("input declares no age groups")]
    NoAgeGroups,

    #[error("duplicate age group '{0}'")]
    DuplicateAgeGroup(String),

    #[error("unknown age group '{0}'")]
    UnknownAgeGroup(String),

    /// A parameter file does not fit the configured chain.
    #[error("parameter file mismatch: {0}")]
    ParameterMismatch(String),
}

/// Errors raised while writing results.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error writing {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Result type for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;
