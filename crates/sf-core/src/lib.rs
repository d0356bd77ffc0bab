//! Stagefit core library.
//!
//! Calibrates the transition probabilities of an absorbing Markov chain of
//! disease stages against empirical targets, one chain per age group:
//!
//! - [`chain`]: hitting probabilities, durations, simulation, convergence
//! - [`builder`]: parameter vector to transition matrix
//! - [`target`]: weighted probability and duration targets
//! - [`fit`]: per-age and joint (age-smoothed) minimization
//! - [`input`] and [`output`]: tables on disk
//! - [`run`]: alpha sweeps and re-evaluation of stored parameters
//!
//! The binary entry point is in `main.rs`.

pub mod builder;
pub mod chain;
pub mod constraints;
pub mod error;
pub mod exit_codes;
pub mod fit;
pub mod input;
pub mod logging;
pub mod output;
pub mod run;
pub mod target;

pub use builder::MatrixBuilder;
pub use chain::Chain;
pub use error::{Error, Result};
pub use fit::{FitOptions, JointFitter, SingleFitter};
pub use input::InputData;
pub use output::OutputFormat;
pub use run::{run_alpha_sweep, SweepRequest, SweepResult};
pub use target::Target;
