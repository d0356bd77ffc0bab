//! Parameter fitting for one age group and for all age groups jointly.

mod joint;
mod optimizer;
mod single;

pub use joint::{JointFitter, JointOutcome, JointReport, LocalOutcome};
pub use optimizer::{minimize, MinimizerSettings, Minimum};
pub use single::{AgeReport, SingleFitter};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use sf_config::CalibrationConfig;

/// Fitting knobs derived from [`CalibrationConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub local_retries: usize,
    pub local_tolerance: f64,
    pub init_upper: f64,
    pub local: MinimizerSettings,
    pub joint: MinimizerSettings,
    pub seed: Option<u64>,
}

impl From<&CalibrationConfig> for FitOptions {
    fn from(cfg: &CalibrationConfig) -> Self {
        Self {
            local_retries: cfg.local_retries,
            local_tolerance: cfg.local_tolerance,
            init_upper: cfg.init_upper,
            local: MinimizerSettings {
                max_iters: cfg.local_max_iters,
                sd_tolerance: cfg.sd_tolerance,
                infeasibility_penalty: cfg.infeasibility_penalty,
            },
            joint: MinimizerSettings {
                max_iters: cfg.joint_max_iters,
                sd_tolerance: cfg.sd_tolerance,
                infeasibility_penalty: cfg.infeasibility_penalty,
            },
            seed: cfg.seed,
        }
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        Self::from(&CalibrationConfig::default())
    }
}

impl FitOptions {
    /// Random source for parameter draws, seeded when a seed is configured.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// Outcome of one minimization, as adopted by a fitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitOutcome {
    /// Objective value at the adopted parameters.
    pub loss: f64,
    pub iterations: u64,
    /// `false` when the minimizer stopped at its iteration cap.
    pub converged: bool,
}

impl From<&Minimum> for FitOutcome {
    fn from(m: &Minimum) -> Self {
        Self {
            loss: m.value,
            iterations: m.iterations,
            converged: m.converged,
        }
    }
}
