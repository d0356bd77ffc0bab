//! Calibration (fitting) settings.

use serde::{Deserialize, Serialize};

/// Alpha values swept by a default calibration run.
pub const DEFAULT_ALPHAS: [f64; 6] = [0.98, 0.99, 0.991, 0.992, 0.993, 0.994];

/// Knobs for the per-age and joint fitting procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Randomized restarts per age group in the local phase.
    pub local_retries: usize,

    /// Loss below which the local phase stops retrying an age group.
    pub local_tolerance: f64,

    /// Upper end of the uniform draw used to randomize parameters.
    pub init_upper: f64,

    /// Iteration cap for each per-age minimization.
    pub local_max_iters: u64,

    /// Iteration cap for the joint minimization.
    pub joint_max_iters: u64,

    /// Blending weights to sweep; each produces one result set.
    pub alphas: Vec<f64>,

    /// Euclidean tolerance for distribution convergence.
    pub convergence_tolerance: f64,

    /// Iteration cap for distribution convergence.
    pub convergence_max_iters: usize,

    /// Simplex standard-deviation tolerance of the minimizer.
    pub sd_tolerance: f64,

    /// Weight of the squared distance to the feasible region.
    pub infeasibility_penalty: f64,

    /// Seed for reproducible randomization. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            local_retries: 4,
            local_tolerance: 0.1,
            init_upper: 0.05,
            local_max_iters: 1000,
            joint_max_iters: 300,
            alphas: DEFAULT_ALPHAS.to_vec(),
            convergence_tolerance: 1e-6,
            convergence_max_iters: 5000,
            sd_tolerance: 1e-10,
            infeasibility_penalty: 1e3,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: CalibrationConfig =
            serde_json::from_str(r#"{"local_retries": 2, "seed": 7}"#).unwrap();
        assert_eq!(cfg.local_retries, 2);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.joint_max_iters, 300);
        assert_eq!(cfg.alphas, DEFAULT_ALPHAS.to_vec());
    }
}
