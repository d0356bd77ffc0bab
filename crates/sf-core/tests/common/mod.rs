//! Shared fixtures: a four-stage toy chain with a known exact fit.
//!
//! `SICK` leaves to `CURED` with 0.1875 and to `DEAD` with 0.0625 per step,
//! which gives `P(SICK -> DEAD) = 0.25` and an expected stay of 4 steps.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sf_config::Settings;
use sf_core::input::InputData;

pub const TOY_SETTINGS: &str = r#"{
    "chain": {
        "stages": ["START", "SICK", "CURED", "DEAD"],
        "fixed_transitions": [
            {"from": "START", "to": "SICK", "value": 1.0},
            {"from": "CURED", "to": "CURED", "value": 1.0},
            {"from": "DEAD", "to": "DEAD", "value": 1.0}
        ],
        "unknown_transitions": [
            {"from": "SICK", "to": "CURED"},
            {"from": "SICK", "to": "DEAD"}
        ],
        "unit_of_time": 1.0,
        "initial_state": "START",
        "reference_states": [{"stage": "SICK", "label": "S"}],
        "cleared_output_state": "START"
    },
    "calibration": {
        "alphas": [0.99],
        "seed": 7
    }
}"#;

pub const TOY_INPUT: &str = r#"{
    "age_groups": ["young", "old"],
    "probability": [
        {"label": "p_dead", "description": "death given sick", "age": "Age_all",
         "start": "SICK", "stages": "DEAD", "target": 0.25, "weight": 1.0}
    ],
    "duration": [
        {"label": "d_sick", "age": "Age_all", "stages": "SICK",
         "target": 4.0, "weight": 1.0}
    ]
}"#;

pub fn toy_settings() -> Settings {
    Settings::from_str(TOY_SETTINGS).unwrap()
}

pub fn toy_input() -> InputData {
    serde_json::from_str(TOY_INPUT).unwrap()
}

/// Write the toy settings and input into `dir`, returning their paths.
pub fn write_toy_files(dir: &Path) -> (PathBuf, PathBuf) {
    let settings = dir.join("stagefit.json");
    let input = dir.join("input.json");
    std::fs::write(&settings, TOY_SETTINGS).unwrap();
    std::fs::write(&input, TOY_INPUT).unwrap();
    (settings, input)
}
