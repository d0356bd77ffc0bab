//! End-to-end calibration runs and re-evaluation of stored parameters.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use serde::Serialize;
use sf_config::validate::validate_unit_interval;
use sf_config::{ChainLayout, Settings, SettingsSnapshot};

use crate::builder::MatrixBuilder;
use crate::chain::{point_mass, Chain};
use crate::error::{Error, InputError, Result};
use crate::fit::{FitOptions, JointFitter, JointReport};
use crate::input::InputData;
use crate::output::{
    write_results, OutputFormat, ParameterFile, ResultPaths, SummaryTable, TransitionTable,
};

/// Where and how a sweep writes its results.
#[derive(Debug, Clone, Copy)]
pub struct SweepRequest<'a> {
    /// Path prefix; each alpha appends `-{alpha}`.
    pub output: &'a Path,
    pub format: OutputFormat,
    pub alphas: &'a [f64],
    pub run_id: &'a str,
    pub snapshot: Option<&'a SettingsSnapshot>,
}

/// Headline figures of one alpha.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub alpha: f64,
    pub total_loss: f64,
    pub deviation: f64,
    pub objective: f64,
    pub paths: ResultPaths,
}

/// Calibrate all age groups once per alpha and write each result set.
///
/// The joint fitter and its random source are built once and every alpha
/// reruns both phases, the local phase from fresh draws. `on_report` sees
/// every report before its files are written.
pub fn run_alpha_sweep<F>(
    input: &InputData,
    settings: &Settings,
    request: SweepRequest<'_>,
    mut on_report: F,
) -> Result<Vec<SweepResult>>
where
    F: FnMut(&JointReport),
{
    let Some(&first_alpha) = request.alphas.first() else {
        return Ok(Vec::new());
    };
    for (i, &alpha) in request.alphas.iter().enumerate() {
        validate_unit_interval(&format!("alpha[{}]", i), alpha)?;
    }

    let layout = settings.chain.layout()?;
    let groups = input.groups(&layout)?;
    let builder = MatrixBuilder::new(layout);
    let options = FitOptions::from(&settings.calibration);
    let mut joint = JointFitter::from_groups(&builder, groups, first_alpha, options)?;

    tracing::info!(
        run_id = request.run_id,
        age_groups = joint.fitters().len(),
        parameters = joint.parameters().len(),
        alphas = request.alphas.len(),
        "calibration started"
    );

    let mut results = Vec::with_capacity(request.alphas.len());
    for &alpha in request.alphas {
        joint.set_alpha(alpha);
        let outcome = joint.optimize()?;
        let report = joint.report()?;
        tracing::info!(
            alpha,
            objective = report.objective,
            total_loss = report.total_loss,
            deviation = report.deviation,
            joint_iterations = outcome.global.iterations,
            "alpha calibrated"
        );
        on_report(&report);

        let paths = write_results(
            &joint,
            &report,
            request.output,
            request.format,
            request.run_id,
            request.snapshot,
        )?;
        results.push(SweepResult {
            alpha,
            total_loss: report.total_loss,
            deviation: report.deviation,
            objective: report.objective,
            paths,
        });
    }
    Ok(results)
}

/// Rebuild each age group's chain from a parameter file.
pub fn chains_from_parameters(
    params: &ParameterFile,
    layout: &ChainLayout,
) -> Result<Vec<(String, Chain)>> {
    params.check(layout)?;
    let builder = MatrixBuilder::new(layout.clone());
    params
        .groups
        .iter()
        .map(|g| -> Result<(String, Chain)> {
            let matrix = builder.build(&g.parameters)?;
            Ok((g.age.clone(), Chain::new(matrix, layout.unit_of_time())?))
        })
        .collect()
}

/// Transition and summary tables for stored parameters.
pub fn tables_from_parameters(
    params: &ParameterFile,
    layout: &ChainLayout,
) -> Result<(TransitionTable, SummaryTable)> {
    let chains = chains_from_parameters(params, layout)?;
    let mut transitions = TransitionTable::new(layout.stages().to_vec());
    let mut summary = SummaryTable::new(layout);
    for (age, chain) in &chains {
        transitions.push_chain(age, chain);
        summary.push_chain(age, chain, layout)?;
    }
    Ok((transitions.pre_save(layout), summary))
}

/// What [`simulate_group`] samples.
#[derive(Debug, Clone, Copy)]
pub struct SimulationRequest<'a> {
    pub age: &'a str,
    pub runs: usize,
    /// Longest path kept, in states.
    pub max_steps: usize,
    /// Tolerance and step cap of the limit-distribution iteration.
    pub tolerance: f64,
    pub max_iterations: usize,
}

/// Sample paths and limit distribution of one age group's chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub age: String,
    pub start: String,
    /// Every path as stage names, capped at `max_steps` states.
    pub paths: Vec<Vec<String>>,
    /// How many paths ended in each stage.
    pub endings: BTreeMap<String, usize>,
    /// Paths cut off before reaching an absorbing stage.
    pub truncated: usize,
    /// Distribution reached from the start stage, by stage name.
    pub limit: BTreeMap<String, f64>,
    pub limit_converged: bool,
}

/// Walk sample paths from the layout's initial stage and iterate its
/// distribution towards the limit.
pub fn simulate_group<R: Rng>(
    params: &ParameterFile,
    layout: &ChainLayout,
    request: &SimulationRequest<'_>,
    rng: &mut R,
) -> Result<SimulationSummary> {
    let age = request.age;
    let chains = chains_from_parameters(params, layout)?;
    let (_, chain) = chains
        .into_iter()
        .find(|(a, _)| a == age)
        .ok_or_else(|| Error::Input(InputError::UnknownAgeGroup(age.to_string())))?;

    let start = layout.initial_state();
    let name = |s: usize| layout.stage_name(s).unwrap_or_default().to_string();

    let trace = chain.convergence(
        &point_mass(chain.num_states(), start),
        request.tolerance,
        request.max_iterations,
    )?;
    let limit = trace
        .last()
        .iter()
        .enumerate()
        .map(|(s, &p)| (name(s), p))
        .collect();

    let mut summary = SimulationSummary {
        age: age.to_string(),
        start: name(start),
        paths: Vec::with_capacity(request.runs),
        endings: BTreeMap::new(),
        truncated: 0,
        limit,
        limit_converged: trace.converged,
    };
    for _ in 0..request.runs {
        let path: Vec<usize> = chain
            .simulate(start, &mut *rng)?
            .take(request.max_steps)
            .collect();
        if let Some(&last) = path.last() {
            if chain.is_absorbing(last) {
                *summary.endings.entry(name(last)).or_default() += 1;
            } else {
                summary.truncated += 1;
            }
        }
        summary.paths.push(path.into_iter().map(name).collect());
    }
    tracing::debug!(
        age,
        runs = request.runs,
        truncated = summary.truncated,
        limit_steps = trace.steps(),
        "simulation finished"
    );
    Ok(summary)
}
