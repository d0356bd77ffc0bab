//! stagefit CLI entry point.
//!
//! Without a subcommand, calibrates every age group for each requested alpha
//! and writes one result set per alpha.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sf_config::{Settings, SettingsPath, SettingsSnapshot};
use sf_core::error::{Error, OutputError};
use sf_core::exit_codes::ExitCode;
use sf_core::input::InputData;
use sf_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use sf_core::output::{render_table, OutputFormat, ParameterFile};
use sf_core::run::{
    run_alpha_sweep, simulate_group, tables_from_parameters, SimulationRequest, SweepRequest,
};

#[derive(Parser, Debug)]
#[command(name = "stagefit")]
#[command(author, version, about = "Markov-chain disease stage calibration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    fit: FitArgs,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Options shared by every command.
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Settings file (chain layout and calibration knobs)
    #[arg(long, short = 'c', global = true, env = "STAGEFIT_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

/// Calibration run (the default command).
#[derive(Args, Debug)]
struct FitArgs {
    /// Input JSON file, or a directory with age_groups.csv, probability.csv
    /// and duration.csv
    #[arg(short, long = "input", default_value = "transitions-input.json")]
    input: PathBuf,

    /// Output path prefix; `-{alpha}` and the extension are appended
    #[arg(short, long, default_value = "test")]
    output: PathBuf,

    /// Result table format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    suffix: OutputFormat,

    /// Blending weights to sweep (defaults to the settings file's list)
    #[arg(short, long, num_args = 1..)]
    alpha: Option<Vec<f64>>,

    /// Seed for reproducible parameter draws
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print transition and summary tables for a stored parameter file
    Summary(SummaryArgs),
    /// Sample paths through one age group's fitted chain
    Simulate(SimulateArgs),
    /// Print the resolved settings and where they came from
    Config,
}

#[derive(Args, Debug)]
struct SummaryArgs {
    /// `*-parameters.json` file written by a calibration run
    #[arg(short, long)]
    parameters: PathBuf,

    /// Table format on stdout
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    suffix: OutputFormat,

    /// Print only the per-stage summary table
    #[arg(long)]
    summary_only: bool,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// `*-parameters.json` file written by a calibration run
    #[arg(short, long)]
    parameters: PathBuf,

    /// Age group to simulate
    #[arg(long)]
    age: String,

    /// Number of sample paths
    #[arg(long, default_value_t = 10)]
    runs: usize,

    /// Longest path kept, in states
    #[arg(long, default_value_t = 10_000)]
    max_steps: usize,

    #[arg(long)]
    seed: Option<u64>,

    /// Emit JSON instead of one line per path
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Success
            };
            let _ = e.print();
            std::process::exit(code.as_i32());
        }
    };

    let level = LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet);
    let log_config = LogConfig::from_env(
        (cli.global.verbose > 0 || cli.global.quiet).then_some(level),
        cli.global.log_format,
    );
    init_logging(&log_config);

    let result = match &cli.command {
        None => run_fit(&cli.global, &cli.fit),
        Some(Commands::Summary(args)) => run_summary(&cli.global, args),
        Some(Commands::Simulate(args)) => run_simulate(&cli.global, args),
        Some(Commands::Config) => run_config(&cli.global),
    };

    let code = match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            let code = ExitCode::from(&e);
            tracing::error!(code = code.code_name(), "{}", e);
            eprintln!("stagefit: {}", e);
            code
        }
    };
    std::process::exit(code.as_i32());
}

fn load_settings(global: &GlobalOpts) -> Result<(Settings, SettingsPath), Error> {
    let (settings, path) = Settings::load(global.config.as_deref())?;
    tracing::debug!(source = %path.source, "settings loaded");
    Ok((settings, path))
}

fn run_fit(global: &GlobalOpts, args: &FitArgs) -> Result<(), Error> {
    let (mut settings, settings_path) = load_settings(global)?;
    if args.seed.is_some() {
        settings.calibration.seed = args.seed;
    }
    if let Some(alphas) = &args.alpha {
        settings.calibration.alphas = alphas.clone();
    }
    let snapshot = SettingsSnapshot::new(&settings, &settings_path);
    let run_id = generate_run_id();
    let input = InputData::load(&args.input)?;

    let request = SweepRequest {
        output: &args.output,
        format: args.suffix,
        alphas: &settings.calibration.alphas,
        run_id: &run_id,
        snapshot: Some(&snapshot),
    };
    let results = run_alpha_sweep(&input, &settings, request, |report| {
        print!("{}", report);
    })?;

    for r in &results {
        tracing::info!(
            alpha = r.alpha,
            objective = r.objective,
            transitions = %r.paths.transitions.display(),
            "result set"
        );
    }
    Ok(())
}

fn run_summary(global: &GlobalOpts, args: &SummaryArgs) -> Result<(), Error> {
    let (settings, _) = load_settings(global)?;
    let layout = settings.chain.layout()?;
    let params = ParameterFile::load(&args.parameters)?;
    let (transitions, summary) = tables_from_parameters(&params, &layout)?;

    let stdout = std::io::stdout();
    let origin = Path::new("<stdout>");
    if !args.summary_only {
        render_table(&transitions, args.suffix, stdout.lock(), origin)?;
        writeln!(stdout.lock()).map_err(|e| stdout_error(origin, e))?;
    }
    render_table(&summary, args.suffix, stdout.lock(), origin)?;
    Ok(())
}

fn run_simulate(global: &GlobalOpts, args: &SimulateArgs) -> Result<(), Error> {
    let (settings, _) = load_settings(global)?;
    let layout = settings.chain.layout()?;
    let params = ParameterFile::load(&args.parameters)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let request = SimulationRequest {
        age: &args.age,
        runs: args.runs,
        max_steps: args.max_steps,
        tolerance: settings.calibration.convergence_tolerance,
        max_iterations: settings.calibration.convergence_max_iters,
    };
    let sim = simulate_group(&params, &layout, &request, &mut rng)?;

    let origin = Path::new("<stdout>");
    let mut out = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &sim).map_err(|e| {
            Error::Output(OutputError::Json {
                path: origin.to_path_buf(),
                source: e,
            })
        })?;
        writeln!(out).map_err(|e| stdout_error(origin, e))?;
    } else {
        for path in &sim.paths {
            writeln!(out, "{}", path.join(" -> ")).map_err(|e| stdout_error(origin, e))?;
        }
        for (stage, count) in &sim.endings {
            writeln!(out, "{}: {}", stage, count).map_err(|e| stdout_error(origin, e))?;
        }
        for (stage, p) in sim.limit.iter().filter(|(_, &p)| p > 0.0) {
            writeln!(out, "limit {}: {:.6}", stage, p).map_err(|e| stdout_error(origin, e))?;
        }
        if sim.truncated > 0 {
            writeln!(out, "truncated: {}", sim.truncated).map_err(|e| stdout_error(origin, e))?;
        }
    }
    Ok(())
}

fn run_config(global: &GlobalOpts) -> Result<(), Error> {
    let (settings, path) = load_settings(global)?;
    match &path.path {
        Some(p) => tracing::info!(source = %path.source, path = %p.display(), "resolved settings"),
        None => tracing::info!(source = %path.source, "resolved settings"),
    }
    let origin = Path::new("<stdout>");
    writeln!(std::io::stdout().lock(), "{}", settings.to_json()).map_err(|e| stdout_error(origin, e))
}

fn stdout_error(origin: &Path, e: std::io::Error) -> Error {
    Error::Output(OutputError::Io {
        path: origin.to_path_buf(),
        source: e,
    })
}
