//! Command line front end: runs a batch of scenario files and prints the
//! JSON reports.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::{
    fs::File,
    io::{self, BufWriter, Write as _},
    path::PathBuf,
};
use telesim::{
    batch::{self, BatchSettings, Mode, ScenarioFile},
    LoadMode, LoadRange, ScenarioConfig,
};
use telesim_core::measure::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "telesim",
    about = "Discrete event simulation of loss networks with overflow",
    version
)]
struct Cli {
    /// Scenario files to run
    #[arg(long = "scenario-file", value_name = "FILE", required = true, num_args = 1..)]
    scenario_files: Vec<PathBuf>,

    /// Simulated duration of every run
    #[arg(long, default_value = "10000")]
    duration: Duration,

    /// Offered traffic per capacity unit: `A` or `start..stop:step`
    #[arg(long, value_name = "RANGE", default_value = "1.0")]
    load: LoadRange,

    /// How the offered traffic is spread over the groups
    #[arg(long, value_enum, default_value_t = LoadMode::Group)]
    load_mode: LoadMode,

    /// Computations to run, may be repeated
    #[arg(long, value_enum, default_values_t = [Mode::Simulation])]
    mode: Vec<Mode>,

    /// Seed of the first repetition
    #[arg(long, default_value_t = telesim_core::defaults::DEFAULT_SEED)]
    seed: u64,

    /// Draw the seed of the first repetition at random
    #[arg(long, conflicts_with = "seed")]
    use_random_seed: bool,

    /// Simulated repetitions of every point
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Run the jobs on a thread pool
    #[arg(long)]
    parallel: bool,

    /// Only log warnings and hide the progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Write the reports to this file instead of the standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let files = cli
        .scenario_files
        .iter()
        .map(|path| {
            Ok(ScenarioFile {
                path: path.clone(),
                config: ScenarioConfig::load(path)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let seed = if cli.use_random_seed {
        rand::random()
    } else {
        cli.seed
    };
    let settings = BatchSettings {
        duration: cli.duration,
        load_mode: cli.load_mode,
        loads: cli.load,
        modes: cli.mode,
        seed,
        count: cli.count,
        parallel: cli.parallel,
        quiet: cli.quiet,
    };
    info!(
        files = files.len(),
        load = %settings.loads,
        load_mode = %settings.load_mode,
        seed,
        "running"
    );

    let reports = batch::run(&files, &settings);
    let failed = reports.iter().filter(|report| report.error.is_some()).count();

    let mut out: Box<dyn io::Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    serde_json::to_writer_pretty(&mut out, &reports).context("Failed to write the reports")?;
    writeln!(out)?;
    out.flush()?;

    anyhow::ensure!(failed == 0, "{failed} of {} jobs failed", reports.len());
    Ok(())
}
