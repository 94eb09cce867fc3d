//! Independent runs of scenarios, sequential or on a thread pool.

use crate::{
    config::ScenarioConfig,
    report::{AnalyticReport, ScenarioReport},
    scenario::{prepare, LoadMode},
    sweep::LoadRange,
};
use anyhow::{Context as _, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::{fmt, path::PathBuf};
use telesim_core::{
    measure::Duration,
    world::{World, WorldConfig},
};
use tracing::{info, warn};

/// What a job computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// run the event loop
    Simulation,
    /// evaluate the closed-form models
    Analytic,
}

/// A scenario file, already parsed.
#[derive(Debug, Clone)]
pub struct ScenarioFile {
    pub path: PathBuf,
    pub config: ScenarioConfig,
}

/// Settings shared by every job of a batch.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub duration: Duration,
    pub load_mode: LoadMode,
    pub loads: LoadRange,
    pub modes: Vec<Mode>,
    pub seed: u64,
    /// simulated repetitions of every point, the i-th using `seed + i`
    pub count: usize,
    pub parallel: bool,
    pub quiet: bool,
}

/// One unit of work: a scenario file at one offered traffic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Job {
    /// index in the batch's scenario files
    #[serde(skip)]
    pub file: usize,
    #[serde(rename = "A")]
    pub offered: f64,
    pub mode: Mode,
    pub seed: u64,
    pub repetition: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Simulation(ScenarioReport),
    Analytic(AnalyticReport),
}

/// A job and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub scenario_file: PathBuf,
    #[serde(flatten)]
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            duration: telesim_core::defaults::DEFAULT_DURATION,
            load_mode: LoadMode::default(),
            loads: LoadRange::default(),
            modes: vec![Mode::Simulation],
            seed: telesim_core::defaults::DEFAULT_SEED,
            count: 1,
            parallel: false,
            quiet: false,
        }
    }
}

impl BatchSettings {
    /// Every (file, load, mode, repetition) combination. Analytic jobs
    /// are deterministic and never repeated.
    pub fn jobs(&self, files: usize) -> Vec<Job> {
        let mut jobs = Vec::new();
        for file in 0..files {
            for offered in self.loads.iter() {
                for mode in &self.modes {
                    let repetitions = match mode {
                        Mode::Simulation => self.count.max(1),
                        Mode::Analytic => 1,
                    };
                    for repetition in 0..repetitions {
                        jobs.push(Job {
                            file,
                            offered,
                            mode: *mode,
                            seed: self.seed.wrapping_add(repetition as u64),
                            repetition,
                        });
                    }
                }
            }
        }
        jobs
    }
}

fn run_job(file: &ScenarioFile, job: &Job, settings: &BatchSettings) -> Result<Outcome> {
    let scenario = prepare(&file.config, job.offered, settings.load_mode)
        .with_context(|| format!("Failed to prepare {}", file.path.display()))?;

    match job.mode {
        Mode::Simulation => {
            let config = WorldConfig {
                seed: job.seed,
                duration: settings.duration,
                ..WorldConfig::default()
            };
            let mut world = World::new(scenario.topology.clone(), config);
            let stats = world
                .run(settings.quiet || settings.parallel)
                .with_context(|| format!("Simulation of {} failed", scenario.name))?;
            Ok(Outcome::Simulation(ScenarioReport::new(&scenario, job.seed, &stats)?))
        }
        Mode::Analytic => Ok(Outcome::Analytic(AnalyticReport::new(&scenario)?)),
    }
}

fn report(files: &[ScenarioFile], job: Job, settings: &BatchSettings) -> JobReport {
    let file = &files[job.file];
    let (result, error) = match run_job(file, &job, settings) {
        Ok(outcome) => (Some(outcome), None),
        Err(error) => {
            warn!(file = %file.path.display(), job = %job, "{error:#}");
            (None, Some(format!("{error:#}")))
        }
    };
    JobReport {
        scenario_file: file.path.clone(),
        job,
        result,
        error,
    }
}

/// Run every job of the batch. A failing job is reported with its error
/// and does not stop the others.
pub fn run(files: &[ScenarioFile], settings: &BatchSettings) -> Vec<JobReport> {
    let jobs = settings.jobs(files.len());
    info!(jobs = jobs.len(), parallel = settings.parallel, "starting batch");

    let pb = if settings.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(jobs.len() as u64)
    };

    let reports: Vec<JobReport> = if settings.parallel {
        jobs.into_par_iter()
            .map(|job| {
                let report = report(files, job, settings);
                pb.inc(1);
                report
            })
            .collect()
    } else {
        jobs.into_iter()
            .map(|job| {
                let report = report(files, job, settings);
                pb.inc(1);
                report
            })
            .collect()
    };

    pb.finish_with_message("All jobs done");
    reports
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simulation => f.write_str("simulation"),
            Self::Analytic => f.write_str("analytic"),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} A={} seed={} #{}]",
            self.mode, self.offered, self.seed, self.repetition
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::TWO_GROUPS;

    fn files() -> Vec<ScenarioFile> {
        vec![ScenarioFile {
            path: PathBuf::from("two_groups.json"),
            config: ScenarioConfig::from_json(TWO_GROUPS).unwrap(),
        }]
    }

    fn settings() -> BatchSettings {
        BatchSettings {
            duration: Duration::new(100.0),
            loads: "0.5..1:0.5".parse().unwrap(),
            quiet: true,
            ..BatchSettings::default()
        }
    }

    #[test]
    fn jobs_cover_every_combination() {
        let settings = BatchSettings {
            modes: vec![Mode::Simulation, Mode::Analytic],
            count: 3,
            seed: 10,
            ..settings()
        };
        let jobs = settings.jobs(2);
        // 2 files x 2 loads x (3 simulations + 1 analytic)
        assert_eq!(jobs.len(), 16);
        let seeds: Vec<u64> = jobs
            .iter()
            .filter(|job| job.file == 0 && job.offered == 0.5 && job.mode == Mode::Simulation)
            .map(|job| job.seed)
            .collect();
        assert_eq!(seeds, vec![10, 11, 12]);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let files = files();
        let sequential = run(&files, &settings());
        let parallel = run(
            &files,
            &BatchSettings {
                parallel: true,
                ..settings()
            },
        );
        assert_eq!(sequential.len(), 2);
        assert_eq!(sequential, parallel);
        assert!(sequential.iter().all(|report| report.error.is_none()));
    }

    #[test]
    fn failing_job_does_not_stop_the_batch() {
        let mut files = files();
        let mut broken = files[0].clone();
        broken.path = PathBuf::from("broken.json");
        broken.config.groups.get_mut("primary").unwrap().overflow_policy =
            Some("cheapest".to_owned());
        files.push(broken);

        let reports = run(&files, &settings());
        assert_eq!(reports.len(), 4);
        let failed: Vec<_> = reports.iter().filter(|report| report.error.is_some()).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|report| report.scenario_file == PathBuf::from("broken.json")));
        assert!(failed[0].error.as_deref().unwrap_or_default().contains("cheapest"));
    }

    #[test]
    fn job_report_json() {
        let reports = run(&files(), &settings());
        let json = serde_json::to_value(&reports[0]).unwrap();
        assert_eq!(json["A"], 0.5);
        assert_eq!(json["mode"], "simulation");
        assert!(json.get("error").is_none());
        assert!(json["result"]["groups"]["primary"].is_object());
    }
}
