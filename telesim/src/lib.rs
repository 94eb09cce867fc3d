/*!
# Teletraffic Network Simulator

Scenario files, offered traffic sweeps and batch runs on top of the
[`telesim_core`] engine.

A batch runs every scenario file at every offered traffic of a
[`LoadRange`], either simulated ([`Mode::Simulation`]) or evaluated with
the Kaufman–Roberts recursion ([`Mode::Analytic`]), and collects one
serialisable [`JobReport`] per run.

```no_run
use telesim::{batch, BatchSettings, ScenarioConfig, ScenarioFile};

# fn main() -> anyhow::Result<()> {
let files = vec![ScenarioFile {
    path: "scenario.json".into(),
    config: ScenarioConfig::load("scenario.json")?,
}];
let settings = BatchSettings {
    loads: "0.5..1.5:0.25".parse()?,
    ..BatchSettings::default()
};
let reports = batch::run(&files, &settings);
println!("{}", serde_json::to_string_pretty(&reports)?);
# Ok(())
# }
```
*/

pub mod batch;
pub mod config;
pub mod report;
pub mod scenario;
pub mod sweep;

pub use self::{
    batch::{BatchSettings, JobReport, Mode, ScenarioFile},
    config::ScenarioConfig,
    report::{AnalyticReport, ScenarioReport},
    scenario::{prepare, ConfigError, LoadMode, Scenario},
    sweep::LoadRange,
};

// convenient re-export of the engine
pub use telesim_core::{Stats, World, WorldConfig};
