//! Turning a [`ScenarioConfig`] into a ready to run [`Topology`] for one
//! offered traffic.

use crate::config::{GroupConfig, ScenarioConfig, SourceKind};
use serde::Serialize;
use std::{collections::BTreeMap, fmt};
use telesim_core::{
    group::CompressionRatio,
    measure::{Capacity, Count, Intensity, IntensityError, IntensityFactor, Size},
    overflow::{OverflowPolicy, OverflowPolicyParseError},
    source::SourceModel,
    topology::{Topology, TopologyError},
    traffic_class::{TrafficClass, TrafficClassId},
};
use thiserror::Error;
use tracing::{debug, warn};

/// How the offered traffic `A` (Erlangs per resource unit) is split
/// among the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// every group receives `A` per unit of its own capacity, shared by
    /// the sources attached to it
    #[default]
    Group,
    /// the whole topology receives `A` per unit of its total capacity,
    /// shared by the traffic classes
    Global,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("group '{group}': {error}")]
    OverflowPolicy {
        group: String,
        #[source]
        error: OverflowPolicyParseError,
    },
    #[error("group '{0}' has neither capacity nor capacities")]
    MissingCapacity(String),
    #[error("group '{group}' is connected to unknown group '{next}'")]
    UnknownConnection { group: String, next: String },
    #[error("source '{stream}' uses unknown traffic class {tc}")]
    UnknownTrafficClass { stream: String, tc: u64 },
    #[error("source '{stream}' is attached to unknown group '{group}'")]
    UnknownGroup { stream: String, group: String },
    #[error("traffic class {0} has a zero size")]
    ZeroSize(u64),
    #[error("the weights of {0} sum to zero")]
    ZeroWeight(String),
    #[error("invalid intensity: {0}")]
    Intensity(#[from] IntensityError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// A topology prepared for one offered traffic.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    /// offered traffic per resource unit as requested
    pub offered: f64,
    /// offered traffic per resource unit as actually produced by the
    /// sources
    pub a: f64,
    pub topology: Topology,
}

fn model(kind: SourceKind) -> SourceModel {
    match kind {
        SourceKind::Poisson => SourceModel::Poisson,
        SourceKind::Engset { sources } => SourceModel::Engset {
            sources: Count::new(sources),
        },
        SourceKind::Pascal { sources } => SourceModel::Pascal {
            sources: Count::new(sources),
        },
    }
}

fn total_capacity(group: &GroupConfig) -> u64 {
    group.bucket_capacities().unwrap_or_default().iter().sum()
}

/// Build the topology of `config` offering `offered` Erlangs per resource
/// unit, split following `mode`.
///
/// The arrival rate of a traffic class registered in the topology is
/// always the [`LoadMode::Global`] one; in [`LoadMode::Group`] every
/// source overrides it with its own share.
pub fn prepare(config: &ScenarioConfig, offered: f64, mode: LoadMode) -> Result<Scenario, ConfigError> {
    let mut topology = Topology::new();

    let total_capacity_units: u64 = config.groups.values().map(total_capacity).sum();
    let total_weight: f64 = config.traffic_classes.values().map(|tc| tc.weight).sum();
    if total_weight <= 0.0 {
        return Err(ConfigError::ZeroWeight("the traffic classes".to_owned()));
    }

    for (id, tc) in &config.traffic_classes {
        if tc.size == 0 {
            return Err(ConfigError::ZeroSize(*id));
        }
        let lambda = offered * total_capacity_units as f64 * tc.weight / total_weight / tc.size as f64;
        let mut traffic_class = TrafficClass::new(
            TrafficClassId::new(*id),
            Intensity::new(lambda)?,
            Intensity::new(tc.micro)?,
            Size::new(tc.size),
        );
        if let Some(max_path_length) = tc.max_path_length {
            traffic_class = traffic_class.with_max_path_length(max_path_length);
        }
        topology.add_traffic_class(traffic_class)?;
    }

    for (name, group) in &config.groups {
        let capacities = group
            .bucket_capacities()
            .ok_or_else(|| ConfigError::MissingCapacity(name.clone()))?;
        let overflow_policy = match &group.overflow_policy {
            None => OverflowPolicy::default(),
            Some(policy) => policy.parse().map_err(|error| ConfigError::OverflowPolicy {
                group: name.clone(),
                error,
            })?,
        };

        let mut builder = topology
            .new_group(name.clone())
            .set_capacities(capacities.into_iter().map(Capacity::new).collect())
            .set_layer(group.layer)
            .set_overflow_policy(overflow_policy);
        for (tc_id, settings) in &group.traffic_classes {
            let tc_id = TrafficClassId::new(*tc_id);
            if settings.block {
                builder = builder.block_traffic_class(tc_id);
            }
            for ratio in &settings.compression_ratios {
                builder = builder.add_compression_ratio(
                    tc_id,
                    Size::new(ratio.threshold),
                    CompressionRatio {
                        size: Size::new(ratio.size),
                        intensity_factor: IntensityFactor::new(ratio.intensity_factor)?,
                    },
                );
            }
        }
        builder.build()?;
    }

    for (name, group) in &config.groups {
        let Some(from) = topology.group_by_name(name).map(|group| group.id()) else {
            continue;
        };
        for next in &group.connected {
            let Some(to) = topology.group_by_name(next).map(|group| group.id()) else {
                return Err(ConfigError::UnknownConnection {
                    group: name.clone(),
                    next: next.clone(),
                });
            };
            topology.connect_groups(from, to)?;
        }
    }

    let mut weights_per_group: BTreeMap<&str, f64> = BTreeMap::new();
    for (name, source) in &config.sources {
        let tc = config.traffic_classes.get(&source.traffic_class).ok_or_else(|| {
            ConfigError::UnknownTrafficClass {
                stream: name.clone(),
                tc: source.traffic_class,
            }
        })?;
        *weights_per_group.entry(source.attached.as_str()).or_default() += tc.weight;
    }

    let mut a = 0.0;
    for (name, source) in &config.sources {
        let (Some(group_config), Some(group)) = (
            config.groups.get(&source.attached),
            topology.group_by_name(&source.attached).map(|group| group.id()),
        ) else {
            return Err(ConfigError::UnknownGroup {
                stream: name.clone(),
                group: source.attached.clone(),
            });
        };
        let tc_config = &config.traffic_classes[&source.traffic_class];
        let tc_id = TrafficClassId::new(source.traffic_class);

        let (lambda, intensity) = match mode {
            LoadMode::Global => {
                let lambda = offered * total_capacity_units as f64 * tc_config.weight
                    / total_weight
                    / tc_config.size as f64;
                (lambda, None)
            }
            LoadMode::Group => {
                let weights = weights_per_group[source.attached.as_str()];
                if weights <= 0.0 {
                    return Err(ConfigError::ZeroWeight(format!("group '{}'", source.attached)));
                }
                let lambda = offered
                    * group_config.intensity_multiplier
                    * total_capacity(group_config) as f64
                    * tc_config.weight
                    / weights
                    / tc_config.size as f64;
                // a group without capacity (or with a zero multiplier) is offered nothing
                if lambda <= 0.0 {
                    warn!(
                        source = %name,
                        group = %source.attached,
                        "no traffic offered, source skipped"
                    );
                    continue;
                }
                (lambda, Some(Intensity::new(lambda)?))
            }
        };
        debug!(source = %name, tc = %tc_id, lambda, "offered intensity");

        let mut builder = topology
            .new_source(name.clone(), tc_id, model(source.kind))
            .attach(group);
        if let Some(intensity) = intensity {
            builder = builder.set_intensity(intensity);
        }
        builder.build()?;

        if total_capacity_units > 0 {
            a += lambda / tc_config.micro * tc_config.size as f64 / total_capacity_units as f64;
        }
    }

    Ok(Scenario {
        name: format!("{} A={offered}", config.name),
        offered,
        a,
        topology,
    })
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => f.write_str("group"),
            Self::Global => f.write_str("global"),
        }
    }
}
