//! Serialisable results of the jobs.

use crate::scenario::Scenario;
use serde::Serialize;
use std::collections::BTreeMap;
use telesim_core::{
    analytic::kaufman_roberts_blocking,
    measure::{Capacity, ProbabilityError, Size},
    stats::{LostServedStats, Stats, TrafficClassStats},
    traffic_class::TrafficClassId,
};

/// Counters of the loads offered to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadsReport {
    pub served: u64,
    pub lost: u64,
    pub forwarded: u64,
    pub served_u: u64,
    pub lost_u: u64,
    pub forwarded_u: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassReport {
    #[serde(flatten)]
    pub loads: LoadsReport,
    pub block_time: f64,
    pub block_recursive_time: f64,
    pub simulation_time: f64,
    #[serde(rename = "P_loss")]
    pub p_loss: f64,
    #[serde(rename = "P_loss_u")]
    pub p_loss_u: f64,
    #[serde(rename = "P_forward")]
    pub p_forward: f64,
    #[serde(rename = "P_forward_u")]
    pub p_forward_u: f64,
    #[serde(rename = "P_block")]
    pub p_block: f64,
    #[serde(rename = "P_block_recursive")]
    pub p_block_recursive: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub layer: u64,
    pub capacities: Vec<u64>,
    pub total: LoadsReport,
    /// keyed by traffic class id
    pub traffic_classes: BTreeMap<u64, ClassReport>,
}

/// Outcome of one simulated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    #[serde(rename = "A")]
    pub offered: f64,
    pub a: f64,
    pub seed: u64,
    /// simulation clock at the end of the run
    pub time: f64,
    /// loads produced, keyed by traffic class id
    pub produced: BTreeMap<u64, u64>,
    /// counters summed over every group, keyed by traffic class id
    pub traffic_classes: BTreeMap<u64, LoadsReport>,
    pub groups: BTreeMap<String, GroupReport>,
}

/// Kaufman–Roberts blocking of every group for the traffic offered
/// directly to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticReport {
    pub name: String,
    #[serde(rename = "A")]
    pub offered: f64,
    pub a: f64,
    /// `P_block` keyed by group name then traffic class id
    pub groups: BTreeMap<String, BTreeMap<u64, f64>>,
}

impl From<LostServedStats> for LoadsReport {
    fn from(stats: LostServedStats) -> Self {
        Self {
            served: stats.served.count.into_u64(),
            lost: stats.lost.count.into_u64(),
            forwarded: stats.forwarded.count.into_u64(),
            served_u: stats.served.size.into_u64(),
            lost_u: stats.lost.size.into_u64(),
            forwarded_u: stats.forwarded.size.into_u64(),
        }
    }
}

impl ClassReport {
    pub fn new(stats: &TrafficClassStats) -> Result<Self, ProbabilityError> {
        Ok(Self {
            loads: stats.lost_served.into(),
            block_time: stats.block_time.into_f64(),
            block_recursive_time: stats.block_recursive_time.into_f64(),
            simulation_time: stats.simulation_time.into_f64(),
            p_loss: stats.loss_ratio()?.value(),
            p_loss_u: stats.loss_ratio_u()?.value(),
            p_forward: stats.forward_ratio()?.value(),
            p_forward_u: stats.forward_ratio_u()?.value(),
            p_block: stats.block_ratio()?.value(),
            p_block_recursive: stats.block_recursive_ratio()?.value(),
        })
    }
}

impl ScenarioReport {
    pub fn new(scenario: &Scenario, seed: u64, stats: &Stats) -> Result<Self, ProbabilityError> {
        let mut groups = BTreeMap::new();
        for group in &stats.groups {
            let mut traffic_classes = BTreeMap::new();
            for (tc_id, tc_stats) in &group.by_traffic_class {
                traffic_classes.insert(tc_id.into_u64(), ClassReport::new(tc_stats)?);
            }
            groups.insert(
                group.name.clone(),
                GroupReport {
                    layer: group.layer,
                    capacities: group.capacities.iter().map(|c| c.into_u64()).collect(),
                    total: group.total.into(),
                    traffic_classes,
                },
            );
        }

        let produced = scenario
            .topology
            .traffic_classes()
            .ids()
            .map(|tc_id| (tc_id.into_u64(), stats.produced(tc_id).into_u64()))
            .collect();
        let traffic_classes = stats
            .by_traffic_class()
            .into_iter()
            .map(|(tc_id, lost_served)| (tc_id.into_u64(), lost_served.into()))
            .collect();

        Ok(Self {
            name: scenario.name.clone(),
            offered: scenario.offered,
            a: scenario.a,
            seed,
            time: stats.time.into_f64(),
            produced,
            traffic_classes,
            groups,
        })
    }
}

impl AnalyticReport {
    pub fn new(scenario: &Scenario) -> Result<Self, ProbabilityError> {
        let topology = &scenario.topology;
        let mut groups = BTreeMap::new();

        for group in topology.groups() {
            // offered traffic (Erlangs) and size of every class sourced here
            let mut offered: BTreeMap<TrafficClassId, (f64, Size)> = BTreeMap::new();
            for source in topology.sources().iter().filter(|s| s.target_group() == group.id()) {
                let tc = source.traffic_class();
                let entry = offered.entry(tc.id).or_insert((0.0, tc.size));
                entry.0 += tc.offered_traffic();
            }

            let classes: Vec<(f64, Size)> = offered.values().copied().collect();
            let capacity: Capacity = group.capacities().iter().copied().sum();
            let blocking = kaufman_roberts_blocking(capacity, &classes)?;
            let by_class = offered
                .keys()
                .zip(blocking)
                .map(|(tc_id, p)| (tc_id.into_u64(), p.value()))
                .collect();
            groups.insert(group.name().to_owned(), by_class);
        }

        Ok(Self {
            name: scenario.name.clone(),
            offered: scenario.offered,
            a: scenario.a,
            groups,
        })
    }
}
