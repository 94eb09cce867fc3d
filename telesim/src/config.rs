//! Scenario files.
//!
//! A scenario file describes a topology independently of the offered
//! traffic: traffic classes carry a service rate and a weight, the
//! arrival rates are computed when the scenario is prepared for a given
//! load (see [`prepare`](crate::scenario::prepare)).
//!
//! ```json
//! {
//!   "name": "two groups",
//!   "traffic_classes": { "1": { "micro": 1.0, "size": 1, "weight": 1.0 } },
//!   "sources": {
//!     "calls": { "type": "poisson", "traffic_class": 1, "attached": "primary" }
//!   },
//!   "groups": {
//!     "primary": { "capacity": 10, "connected": ["secondary"],
//!                  "overflow_policy": "always_first" },
//!     "secondary": { "capacity": 20, "layer": 1 }
//!   }
//! }
//! ```

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    /// keyed by traffic class id
    pub traffic_classes: BTreeMap<u64, TrafficClassConfig>,
    /// keyed by source name
    pub sources: BTreeMap<String, SourceConfig>,
    /// keyed by group name
    pub groups: BTreeMap<String, GroupConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficClassConfig {
    /// service rate (μ)
    pub micro: f64,
    pub size: u64,
    /// share of the offered traffic
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_path_length: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceKind {
    Poisson,
    Engset {
        #[serde(rename = "N")]
        sources: u64,
    },
    Pascal {
        #[serde(rename = "S")]
        sources: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(flatten)]
    pub kind: SourceKind,
    pub traffic_class: u64,
    /// name of the target group
    pub attached: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// single bucket capacity, exclusive with `capacities`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacities: Option<Vec<u64>>,
    #[serde(default)]
    pub layer: u64,
    /// names of the downstream groups
    #[serde(default)]
    pub connected: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow_policy: Option<String>,
    #[serde(default = "default_intensity_multiplier")]
    pub intensity_multiplier: f64,
    /// keyed by traffic class id
    #[serde(default)]
    pub traffic_classes: BTreeMap<u64, GroupTrafficClassConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupTrafficClassConfig {
    #[serde(default)]
    pub block: bool,
    #[serde(default)]
    pub compression_ratios: Vec<CompressionRatioConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionRatioConfig {
    pub threshold: u64,
    pub size: u64,
    pub intensity_factor: f64,
}

fn default_intensity_multiplier() -> f64 {
    1.0
}

impl ScenarioConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse scenario")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid scenario file {}", path.display()))
    }
}

impl GroupConfig {
    /// the capacity of every bucket, `None` when neither `capacity` nor
    /// `capacities` is set
    pub fn bucket_capacities(&self) -> Option<Vec<u64>> {
        match (&self.capacities, self.capacity) {
            (Some(capacities), _) => Some(capacities.clone()),
            (None, Some(capacity)) => Some(vec![capacity]),
            (None, None) => None,
        }
    }
}
