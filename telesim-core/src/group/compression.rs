use crate::measure::{IntensityFactor, Size};
use std::collections::{BTreeMap, btree_map::Entry};

/// Substitute demand of a compressed load: the load is admitted with
/// `size` units and served `intensity_factor` times as fast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionRatio {
    pub size: Size,
    pub intensity_factor: IntensityFactor,
}

/// Compression ratios of one traffic class at one group, keyed by the
/// bucket occupancy from which they apply.
///
/// When several thresholds are crossed the highest one wins. The first
/// ratio registered at a threshold is kept, later ones are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressionLadder(BTreeMap<Size, CompressionRatio>);

impl CompressionLadder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a ratio was already registered at `threshold`,
    /// the ladder is then left unchanged.
    pub fn insert(&mut self, threshold: Size, ratio: CompressionRatio) -> bool {
        match self.0.entry(threshold) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(ratio);
                true
            }
        }
    }

    /// The ratio of the highest threshold not above `occupied`.
    pub fn select(&self, occupied: Size) -> Option<&CompressionRatio> {
        self.0.range(..=occupied).next_back().map(|(_, ratio)| ratio)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Size, &CompressionRatio)> {
        self.0.iter().map(|(threshold, ratio)| (*threshold, ratio))
    }
}
