mod compression;

pub use self::compression::{CompressionLadder, CompressionRatio};
use crate::{
    id::GroupId,
    load::Load,
    measure::{Capacity, IntensityFactor, Size},
    overflow::OverflowPolicy,
    stats::GroupStatistics,
    traffic_class::{TrafficClass, TrafficClassId},
    world::SimulationError,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// A capacity-limited resource node (e.g. a trunk group).
///
/// The capacity may be split in several independently tracked buckets;
/// a load always occupies a single bucket. Groups live in the arena of
/// a [`Topology`] and are created through [`Topology::new_group`].
///
/// ## Invariant
///
/// For every bucket, `0 <= occupancy <= capacity`. Occupancy only changes
/// through [`admit`](Group::admit) and [`release`](Group::release), both
/// of which refuse (with a [`SimulationError`]) to break it.
///
/// [`Topology`]: crate::topology::Topology
/// [`Topology::new_group`]: crate::topology::Topology::new_group
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    name: String,
    capacities: Vec<Capacity>,
    sizes: Vec<Size>,
    layer: u64,
    blocked: BTreeSet<TrafficClassId>,
    compression: BTreeMap<TrafficClassId, CompressionLadder>,
    next_groups: Vec<GroupId>,
    overflow_policy: OverflowPolicy,

    pub(crate) stats: GroupStatistics,
}

/// Where (and how) a group admits a load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    pub bucket: usize,
    pub compression: Option<CompressionRatio>,
}

impl Group {
    pub(crate) fn new(id: GroupId, name: String, capacities: Vec<Capacity>, layer: u64) -> Self {
        let sizes = vec![Size::ZERO; capacities.len()];
        Self {
            id,
            name,
            capacities,
            sizes,
            layer,
            blocked: BTreeSet::new(),
            compression: BTreeMap::new(),
            next_groups: Vec::new(),
            overflow_policy: OverflowPolicy::default(),
            stats: GroupStatistics::default(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> u64 {
        self.layer
    }

    pub fn capacities(&self) -> &[Capacity] {
        &self.capacities
    }

    /// current occupancy, per bucket
    pub fn occupancy(&self) -> &[Size] {
        &self.sizes
    }

    pub fn total_capacity(&self) -> Capacity {
        self.capacities.iter().copied().sum()
    }

    /// unoccupied units summed over every bucket
    pub fn free_capacity(&self) -> Capacity {
        self.capacities
            .iter()
            .zip(&self.sizes)
            .map(|(capacity, occupied)| capacity.free(*occupied))
            .sum()
    }

    pub fn next_groups(&self) -> &[GroupId] {
        &self.next_groups
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    /// `true` if the group refuses every load of `tc_id`
    pub fn blocks(&self, tc_id: TrafficClassId) -> bool {
        self.blocked.contains(&tc_id)
    }

    pub fn compression(&self, tc_id: TrafficClassId) -> Option<&CompressionLadder> {
        self.compression.get(&tc_id)
    }

    pub(crate) fn set_overflow_policy(&mut self, overflow_policy: OverflowPolicy) {
        self.overflow_policy = overflow_policy;
    }

    pub(crate) fn block_traffic_class(&mut self, tc_id: TrafficClassId) {
        self.blocked.insert(tc_id);
    }

    pub(crate) fn add_compression_ratio(
        &mut self,
        tc_id: TrafficClassId,
        threshold: Size,
        ratio: CompressionRatio,
    ) {
        self.compression.entry(tc_id).or_default().insert(threshold, ratio);
    }

    pub(crate) fn add_next_group(&mut self, group: GroupId) -> bool {
        if self.next_groups.contains(&group) {
            return false;
        }
        self.next_groups.push(group);
        true
    }

    /// Decide whether a load of `tc` would be admitted right now.
    ///
    /// 1. a blocked class is always refused;
    /// 2. with a compression ladder, the first bucket whose occupancy has
    ///    crossed a threshold decides, with the compressed size;
    /// 3. otherwise the first bucket with enough room admits.
    pub fn can_serve(&self, tc: &TrafficClass) -> Option<Admission> {
        if self.blocks(tc.id) {
            return None;
        }

        if let Some(ladder) = self.compression.get(&tc.id) {
            for (bucket, (capacity, occupied)) in self.capacities.iter().zip(&self.sizes).enumerate()
            {
                if let Some(ratio) = ladder.select(*occupied) {
                    return capacity.fits(*occupied, ratio.size).then_some(Admission {
                        bucket,
                        compression: Some(*ratio),
                    });
                }
            }
        }

        self.capacities
            .iter()
            .zip(&self.sizes)
            .position(|(capacity, occupied)| capacity.fits(*occupied, tc.size))
            .map(|bucket| Admission {
                bucket,
                compression: None,
            })
    }

    /// Take the resources of `load` as decided by `admission`.
    ///
    /// Rewrites the load's size (and records the compression) when the
    /// admission is compressed. Returns the factor to apply to the
    /// service intensity.
    pub(crate) fn admit(
        &mut self,
        load: &mut Load,
        admission: Admission,
    ) -> Result<IntensityFactor, SimulationError> {
        let Admission { bucket, compression } = admission;

        let mut intensity_factor = IntensityFactor::ONE;
        if let Some(ratio) = compression {
            load.size = ratio.size;
            load.compression_ratio = Some(ratio);
            intensity_factor = ratio.intensity_factor;
        }

        let (Some(capacity), Some(occupied)) =
            (self.capacities.get(bucket).copied(), self.sizes.get_mut(bucket))
        else {
            return Err(SimulationError::UnknownBucket {
                group: self.id,
                bucket,
            });
        };
        if !capacity.fits(*occupied, load.size) {
            return Err(SimulationError::OverCapacity {
                group: self.id,
                bucket,
                occupied: *occupied,
                size: load.size,
                capacity,
            });
        }

        *occupied += load.size;
        load.bucket = bucket;
        Ok(intensity_factor)
    }

    /// Give back the resources taken by `load`.
    pub(crate) fn release(&mut self, load: &Load) -> Result<(), SimulationError> {
        let Some(occupied) = self.sizes.get_mut(load.bucket) else {
            return Err(SimulationError::UnknownBucket {
                group: self.id,
                bucket: load.bucket,
            });
        };
        let Some(remaining) = occupied.checked_sub(load.size) else {
            return Err(SimulationError::NegativeOccupancy {
                group: self.id,
                bucket: load.bucket,
                occupied: *occupied,
                size: load.size,
            });
        };
        *occupied = remaining;
        Ok(())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Group {} {} V=", self.id, self.name)?;
        for (bucket, capacity) in self.capacities.iter().enumerate() {
            if bucket > 0 {
                write!(f, "+")?;
            }
            write!(f, "{capacity}")?;
        }
        write!(f, " layer={}]", self.layer)
    }
}
