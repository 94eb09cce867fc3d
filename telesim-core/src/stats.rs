//! Loss, forwarding and blocking statistics.
//!
//! Groups keep running counters ([`GroupStatistics`]) while the world is
//! running. [`Stats`] is a point-in-time snapshot derived from them,
//! obtained via [`World::stats`](crate::world::World::stats).

use crate::{
    id::{GroupId, SourceId},
    load::Load,
    measure::{Capacity, Count, Duration, Probability, ProbabilityError, Size, Time},
    traffic_class::TrafficClassId,
};
use std::{
    collections::BTreeMap,
    ops::{Add, AddAssign},
};

/// Number of loads and the resource units they carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadStats {
    pub count: Count,
    pub size: Size,
}

/// Outcome counters of the loads offered to a group.
///
/// `forwarded` loads were refused locally but served further down the
/// overflow path; they are not counted as `lost` nor as `served` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LostServedStats {
    pub lost: LoadStats,
    pub served: LoadStats,
    pub forwarded: LoadStats,
}

/// Accumulated time spent in a blocked state.
///
/// [`try_block`](BlockStats::try_block) and
/// [`try_unblock`](BlockStats::try_unblock) are idempotent: blocking an
/// already blocked state (or unblocking an unblocked one) does nothing
/// and returns `false`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockStats {
    block_time: Duration,
    start_of_block: Time,
    is_blocked: bool,
}

/// Snapshot of the statistics of one traffic class at one group.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrafficClassStats {
    pub lost_served: LostServedStats,
    /// time during which the group alone could not serve the class
    pub block_time: Duration,
    /// time during which nothing reachable from the group could serve
    /// the class
    pub block_recursive_time: Duration,
    pub simulation_time: Duration,
}

/// Snapshot of the statistics of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub id: GroupId,
    pub name: String,
    pub layer: u64,
    pub capacities: Vec<Capacity>,
    /// sum over every traffic class
    pub total: LostServedStats,
    pub by_traffic_class: BTreeMap<TrafficClassId, TrafficClassStats>,
}

/// Snapshot of the statistics of one source stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStats {
    pub id: SourceId,
    pub name: String,
    pub traffic_class: TrafficClassId,
    pub target_group: GroupId,
    pub loads_produced: Count,
}

/// Point-in-time snapshot of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    /// the simulation clock when the snapshot was taken
    pub time: Time,
    /// events still waiting in the queue
    pub events_in_queue: usize,
    pub groups: Vec<GroupStats>,
    pub sources: Vec<SourceStats>,
}

/// Running counters of a group, one entry per traffic class.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupStatistics {
    pub(crate) served_by_tc: BTreeMap<TrafficClassId, LostServedStats>,
    pub(crate) blocked_by_tc: BTreeMap<TrafficClassId, BlockStats>,
    pub(crate) blocked_recursive_by_tc: BTreeMap<TrafficClassId, BlockStats>,
}

impl LostServedStats {
    /// Account a load whose service just ended.
    ///
    /// A compressed load is accounted with its equivalent uncompressed
    /// size (compressed size scaled back by the intensity factor).
    pub fn serve(&mut self, load: &Load) {
        let size = match load.compression_ratio {
            None => load.size,
            Some(compression) => Size::new(
                (compression.size.into_u64() as f64 / compression.intensity_factor.into_f64())
                    .round() as u64,
            ),
        };
        self.served.count += Count::ONE;
        self.served.size += size;
    }

    pub fn drop(&mut self, load: &Load) {
        self.lost.count += Count::ONE;
        self.lost.size += load.size;
    }

    pub fn forward(&mut self, load: &Load) {
        self.forwarded.count += Count::ONE;
        self.forwarded.size += load.size;
    }

    /// every load offered, whatever its outcome
    pub fn offered(&self) -> LoadStats {
        self.lost + self.served + self.forwarded
    }
}

impl BlockStats {
    /// Enter the blocked state at `time`. Returns `false` if already
    /// blocked.
    pub fn try_block(&mut self, time: Time) -> bool {
        if self.is_blocked {
            return false;
        }
        self.is_blocked = true;
        self.start_of_block = time;
        true
    }

    /// Leave the blocked state at `time`, accumulating the time spent
    /// blocked. Returns `false` if not blocked.
    pub fn try_unblock(&mut self, time: Time) -> bool {
        if !self.is_blocked {
            return false;
        }
        self.is_blocked = false;
        self.block_time += time - self.start_of_block;
        true
    }

    pub fn is_blocked(&self) -> bool {
        self.is_blocked
    }

    /// Total blocked time as of `now`, including a block still ongoing.
    pub fn block_time_at(&self, now: Time) -> Duration {
        if self.is_blocked {
            self.block_time + (now - self.start_of_block)
        } else {
            self.block_time
        }
    }
}

/// `num / den` as a [`Probability`], tolerating the rounding of a sum
/// of durations that should be exactly `den`.
fn duration_ratio(num: Duration, den: Duration) -> Result<Probability, ProbabilityError> {
    if den == Duration::ZERO {
        return Ok(Probability::ZERO);
    }
    let ratio = num / den;
    if ratio > 1.0 && ratio - 1.0 < 1e-9 {
        return Ok(Probability::ONE);
    }
    Probability::new(ratio)
}

impl TrafficClassStats {
    /// `P_loss`: lost over offered loads.
    pub fn loss_ratio(&self) -> Result<Probability, ProbabilityError> {
        let s = &self.lost_served;
        Probability::ratio_to_sum(
            s.lost.count.into_u64() as f64,
            &[
                s.served.count.into_u64() as f64,
                s.forwarded.count.into_u64() as f64,
            ],
        )
    }

    /// `P_loss` weighted by resource units.
    pub fn loss_ratio_u(&self) -> Result<Probability, ProbabilityError> {
        let s = &self.lost_served;
        Probability::ratio_to_sum(
            s.lost.size.into_u64() as f64,
            &[
                s.served.size.into_u64() as f64,
                s.forwarded.size.into_u64() as f64,
            ],
        )
    }

    /// `P_forward`: forwarded over offered loads.
    pub fn forward_ratio(&self) -> Result<Probability, ProbabilityError> {
        let s = &self.lost_served;
        Probability::ratio_to_sum(
            s.forwarded.count.into_u64() as f64,
            &[
                s.served.count.into_u64() as f64,
                s.lost.count.into_u64() as f64,
            ],
        )
    }

    pub fn forward_ratio_u(&self) -> Result<Probability, ProbabilityError> {
        let s = &self.lost_served;
        Probability::ratio_to_sum(
            s.forwarded.size.into_u64() as f64,
            &[
                s.served.size.into_u64() as f64,
                s.lost.size.into_u64() as f64,
            ],
        )
    }

    /// `P_block`: fraction of the simulation the group was blocked for
    /// the class.
    pub fn block_ratio(&self) -> Result<Probability, ProbabilityError> {
        duration_ratio(self.block_time, self.simulation_time)
    }

    /// `P_block_recursive`: fraction of the simulation nothing reachable
    /// could serve the class.
    pub fn block_recursive_ratio(&self) -> Result<Probability, ProbabilityError> {
        duration_ratio(self.block_recursive_time, self.simulation_time)
    }
}

impl GroupStatistics {
    pub(crate) fn served(&mut self, tc_id: TrafficClassId) -> &mut LostServedStats {
        self.served_by_tc.entry(tc_id).or_default()
    }

    pub(crate) fn blocked(&mut self, tc_id: TrafficClassId) -> &mut BlockStats {
        self.blocked_by_tc.entry(tc_id).or_default()
    }

    pub(crate) fn blocked_recursive(&mut self, tc_id: TrafficClassId) -> &mut BlockStats {
        self.blocked_recursive_by_tc.entry(tc_id).or_default()
    }

    /// Per traffic class snapshot at `now`, the simulation having run
    /// since [`Time::ZERO`].
    pub(crate) fn snapshot(&self, now: Time) -> BTreeMap<TrafficClassId, TrafficClassStats> {
        let tc_ids = self
            .served_by_tc
            .keys()
            .chain(self.blocked_by_tc.keys())
            .chain(self.blocked_recursive_by_tc.keys());

        let mut by_traffic_class = BTreeMap::new();
        for tc_id in tc_ids {
            by_traffic_class.entry(*tc_id).or_insert_with(|| TrafficClassStats {
                lost_served: self.served_by_tc.get(tc_id).copied().unwrap_or_default(),
                block_time: self
                    .blocked_by_tc
                    .get(tc_id)
                    .map(|block| block.block_time_at(now))
                    .unwrap_or_default(),
                block_recursive_time: self
                    .blocked_recursive_by_tc
                    .get(tc_id)
                    .map(|block| block.block_time_at(now))
                    .unwrap_or_default(),
                simulation_time: now.since_start(),
            });
        }
        by_traffic_class
    }
}

impl Stats {
    /// Lost/served/forwarded counters of every traffic class summed over
    /// all the groups.
    pub fn by_traffic_class(&self) -> BTreeMap<TrafficClassId, LostServedStats> {
        let mut total: BTreeMap<TrafficClassId, LostServedStats> = BTreeMap::new();
        for group in &self.groups {
            for (tc_id, stats) in &group.by_traffic_class {
                *total.entry(*tc_id).or_default() += stats.lost_served;
            }
        }
        total
    }

    /// Loads produced by all the sources of the given class.
    pub fn produced(&self, tc_id: TrafficClassId) -> Count {
        self.sources
            .iter()
            .filter(|source| source.traffic_class == tc_id)
            .fold(Count::ZERO, |acc, source| acc + source.loads_produced)
    }

    pub fn group(&self, name: &str) -> Option<&GroupStats> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Check that every reported ratio is a probability.
    pub fn validate(&self) -> Result<(), ProbabilityError> {
        for stats in self.groups.iter().flat_map(|group| group.by_traffic_class.values()) {
            stats.loss_ratio()?;
            stats.loss_ratio_u()?;
            stats.forward_ratio()?;
            stats.forward_ratio_u()?;
            stats.block_ratio()?;
            stats.block_recursive_ratio()?;
        }
        Ok(())
    }
}

impl Add for LoadStats {
    type Output = LoadStats;
    fn add(self, rhs: Self) -> Self::Output {
        LoadStats {
            count: self.count + rhs.count,
            size: self.size + rhs.size,
        }
    }
}
impl AddAssign for LoadStats {
    fn add_assign(&mut self, rhs: Self) {
        self.count += rhs.count;
        self.size += rhs.size;
    }
}

impl Add for LostServedStats {
    type Output = LostServedStats;
    fn add(self, rhs: Self) -> Self::Output {
        LostServedStats {
            lost: self.lost + rhs.lost,
            served: self.served + rhs.served,
            forwarded: self.forwarded + rhs.forwarded,
        }
    }
}
impl AddAssign for LostServedStats {
    fn add_assign(&mut self, rhs: Self) {
        self.lost += rhs.lost;
        self.served += rhs.served;
        self.forwarded += rhs.forwarded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{group::CompressionRatio, id::LoadId, measure::IntensityFactor};

    fn load(size: u64) -> Load {
        Load::new(
            LoadId::new(1),
            TrafficClassId::new(1),
            Time::ZERO,
            Size::new(size),
            SourceId::new(0),
            GroupId::new(0),
        )
    }

    #[test]
    fn block_is_idempotent() {
        let mut block = BlockStats::default();
        assert!(block.try_block(Time::new(1.0)));
        assert!(!block.try_block(Time::new(2.0)));
        assert!(block.try_unblock(Time::new(4.0)));
        assert!(!block.try_unblock(Time::new(5.0)));
        assert_eq!(block.block_time_at(Time::new(10.0)), Duration::new(3.0));
    }

    #[test]
    fn ongoing_block_is_included() {
        let mut block = BlockStats::default();
        block.try_block(Time::new(1.0));
        block.try_unblock(Time::new(2.0));
        block.try_block(Time::new(5.0));
        assert!(block.is_blocked());
        assert_eq!(block.block_time_at(Time::new(6.5)), Duration::new(2.5));
    }

    #[test]
    fn lost_served_counters() {
        let mut stats = LostServedStats::default();
        stats.serve(&load(2));
        stats.drop(&load(1));
        stats.forward(&load(3));

        assert_eq!(stats.served.count, Count::ONE);
        assert_eq!(stats.served.size, Size::new(2));
        assert_eq!(stats.lost.size, Size::new(1));
        assert_eq!(stats.forwarded.size, Size::new(3));
        assert_eq!(stats.offered().count, Count::new(3));
    }

    #[test]
    fn compressed_load_served_with_equivalent_size() {
        let mut compressed = load(1);
        compressed.compression_ratio = Some(CompressionRatio {
            size: Size::new(1),
            intensity_factor: IntensityFactor::new(0.5).unwrap(),
        });
        let mut stats = LostServedStats::default();
        stats.serve(&compressed);
        assert_eq!(stats.served.size, Size::new(2));
    }

    #[test]
    fn ratios() {
        let mut lost_served = LostServedStats::default();
        lost_served.serve(&load(1));
        lost_served.serve(&load(1));
        lost_served.drop(&load(1));
        lost_served.forward(&load(1));

        let stats = TrafficClassStats {
            lost_served,
            block_time: Duration::new(2.5),
            block_recursive_time: Duration::new(1.0),
            simulation_time: Duration::new(10.0),
        };
        assert_eq!(stats.loss_ratio().unwrap().value(), 0.25);
        assert_eq!(stats.forward_ratio().unwrap().value(), 0.25);
        assert_eq!(stats.block_ratio().unwrap().value(), 0.25);
        assert_eq!(stats.block_recursive_ratio().unwrap().value(), 0.1);
    }

    #[test]
    fn empty_ratios_are_zero() {
        let stats = TrafficClassStats::default();
        assert_eq!(stats.loss_ratio().unwrap(), Probability::ZERO);
        assert_eq!(stats.block_ratio().unwrap(), Probability::ZERO);
    }

    #[test]
    fn inconsistent_block_time_is_rejected() {
        let stats = TrafficClassStats {
            block_time: Duration::new(11.0),
            simulation_time: Duration::new(10.0),
            ..Default::default()
        };
        assert!(stats.block_ratio().is_err());
    }

    #[test]
    fn snapshot_merges_every_class() {
        let tc1 = TrafficClassId::new(1);
        let tc2 = TrafficClassId::new(2);
        let mut statistics = GroupStatistics::default();
        statistics.served(tc1).serve(&load(1));
        statistics.blocked(tc2).try_block(Time::new(1.0));

        let snapshot = statistics.snapshot(Time::new(3.0));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&tc1].lost_served.served.count, Count::ONE);
        assert_eq!(snapshot[&tc2].block_time, Duration::new(2.0));
        assert_eq!(snapshot[&tc2].simulation_time, Duration::new(3.0));
    }
}
