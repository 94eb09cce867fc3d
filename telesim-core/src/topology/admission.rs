//! Admission, overflow and blocking bookkeeping across the group arena.

use super::Topology;
use crate::{
    event::EventKind,
    group::Group,
    id::GroupId,
    load::Load,
    measure::Time,
    random::exponential,
    traffic_class::TrafficClass,
    world::{Scheduler, SimulationError},
};
use tracing::debug;

/// Whether a traffic class can be admitted by a group, or by anything
/// reachable from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachability {
    /// the group itself has room
    pub local: bool,
    /// the group or one of its downstream groups has room
    pub recursive: bool,
}

/// Depth-first search from `group` for a group able to admit `tc`,
/// bounded by the class' path length and never revisiting `path`.
fn reachability(
    groups: &[Group],
    group: GroupId,
    tc: &TrafficClass,
    path: &mut Vec<GroupId>,
) -> Reachability {
    let Some(current) = groups.get(group.index()) else {
        return Reachability {
            local: false,
            recursive: false,
        };
    };
    if current.can_serve(tc).is_some() {
        return Reachability {
            local: true,
            recursive: true,
        };
    }

    path.push(group);
    let mut recursive = false;
    if (path.len() as u64) < tc.max_path_length {
        for next in current.next_groups() {
            if path.contains(next) {
                continue;
            }
            if reachability(groups, *next, tc, path).recursive {
                recursive = true;
                break;
            }
        }
    }
    path.pop();

    Reachability {
        local: false,
        recursive,
    }
}

impl Topology {
    fn group_mut(&mut self, id: GroupId) -> Result<&mut Group, SimulationError> {
        self.groups
            .get_mut(id.index())
            .ok_or(SimulationError::UnknownGroup(id))
    }

    fn traffic_class_of(&self, load: &Load) -> Result<TrafficClass, SimulationError> {
        self.traffic_classes
            .get(load.tc_id)
            .copied()
            .ok_or(SimulationError::UnknownTrafficClass(load.tc_id))
    }

    /// Where a load of `tc` offered to `group` right now could be admitted.
    pub fn reachability(&self, group: GroupId, tc: &TrafficClass) -> Reachability {
        let mut path = Vec::new();
        reachability(&self.groups, group, tc, &mut path)
    }

    /// Offer `load` to `group`: admit it, or forward it following the
    /// group's overflow policy.
    ///
    /// Returns `true` if the load ends up in service somewhere.
    pub(crate) fn try_serve(
        &mut self,
        group: GroupId,
        mut load: Load,
        scheduler: &mut Scheduler,
    ) -> Result<bool, SimulationError> {
        let tc = self.traffic_class_of(&load)?;
        let now = scheduler.current_time();
        let current = self.group_mut(group)?;
        load.served_by.push(group);

        let Some(admission) = current.can_serve(&tc) else {
            debug!(time = %now, group = %group, "forwarding {load}");
            return self.forward(group, load, scheduler);
        };

        let intensity_factor = current.admit(&mut load, admission)?;
        let service = exponential(scheduler.rng(), tc.serve_intensity * intensity_factor);
        let end_time = load.send_time + service;
        load.end_time = Some(end_time);
        debug!(time = %now, group = %group, bucket = load.bucket, "start serving {load}");

        self.update_block_stat(group, now);
        scheduler.schedule(end_time, EventKind::ServiceEnd(load));
        Ok(true)
    }

    /// Pass a load refused by `group` to the next candidate.
    ///
    /// A forwarded load that ends up in service is accounted as forwarded
    /// by `group`, otherwise as lost.
    fn forward(
        &mut self,
        group: GroupId,
        load: Load,
        scheduler: &mut Scheduler,
    ) -> Result<bool, SimulationError> {
        let tc = self.traffic_class_of(&load)?;
        let now = scheduler.current_time();

        let next = if load.drop || load.path_length() >= tc.max_path_length {
            None
        } else {
            let current = self
                .groups
                .get(group.index())
                .ok_or(SimulationError::UnknownGroup(group))?;
            current.overflow_policy().find_next_group(
                current,
                &load,
                &tc,
                &self.groups,
                scheduler.rng(),
            )
        };

        let served = match next {
            Some(next) => {
                debug!(time = %now, group = %group, next = %next, "overflow {load}");
                self.try_serve(next, load.clone(), scheduler)?
            }
            None => false,
        };

        let stats = self.group_mut(group)?.stats.served(load.tc_id);
        if served {
            stats.forward(&load);
        } else {
            debug!(time = %now, group = %group, "lost {load}");
            stats.drop(&load);
        }
        Ok(served)
    }

    /// Release the resources of a load whose service ends now.
    pub(crate) fn take_off(&mut self, load: &Load, now: Time) -> Result<(), SimulationError> {
        let group = load
            .current_group()
            .ok_or(SimulationError::NotServed { load: load.id })?;
        let current = self.group_mut(group)?;
        current.release(load)?;
        current.stats.served(load.tc_id).serve(load);
        debug!(time = %now, group = %group, "served {load}");

        self.update_unblock_stat(group, now);
        Ok(())
    }

    /// After an admission at `group`: start the block periods of the
    /// classes it can no longer serve.
    fn update_block_stat(&mut self, group: GroupId, now: Time) {
        for tc in self.traffic_classes.iter() {
            let Reachability { local, recursive } =
                reachability(&self.groups, group, tc, &mut Vec::new());
            let Some(current) = self.groups.get_mut(group.index()) else {
                return;
            };
            if !local && recursive {
                if current.stats.blocked(tc.id).try_block(now) {
                    debug!(time = %now, group = %group, tc = %tc.id, "blocked");
                }
            } else if !recursive {
                if current.stats.blocked_recursive(tc.id).try_block(now) {
                    debug!(time = %now, group = %group, tc = %tc.id, "blocked recursively");
                }
                if current.stats.blocked(tc.id).try_block(now) {
                    debug!(time = %now, group = %group, tc = %tc.id, "blocked");
                }
            }
        }
    }

    /// After a release at `group`: end the block periods of the classes
    /// it can serve again.
    fn update_unblock_stat(&mut self, group: GroupId, now: Time) {
        for tc in self.traffic_classes.iter() {
            let Reachability { local, recursive } =
                reachability(&self.groups, group, tc, &mut Vec::new());
            let Some(current) = self.groups.get_mut(group.index()) else {
                return;
            };
            if local {
                if current.stats.blocked_recursive(tc.id).try_unblock(now) {
                    debug!(time = %now, group = %group, tc = %tc.id, "unblocked recursively");
                }
                if current.stats.blocked(tc.id).try_unblock(now) {
                    debug!(time = %now, group = %group, tc = %tc.id, "unblocked");
                }
            } else if recursive
                && current.stats.blocked_recursive(tc.id).try_unblock(now)
            {
                debug!(time = %now, group = %group, tc = %tc.id, "unblocked recursively");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        defaults::MAX_PATH_LENGTH,
        id::{LoadId, SourceId},
        measure::{Capacity, Count, Intensity, Size},
        overflow::OverflowPolicy,
        traffic_class::TrafficClassId,
    };

    const TC: TrafficClassId = TrafficClassId::new(1);

    fn tc(max_path_length: u64) -> TrafficClass {
        TrafficClass::new(
            TC,
            Intensity::new(1.0).unwrap(),
            Intensity::new(1.0).unwrap(),
            Size::new(1),
        )
        .with_max_path_length(max_path_length)
    }

    /// a chain `g0 -> g1 -> ...` with the given capacities
    fn chain(capacities: &[u64], max_path_length: u64) -> Topology {
        let mut topology = Topology::new();
        topology.add_traffic_class(tc(max_path_length)).unwrap();
        let mut previous = None;
        for (index, capacity) in capacities.iter().enumerate() {
            let id = topology
                .new_group(format!("g{index}"))
                .set_capacity(Capacity::new(*capacity))
                .set_overflow_policy(OverflowPolicy::AlwaysFirst)
                .build()
                .unwrap();
            if let Some(previous) = previous {
                topology.connect_groups(previous, id).unwrap();
            }
            previous = Some(id);
        }
        topology
    }

    fn load(scheduler: &mut Scheduler) -> Load {
        Load::new(
            scheduler.next_load_id(),
            TC,
            scheduler.current_time(),
            Size::new(1),
            SourceId::new(0),
            GroupId::new(0),
        )
    }

    fn served(topology: &Topology, group: usize) -> (Count, Count, Count) {
        let stats = &topology.groups[group].stats.served_by_tc[&TC];
        (stats.served.count, stats.forwarded.count, stats.lost.count)
    }

    // ------------------------------------------------------------------
    // 1. Admission and forwarding
    // ------------------------------------------------------------------

    #[test]
    fn admitted_load_is_scheduled_for_service_end() {
        let mut topology = chain(&[1], MAX_PATH_LENGTH);
        let mut scheduler = Scheduler::new(0);
        let load = load(&mut scheduler);

        assert!(topology.try_serve(GroupId::new(0), load, &mut scheduler).unwrap());
        assert_eq!(topology.groups[0].occupancy(), &[Size::new(1)]);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn refused_load_overflows() {
        let mut topology = chain(&[0, 1], MAX_PATH_LENGTH);
        let mut scheduler = Scheduler::new(0);
        let load = load(&mut scheduler);

        assert!(topology.try_serve(GroupId::new(0), load, &mut scheduler).unwrap());
        assert_eq!(served(&topology, 0), (Count::ZERO, Count::ONE, Count::ZERO));
        assert_eq!(topology.groups[1].occupancy(), &[Size::new(1)]);
    }

    #[test]
    fn overflow_failure_is_lost_at_every_hop() {
        let mut topology = chain(&[0, 0], MAX_PATH_LENGTH);
        let mut scheduler = Scheduler::new(0);
        let load = load(&mut scheduler);

        assert!(!topology.try_serve(GroupId::new(0), load, &mut scheduler).unwrap());
        assert_eq!(served(&topology, 0), (Count::ZERO, Count::ZERO, Count::ONE));
        assert_eq!(served(&topology, 1), (Count::ZERO, Count::ZERO, Count::ONE));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn path_length_limit_drops() {
        let mut topology = chain(&[0, 1], 1);
        let mut scheduler = Scheduler::new(0);
        let load = load(&mut scheduler);

        assert!(!topology.try_serve(GroupId::new(0), load, &mut scheduler).unwrap());
        assert_eq!(served(&topology, 0), (Count::ZERO, Count::ZERO, Count::ONE));
        assert_eq!(topology.groups[1].occupancy(), &[Size::ZERO]);
    }

    #[test]
    fn drop_flag_forbids_forwarding() {
        let mut topology = chain(&[0, 1], MAX_PATH_LENGTH);
        let mut scheduler = Scheduler::new(0);
        let mut load = load(&mut scheduler);
        load.drop = true;

        assert!(!topology.try_serve(GroupId::new(0), load, &mut scheduler).unwrap());
        assert_eq!(topology.groups[1].occupancy(), &[Size::ZERO]);
    }

    #[test]
    fn take_off_releases_and_counts() {
        let mut topology = chain(&[1], MAX_PATH_LENGTH);
        let mut scheduler = Scheduler::new(0);
        let load = load(&mut scheduler);
        topology.try_serve(GroupId::new(0), load, &mut scheduler).unwrap();

        scheduler.advance_to(Time::new(1_000.0));
        let (event, _) = scheduler.pop_due().unwrap();
        let EventKind::ServiceEnd(load) = event.kind else {
            panic!("expected a service end, got {event}");
        };
        topology.take_off(&load, event.time).unwrap();
        assert_eq!(topology.groups[0].occupancy(), &[Size::ZERO]);
        assert_eq!(served(&topology, 0), (Count::ONE, Count::ZERO, Count::ZERO));
    }

    #[test]
    fn take_off_of_unserved_load() {
        let mut topology = chain(&[1], MAX_PATH_LENGTH);
        let mut scheduler = Scheduler::new(0);
        let load = load(&mut scheduler);
        let result = topology.take_off(&load, Time::ZERO);
        assert!(
            matches!(result, Err(SimulationError::NotServed { .. })),
            "Expected NotServed, got {result:?}"
        );
    }

    // ------------------------------------------------------------------
    // 2. Reachability and blocking
    // ------------------------------------------------------------------

    #[test]
    fn reachability_follows_next_groups() {
        let topology = chain(&[0, 0, 1], MAX_PATH_LENGTH);
        let r = topology.reachability(GroupId::new(0), &tc(MAX_PATH_LENGTH));
        assert!(!r.local);
        assert!(r.recursive);

        let topology = chain(&[0, 0, 1], 2);
        let r = topology.reachability(GroupId::new(0), &tc(2));
        assert!(!r.recursive);
    }

    #[test]
    fn reachability_avoids_cycles() {
        let mut topology = chain(&[0, 0], MAX_PATH_LENGTH);
        topology.connect_groups(GroupId::new(1), GroupId::new(0)).unwrap();
        let r = topology.reachability(GroupId::new(0), &tc(MAX_PATH_LENGTH));
        assert_eq!(
            r,
            Reachability {
                local: false,
                recursive: false
            }
        );
    }

    #[test]
    fn block_periods() {
        let mut topology = chain(&[1, 1], MAX_PATH_LENGTH);
        let mut scheduler = Scheduler::new(0);

        // fill g0: blocked locally, g1 still reachable
        let first = load(&mut scheduler);
        topology.try_serve(GroupId::new(0), first, &mut scheduler).unwrap();
        let g0 = &topology.groups[0].stats;
        assert!(g0.blocked_by_tc[&TC].is_blocked());
        assert!(!g0.blocked_recursive_by_tc.get(&TC).is_some_and(|b| b.is_blocked()));

        // overflow fills g1: g1 now blocked locally and recursively
        let second = load(&mut scheduler);
        topology.try_serve(GroupId::new(0), second, &mut scheduler).unwrap();
        let g1 = &topology.groups[1].stats;
        assert!(g1.blocked_by_tc[&TC].is_blocked());
        assert!(g1.blocked_recursive_by_tc[&TC].is_blocked());
    }
}
