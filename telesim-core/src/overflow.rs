//! Choice of the next group for a load refused by its current group.

use crate::{
    defaults::{MAX_LAYERS, OVERFLOWS_PER_LAYER},
    group::Group,
    id::GroupId,
    load::Load,
    random::uniform_index,
    traffic_class::TrafficClass,
};
use rand_core::Rng;
use std::{fmt, str::FromStr};
use thiserror::Error;

const LAYERS: usize = MAX_LAYERS as usize;

/// How a group forwards the loads it cannot admit.
///
/// Only the downstream groups (see [`Topology::connect_groups`]) that the
/// load has not visited yet are ever candidates. The policies that filter
/// candidates on their current state fall back to any unvisited group of
/// a strictly higher layer when the filter leaves nothing.
///
/// | Name                    | Candidate                                        |
/// |-------------------------|--------------------------------------------------|
/// | `no_overflow`           | none, the load is lost                           |
/// | `always_first`          | the first downstream group                       |
/// | `first_available`       | the first downstream group able to admit         |
/// | `random_available`      | a random one able to admit, lowest layer first   |
/// | `highest_free_capacity` | as above, the one with most free units           |
/// | `lowest_free_capacity`  | as above, the one with fewest free units         |
///
/// [`Topology::connect_groups`]: crate::topology::Topology::connect_groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    #[default]
    NoOverflow,
    AlwaysFirst,
    FirstAvailable,
    RandomAvailable,
    HighestFreeCapacity,
    LowestFreeCapacity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown overflow policy '{0}'")]
pub struct OverflowPolicyParseError(String);

impl OverflowPolicy {
    /// Pick the next group `load` should be offered to, if any.
    ///
    /// `from` is the group that just refused the load and `groups` the
    /// whole arena of the topology.
    pub(crate) fn find_next_group<R: Rng>(
        self,
        from: &Group,
        load: &Load,
        tc: &TrafficClass,
        groups: &[Group],
        rng: &mut R,
    ) -> Option<GroupId> {
        let primary = match self {
            Self::NoOverflow => return None,
            Self::AlwaysFirst => return unvisited(from, load, groups).next().map(Group::id),
            Self::FirstAvailable => unvisited(from, load, groups)
                .find(|group| group.can_serve(tc).is_some())
                .map(Group::id),
            Self::RandomAvailable => {
                let available = available_in_lowest_layer(from, load, tc, groups);
                uniform_index(rng, available.len()).map(|index| available[index].id())
            }
            Self::HighestFreeCapacity => {
                let available = available_in_lowest_layer(from, load, tc, groups);
                pick_by_free_capacity(&available, true, rng)
            }
            Self::LowestFreeCapacity => {
                let available = available_in_lowest_layer(from, load, tc, groups);
                pick_by_free_capacity(&available, false, rng)
            }
        };

        primary.or_else(|| fallback(from, load, groups, rng))
    }
}

/// Downstream groups of `from` not yet visited by `load`, in connection
/// order.
fn unvisited<'a>(
    from: &'a Group,
    load: &'a Load,
    groups: &'a [Group],
) -> impl Iterator<Item = &'a Group> + 'a {
    from.next_groups()
        .iter()
        .filter(move |id| !load.visited(**id))
        .filter_map(move |id| groups.get(id.index()))
}

/// Number of visited groups in every layer.
fn layers_usage(load: &Load, groups: &[Group]) -> [usize; LAYERS] {
    let mut usage = [0; LAYERS];
    for group in load.served_by.iter().filter_map(|id| groups.get(id.index())) {
        if let Some(count) = usage.get_mut(group.layer() as usize) {
            *count += 1;
        }
    }
    usage
}

/// Unvisited downstream groups able to admit the class, restricted to the
/// lowest layer that still has overflow quota and at least one such
/// group.
fn available_in_lowest_layer<'a>(
    from: &'a Group,
    load: &'a Load,
    tc: &TrafficClass,
    groups: &'a [Group],
) -> Vec<&'a Group> {
    let usage = layers_usage(load, groups);
    for (layer, used) in usage.iter().enumerate() {
        if *used >= OVERFLOWS_PER_LAYER {
            continue;
        }
        let available: Vec<&Group> = unvisited(from, load, groups)
            .filter(|group| group.layer() as usize == layer)
            .filter(|group| group.can_serve(tc).is_some())
            .collect();
        if !available.is_empty() {
            return available;
        }
    }
    Vec::new()
}

fn pick_by_free_capacity<R: Rng>(
    available: &[&Group],
    highest: bool,
    rng: &mut R,
) -> Option<GroupId> {
    let free = available.iter().map(|group| group.free_capacity());
    let extreme = if highest { free.max()? } else { free.min()? };
    let ties: Vec<&&Group> = available
        .iter()
        .filter(|group| group.free_capacity() == extreme)
        .collect();
    uniform_index(rng, ties.len()).map(|index| ties[index].id())
}

/// Any unvisited group of the topology in a strictly higher layer.
fn fallback<R: Rng>(from: &Group, load: &Load, groups: &[Group], rng: &mut R) -> Option<GroupId> {
    let higher: Vec<GroupId> = groups
        .iter()
        .filter(|group| group.layer() > from.layer())
        .filter(|group| !load.visited(group.id()))
        .map(Group::id)
        .collect();
    uniform_index(rng, higher.len()).map(|index| higher[index])
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoOverflow => "no_overflow",
            Self::AlwaysFirst => "always_first",
            Self::FirstAvailable => "first_available",
            Self::RandomAvailable => "random_available",
            Self::HighestFreeCapacity => "highest_free_capacity",
            Self::LowestFreeCapacity => "lowest_free_capacity",
        };
        f.write_str(name)
    }
}

impl FromStr for OverflowPolicy {
    type Err = OverflowPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_overflow" | "default" => Ok(Self::NoOverflow),
            "always_first" => Ok(Self::AlwaysFirst),
            "first_available" => Ok(Self::FirstAvailable),
            "random_available" => Ok(Self::RandomAvailable),
            "highest_free_capacity" => Ok(Self::HighestFreeCapacity),
            "lowest_free_capacity" => Ok(Self::LowestFreeCapacity),
            other => Err(OverflowPolicyParseError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        id::{LoadId, SourceId},
        measure::{Capacity, Intensity, Size, Time},
        traffic_class::TrafficClassId,
    };
    use rand_chacha::ChaChaRng;
    use rand_core::SeedableRng as _;

    fn tc() -> TrafficClass {
        TrafficClass::new(
            TrafficClassId::new(1),
            Intensity::new(1.0).unwrap(),
            Intensity::new(1.0).unwrap(),
            Size::new(1),
        )
    }

    /// `groups[0]` is the refusing group, connected to every other one
    fn topology(specs: &[(u64, u64)]) -> Vec<Group> {
        let mut groups: Vec<Group> = specs
            .iter()
            .enumerate()
            .map(|(index, (capacity, layer))| {
                Group::new(
                    GroupId::new(index),
                    format!("g{index}"),
                    vec![Capacity::new(*capacity)],
                    *layer,
                )
            })
            .collect();
        for index in 1..groups.len() {
            groups[0].add_next_group(GroupId::new(index));
        }
        groups
    }

    fn load_at_first_group() -> Load {
        let mut load = Load::new(
            LoadId::new(1),
            TrafficClassId::new(1),
            Time::ZERO,
            Size::new(1),
            SourceId::new(0),
            GroupId::new(0),
        );
        load.served_by.push(GroupId::new(0));
        load
    }

    fn find(policy: OverflowPolicy, groups: &[Group], load: &Load) -> Option<GroupId> {
        let mut rng = ChaChaRng::seed_from_u64(0);
        policy.find_next_group(&groups[0], load, &tc(), groups, &mut rng)
    }

    #[test]
    fn no_overflow_never_forwards() {
        let groups = topology(&[(0, 0), (5, 0)]);
        assert_eq!(
            find(OverflowPolicy::NoOverflow, &groups, &load_at_first_group()),
            None
        );
    }

    #[test]
    fn always_first_ignores_availability() {
        let groups = topology(&[(0, 0), (0, 0), (5, 0)]);
        assert_eq!(
            find(OverflowPolicy::AlwaysFirst, &groups, &load_at_first_group()),
            Some(GroupId::new(1))
        );
    }

    #[test]
    fn always_first_skips_visited() {
        let groups = topology(&[(0, 0), (0, 0), (5, 0)]);
        let mut load = load_at_first_group();
        load.served_by.push(GroupId::new(1));
        assert_eq!(
            find(OverflowPolicy::AlwaysFirst, &groups, &load),
            Some(GroupId::new(2))
        );
    }

    #[test]
    fn first_available_checks_availability() {
        let groups = topology(&[(0, 0), (0, 0), (5, 0)]);
        assert_eq!(
            find(OverflowPolicy::FirstAvailable, &groups, &load_at_first_group()),
            Some(GroupId::new(2))
        );
    }

    #[test]
    fn random_available_prefers_lowest_layer() {
        let groups = topology(&[(0, 0), (5, 1), (5, 0), (0, 0)]);
        for seed in 0..20 {
            let mut rng = ChaChaRng::seed_from_u64(seed);
            let next = OverflowPolicy::RandomAvailable.find_next_group(
                &groups[0],
                &load_at_first_group(),
                &tc(),
                &groups,
                &mut rng,
            );
            assert_eq!(next, Some(GroupId::new(2)));
        }
    }

    #[test]
    fn layer_quota_is_honoured() {
        let groups = topology(&[(0, 0), (5, 0), (5, 0), (5, 1)]);
        let mut load = load_at_first_group();
        // two groups of layer 0 visited already
        load.served_by.push(GroupId::new(1));
        assert_eq!(
            find(OverflowPolicy::RandomAvailable, &groups, &load),
            Some(GroupId::new(3))
        );
    }

    #[test]
    fn free_capacity_extremes() {
        let groups = topology(&[(0, 0), (3, 0), (7, 0), (5, 0)]);
        let load = load_at_first_group();
        assert_eq!(
            find(OverflowPolicy::HighestFreeCapacity, &groups, &load),
            Some(GroupId::new(2))
        );
        assert_eq!(
            find(OverflowPolicy::LowestFreeCapacity, &groups, &load),
            Some(GroupId::new(1))
        );
    }

    #[test]
    fn free_capacity_ties_are_drawn_at_random() {
        let cases = [
            (OverflowPolicy::HighestFreeCapacity, topology(&[(0, 0), (5, 0), (5, 0), (3, 0)])),
            (OverflowPolicy::LowestFreeCapacity, topology(&[(0, 0), (2, 0), (2, 0), (7, 0)])),
        ];
        for (policy, groups) in cases {
            let mut picked = Vec::new();
            for seed in 0..64 {
                let mut rng = ChaChaRng::seed_from_u64(seed);
                let next = policy.find_next_group(
                    &groups[0],
                    &load_at_first_group(),
                    &tc(),
                    &groups,
                    &mut rng,
                );
                picked.push(next);
            }
            assert!(picked.contains(&Some(GroupId::new(1))), "{policy}: {picked:?}");
            assert!(picked.contains(&Some(GroupId::new(2))), "{policy}: {picked:?}");
            assert!(!picked.contains(&Some(GroupId::new(3))), "{policy}: {picked:?}");
        }
    }

    #[test]
    fn fallback_to_higher_layer() {
        // nothing downstream can admit, group 2 is not connected but sits
        // in a higher layer
        let mut groups = topology(&[(0, 0), (0, 0)]);
        groups.push(Group::new(GroupId::new(2), "g2".to_owned(), vec![Capacity::new(1)], 1));
        assert_eq!(
            find(OverflowPolicy::FirstAvailable, &groups, &load_at_first_group()),
            Some(GroupId::new(2))
        );
        assert_eq!(
            find(OverflowPolicy::AlwaysFirst, &groups, &load_at_first_group()),
            Some(GroupId::new(1))
        );
    }

    #[test]
    fn parse_names() {
        assert_eq!(
            "default".parse::<OverflowPolicy>().unwrap(),
            OverflowPolicy::NoOverflow
        );
        for policy in [
            OverflowPolicy::NoOverflow,
            OverflowPolicy::AlwaysFirst,
            OverflowPolicy::FirstAvailable,
            OverflowPolicy::RandomAvailable,
            OverflowPolicy::HighestFreeCapacity,
            OverflowPolicy::LowestFreeCapacity,
        ] {
            assert_eq!(policy.to_string().parse::<OverflowPolicy>().unwrap(), policy);
        }
        assert!("sideways".parse::<OverflowPolicy>().is_err());
    }
}
