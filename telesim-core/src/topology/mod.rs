mod admission;

pub use self::admission::Reachability;

use crate::{
    defaults::MAX_LAYERS,
    group::{CompressionRatio, Group},
    id::{GroupId, SourceId},
    measure::{Capacity, Intensity, IntensityError, Size},
    overflow::OverflowPolicy,
    source::{SourceModel, SourceStream},
    traffic_class::{TrafficClass, TrafficClassId, TrafficClasses},
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Every group, source stream and traffic class of one run.
///
/// The topology is assembled first and then handed to a
/// [`World`](crate::world::World), which owns it for the rest of the run.
/// Groups and sources are stored in arenas and referred to by their
/// [`GroupId`] / [`SourceId`] handles.
///
/// ## Example
///
/// ```
/// use telesim_core::{
///     measure::{Capacity, Intensity, Size},
///     overflow::OverflowPolicy,
///     source::SourceModel,
///     topology::Topology,
///     traffic_class::{TrafficClass, TrafficClassId},
/// };
///
/// let mut topology = Topology::new();
/// let tc = TrafficClass::new(
///     TrafficClassId::new(1),
///     Intensity::new(2.0).unwrap(),
///     Intensity::new(1.0).unwrap(),
///     Size::new(1),
/// );
/// topology.add_traffic_class(tc).unwrap();
///
/// let primary = topology
///     .new_group("primary")
///     .set_capacity(Capacity::new(2))
///     .set_overflow_policy(OverflowPolicy::AlwaysFirst)
///     .build()
///     .unwrap();
/// let secondary = topology
///     .new_group("secondary")
///     .set_capacity(Capacity::new(4))
///     .set_layer(1)
///     .build()
///     .unwrap();
/// topology.connect_groups(primary, secondary).unwrap();
///
/// topology
///     .new_source("calls", tc.id, SourceModel::Poisson)
///     .attach(primary)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Topology {
    groups: Vec<Group>,
    sources: Vec<SourceStream>,
    traffic_classes: TrafficClasses,
    group_names: BTreeMap<String, GroupId>,
    source_names: BTreeMap<String, SourceId>,
}

/// Builder of a new [`Group`], obtained via [`Topology::new_group`].
///
/// ## Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | Capacity | none, must be set |
/// | Layer | `0` |
/// | Overflow policy | [`OverflowPolicy::NoOverflow`] |
pub struct GroupBuilder<'a> {
    name: String,
    capacities: Vec<Capacity>,
    layer: u64,
    overflow_policy: OverflowPolicy,
    blocked: Vec<TrafficClassId>,
    compression: Vec<(TrafficClassId, Size, CompressionRatio)>,

    topology: &'a mut Topology,
}

/// Builder of a new [`SourceStream`], obtained via
/// [`Topology::new_source`].
pub struct SourceBuilder<'a> {
    name: String,
    tc_id: TrafficClassId,
    model: SourceModel,
    target_group: Option<GroupId>,
    intensity: Option<Intensity>,

    topology: &'a mut Topology,
}

/// Malformed topology, detected while assembling it.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Group ({0}) Not Found")]
    UnknownGroup(GroupId),
    #[error("Traffic class ({0}) Not Found")]
    UnknownTrafficClass(TrafficClassId),
    #[error("group '{0}' already exists")]
    DuplicateGroup(String),
    #[error("source '{0}' already exists")]
    DuplicateSource(String),
    #[error("traffic class {} is already registered as {existing}", .existing.id)]
    ConflictingTrafficClass { existing: TrafficClass },
    #[error("group '{group}' is in layer {layer}, layers must be lower than {max}", max = MAX_LAYERS)]
    LayerTooHigh { group: String, layer: u64 },
    #[error("group '{0}' has no capacity bucket")]
    NoCapacity(String),
    #[error("source '{0}' is not attached to any group")]
    Unattached(String),
    #[error("source '{stream}': {error}")]
    Intensity {
        stream: String,
        #[source]
        error: IntensityError,
    },
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a traffic class. Registering the very same class twice is
    /// allowed, a different class under an existing id is not.
    pub fn add_traffic_class(&mut self, tc: TrafficClass) -> Result<(), TopologyError> {
        self.traffic_classes
            .insert(tc)
            .map_err(|existing| TopologyError::ConflictingTrafficClass { existing })
    }

    /// Create a new group and return a builder to configure it.
    pub fn new_group(&mut self, name: impl Into<String>) -> GroupBuilder<'_> {
        GroupBuilder {
            name: name.into(),
            capacities: Vec::new(),
            layer: 0,
            overflow_policy: OverflowPolicy::default(),
            blocked: Vec::new(),
            compression: Vec::new(),
            topology: self,
        }
    }

    /// Create a new source stream of the (already registered) traffic
    /// class `tc_id` and return a builder to attach it.
    pub fn new_source(
        &mut self,
        name: impl Into<String>,
        tc_id: TrafficClassId,
        model: SourceModel,
    ) -> SourceBuilder<'_> {
        SourceBuilder {
            name: name.into(),
            tc_id,
            model,
            target_group: None,
            intensity: None,
            topology: self,
        }
    }

    /// Make `to` a downstream group of `from`: loads refused by `from`
    /// may overflow to `to`. Connecting the same pair twice is a no-op.
    pub fn connect_groups(&mut self, from: GroupId, to: GroupId) -> Result<(), TopologyError> {
        if self.groups.get(to.index()).is_none() {
            return Err(TopologyError::UnknownGroup(to));
        }
        let Some(from) = self.groups.get_mut(from.index()) else {
            return Err(TopologyError::UnknownGroup(from));
        };
        from.add_next_group(to);
        Ok(())
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.index())
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.group_names.get(name).and_then(|id| self.group(*id))
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn source(&self, id: SourceId) -> Option<&SourceStream> {
        self.sources.get(id.index())
    }

    pub fn source_by_name(&self, name: &str) -> Option<&SourceStream> {
        self.source_names.get(name).and_then(|id| self.source(*id))
    }

    pub fn sources(&self) -> &[SourceStream] {
        &self.sources
    }

    pub fn traffic_classes(&self) -> &TrafficClasses {
        &self.traffic_classes
    }

    pub(crate) fn source_mut(&mut self, id: SourceId) -> Option<&mut SourceStream> {
        self.sources.get_mut(id.index())
    }

    pub(crate) fn sources_mut(&mut self) -> impl Iterator<Item = &mut SourceStream> {
        self.sources.iter_mut()
    }

    fn check_traffic_class(&self, tc_id: TrafficClassId) -> Result<&TrafficClass, TopologyError> {
        self.traffic_classes
            .get(tc_id)
            .ok_or(TopologyError::UnknownTrafficClass(tc_id))
    }
}

impl GroupBuilder<'_> {
    /// Single bucket of `capacity` units.
    pub fn set_capacity(mut self, capacity: Capacity) -> Self {
        self.capacities = vec![capacity];
        self
    }

    /// One bucket per entry.
    pub fn set_capacities(mut self, capacities: Vec<Capacity>) -> Self {
        self.capacities = capacities;
        self
    }

    /// Set the topological tier of the group, lower than
    /// [`MAX_LAYERS`].
    pub fn set_layer(mut self, layer: u64) -> Self {
        self.layer = layer;
        self
    }

    pub fn set_overflow_policy(mut self, overflow_policy: OverflowPolicy) -> Self {
        self.overflow_policy = overflow_policy;
        self
    }

    /// Refuse every load of the traffic class.
    pub fn block_traffic_class(mut self, tc_id: TrafficClassId) -> Self {
        self.blocked.push(tc_id);
        self
    }

    /// Admit loads of the traffic class compressed to `ratio` once a
    /// bucket holds at least `threshold` units.
    pub fn add_compression_ratio(
        mut self,
        tc_id: TrafficClassId,
        threshold: Size,
        ratio: CompressionRatio,
    ) -> Self {
        self.compression.push((tc_id, threshold, ratio));
        self
    }

    /// Register the group with the topology.
    pub fn build(self) -> Result<GroupId, TopologyError> {
        let Self {
            name,
            capacities,
            layer,
            overflow_policy,
            blocked,
            compression,
            topology,
        } = self;

        if topology.group_names.contains_key(&name) {
            return Err(TopologyError::DuplicateGroup(name));
        }
        if layer >= MAX_LAYERS {
            return Err(TopologyError::LayerTooHigh { group: name, layer });
        }
        if capacities.is_empty() {
            return Err(TopologyError::NoCapacity(name));
        }
        for tc_id in blocked.iter().chain(compression.iter().map(|(tc_id, _, _)| tc_id)) {
            topology.check_traffic_class(*tc_id)?;
        }

        let id = GroupId::new(topology.groups.len());
        let mut group = Group::new(id, name.clone(), capacities, layer);
        group.set_overflow_policy(overflow_policy);
        for tc_id in blocked {
            group.block_traffic_class(tc_id);
        }
        for (tc_id, threshold, ratio) in compression {
            group.add_compression_ratio(tc_id, threshold, ratio);
        }

        topology.groups.push(group);
        topology.group_names.insert(name, id);
        Ok(id)
    }
}

impl SourceBuilder<'_> {
    /// Set the group the loads of this source are offered to first.
    pub fn attach(mut self, group: GroupId) -> Self {
        self.target_group = Some(group);
        self
    }

    /// Offer `intensity` instead of the traffic class' own arrival rate.
    pub fn set_intensity(mut self, intensity: Intensity) -> Self {
        self.intensity = Some(intensity);
        self
    }

    /// Register the source with the topology.
    pub fn build(self) -> Result<SourceId, TopologyError> {
        let Self {
            name,
            tc_id,
            model,
            target_group,
            intensity,
            topology,
        } = self;

        if topology.source_names.contains_key(&name) {
            return Err(TopologyError::DuplicateSource(name));
        }
        let Some(target_group) = target_group else {
            return Err(TopologyError::Unattached(name));
        };
        if topology.group(target_group).is_none() {
            return Err(TopologyError::UnknownGroup(target_group));
        }
        let mut tc = *topology.check_traffic_class(tc_id)?;
        if let Some(intensity) = intensity {
            tc.source_intensity = intensity;
        }

        let id = SourceId::new(topology.sources.len());
        let source = SourceStream::new(id, name.clone(), tc, target_group, model).map_err(
            |error| TopologyError::Intensity {
                stream: name.clone(),
                error,
            },
        )?;

        topology.sources.push(source);
        topology.source_names.insert(name, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::Count;

    fn tc(id: u64, lambda: f64) -> TrafficClass {
        TrafficClass::new(
            TrafficClassId::new(id),
            Intensity::new(lambda).unwrap(),
            Intensity::new(1.0).unwrap(),
            Size::new(1),
        )
    }

    fn topology() -> Topology {
        let mut topology = Topology::new();
        topology.add_traffic_class(tc(1, 1.0)).unwrap();
        topology
    }

    #[test]
    fn groups_get_sequential_handles() {
        let mut topology = topology();
        let a = topology.new_group("a").set_capacity(Capacity::new(1)).build().unwrap();
        let b = topology.new_group("b").set_capacity(Capacity::new(1)).build().unwrap();
        assert_eq!(a, GroupId::new(0));
        assert_eq!(b, GroupId::new(1));
        assert_eq!(topology.group_by_name("b").map(Group::id), Some(b));
    }

    #[test]
    fn duplicate_group() {
        let mut topology = topology();
        topology.new_group("a").set_capacity(Capacity::new(1)).build().unwrap();
        let result = topology.new_group("a").set_capacity(Capacity::new(1)).build();
        assert!(
            matches!(result, Err(TopologyError::DuplicateGroup(_))),
            "Expected DuplicateGroup, got {result:?}"
        );
    }

    #[test]
    fn layer_must_be_lower_than_max() {
        let mut topology = topology();
        let result = topology
            .new_group("a")
            .set_capacity(Capacity::new(1))
            .set_layer(MAX_LAYERS)
            .build();
        assert!(
            matches!(result, Err(TopologyError::LayerTooHigh { .. })),
            "Expected LayerTooHigh, got {result:?}"
        );
    }

    #[test]
    fn group_needs_capacity() {
        let mut topology = topology();
        let result = topology.new_group("a").build();
        assert!(
            matches!(result, Err(TopologyError::NoCapacity(_))),
            "Expected NoCapacity, got {result:?}"
        );
    }

    #[test]
    fn blocking_unknown_class() {
        let mut topology = topology();
        let result = topology
            .new_group("a")
            .set_capacity(Capacity::new(1))
            .block_traffic_class(TrafficClassId::new(9))
            .build();
        assert!(
            matches!(result, Err(TopologyError::UnknownTrafficClass(_))),
            "Expected UnknownTrafficClass, got {result:?}"
        );
    }

    #[test]
    fn conflicting_traffic_class() {
        let mut topology = topology();
        topology.add_traffic_class(tc(1, 1.0)).unwrap();
        let result = topology.add_traffic_class(tc(1, 2.0));
        assert!(
            matches!(result, Err(TopologyError::ConflictingTrafficClass { .. })),
            "Expected ConflictingTrafficClass, got {result:?}"
        );
    }

    #[test]
    fn source_must_be_attached() {
        let mut topology = topology();
        let result = topology
            .new_source("s", TrafficClassId::new(1), SourceModel::Poisson)
            .build();
        assert!(
            matches!(result, Err(TopologyError::Unattached(_))),
            "Expected Unattached, got {result:?}"
        );
    }

    #[test]
    fn source_to_unknown_group() {
        let mut topology = topology();
        let result = topology
            .new_source("s", TrafficClassId::new(1), SourceModel::Poisson)
            .attach(GroupId::new(3))
            .build();
        assert!(
            matches!(result, Err(TopologyError::UnknownGroup(_))),
            "Expected UnknownGroup, got {result:?}"
        );
    }

    #[test]
    fn source_with_empty_population() {
        let mut topology = topology();
        let g = topology.new_group("g").set_capacity(Capacity::new(1)).build().unwrap();
        let result = topology
            .new_source(
                "s",
                TrafficClassId::new(1),
                SourceModel::Engset {
                    sources: Count::ZERO,
                },
            )
            .attach(g)
            .build();
        assert!(
            matches!(result, Err(TopologyError::Intensity { .. })),
            "Expected Intensity, got {result:?}"
        );
    }

    #[test]
    fn connect_groups() {
        let mut topology = topology();
        let a = topology.new_group("a").set_capacity(Capacity::new(1)).build().unwrap();
        let b = topology.new_group("b").set_capacity(Capacity::new(1)).build().unwrap();
        topology.connect_groups(a, b).unwrap();
        topology.connect_groups(a, b).unwrap();
        assert_eq!(topology.group(a).unwrap().next_groups(), &[b]);
        assert!(topology.connect_groups(a, GroupId::new(7)).is_err());
    }

    #[test]
    fn source_intensity_override() {
        let mut topology = topology();
        let g = topology.new_group("g").set_capacity(Capacity::new(1)).build().unwrap();
        let id = topology
            .new_source("s", TrafficClassId::new(1), SourceModel::Poisson)
            .attach(g)
            .set_intensity(Intensity::new(5.0).unwrap())
            .build()
            .unwrap();
        let source = topology.source(id).unwrap();
        assert_eq!(source.traffic_class().source_intensity.into_f64(), 5.0);
        // the registry is untouched
        let tc = topology.traffic_classes().get(TrafficClassId::new(1)).unwrap();
        assert_eq!(tc.source_intensity.into_f64(), 1.0);
    }
}
