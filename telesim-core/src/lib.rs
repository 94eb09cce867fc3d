/*!
# Loss network simulator engine

A deterministic discrete-event engine for teletraffic loss networks:
[resource groups](group::Group) with finite capacity admit or refuse
[loads](load::Load) produced by [source streams](source::SourceStream),
refused loads may [overflow](overflow::OverflowPolicy) to downstream
groups, and every outcome is accounted in the [statistics](stats::Stats).

1. assemble a [`Topology`]: traffic classes, groups, connections and
   sources;
2. hand it to a [`World`] with a [`WorldConfig`];
3. [`World::run`] it and read the returned [`Stats`].

Two worlds built from the same topology and configuration produce
identical statistics. The [`analytic`] module offers the closed-form
models the simulated results are usually compared against.
*/

pub mod analytic;
pub mod defaults;
pub mod event;
pub mod group;
pub mod id;
pub mod load;
pub mod measure;
pub mod overflow;
pub mod random;
pub mod source;
pub mod stats;
pub mod topology;
pub mod traffic_class;
pub mod world;

pub use self::{
    id::{GroupId, LoadId, SourceId},
    measure::{Capacity, Count, Duration, Intensity, Probability, Size, Time},
    overflow::OverflowPolicy,
    source::SourceModel,
    stats::Stats,
    topology::{Topology, TopologyError},
    traffic_class::{TrafficClass, TrafficClassId},
    world::{SimulationError, World, WorldConfig},
};
