//! Traffic generators.
//!
//! A [`SourceStream`] produces the loads of one [`TrafficClass`] towards
//! one target group. Its renewal process is driven by the notifications
//! the world sends it while processing its events:
//!
//! ```text
//! init ──► Produce ──► ServiceRequest ──► service start
//!                                          ├── accept ──► ServiceEnd ──► service end
//!                                          └── drop
//! ```
//!
//! Each model reacts to a different subset of those notifications, see
//! [`SourceModel`].

mod engset;
mod pascal;
mod poisson;

use self::{engset::Engset, pascal::Pascal, poisson::Poisson};
use crate::{
    event::EventKind,
    id::{EventId, GroupId, LoadId, SourceId},
    load::Load,
    measure::{Count, Intensity, IntensityError, Time},
    random::exponential,
    traffic_class::TrafficClass,
    world::{Scheduler, SimulationError},
};
use std::fmt;
use tracing::debug;

/// The stochastic model of a source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceModel {
    /// infinite population, arrivals at rate λ
    Poisson,
    /// `sources` independent sources, each producing at rate λ/N while
    /// idle
    Engset { sources: Count },
    /// `sources` initial sources at rate λ/S; every request spawns a
    /// new source and every load in service spawns a linked one
    Pascal { sources: Count },
}

#[derive(Debug, Clone)]
enum SourceState {
    Poisson(Poisson),
    Engset(Engset),
    Pascal(Pascal),
}

/// # Traffic generator
///
/// Bound to exactly one [`TrafficClass`] and one target group. Created
/// through [`Topology::new_source`].
///
/// [`Topology::new_source`]: crate::topology::Topology::new_source
#[derive(Debug, Clone)]
pub struct SourceStream {
    id: SourceId,
    name: String,
    tc: TrafficClass,
    target_group: GroupId,
    model: SourceModel,
    /// rate of one produce process
    intensity: Intensity,
    state: SourceState,
    paused: bool,
    loads_produced: Count,
}

/// What a model can do while reacting to a notification: plan its next
/// renewal point or emit a request.
pub(crate) struct Producer<'a> {
    id: SourceId,
    tc: &'a TrafficClass,
    target_group: GroupId,
    intensity: Intensity,
    paused: bool,
    scheduler: &'a mut Scheduler,
}

impl Producer<'_> {
    /// Schedule a produce event one exponential gap after `time`.
    fn schedule_produce(&mut self, time: Time) -> EventId {
        let gap = exponential(self.scheduler.rng(), self.intensity);
        self.scheduler.schedule(time + gap, EventKind::Produce(self.id))
    }

    /// Emit a new load at `time`. Nothing is emitted once paused.
    fn request(&mut self, time: Time) -> Option<EventId> {
        if self.paused {
            return None;
        }
        let load = Load::new(
            self.scheduler.next_load_id(),
            self.tc.id,
            time,
            self.tc.size,
            self.id,
            self.target_group,
        );
        debug!(time = %time, source = %self.id, "produced {load}");
        Some(self.scheduler.schedule(time, EventKind::ServiceRequest(load)))
    }

    fn now(&self) -> Time {
        self.scheduler.current_time()
    }
}

impl SourceStream {
    pub(crate) fn new(
        id: SourceId,
        name: String,
        tc: TrafficClass,
        target_group: GroupId,
        model: SourceModel,
    ) -> Result<Self, IntensityError> {
        let (intensity, state) = match model {
            SourceModel::Poisson => (tc.source_intensity, SourceState::Poisson(Poisson)),
            SourceModel::Engset { sources } => (
                tc.source_intensity.per_source(sources)?,
                SourceState::Engset(Engset::new(sources)),
            ),
            SourceModel::Pascal { sources } => (
                tc.source_intensity.per_source(sources)?,
                SourceState::Pascal(Pascal::new(sources)),
            ),
        };
        Ok(Self {
            id,
            name,
            tc,
            target_group,
            model,
            intensity,
            state,
            paused: false,
            loads_produced: Count::ZERO,
        })
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn traffic_class(&self) -> &TrafficClass {
        &self.tc
    }

    pub fn target_group(&self) -> GroupId {
        self.target_group
    }

    pub fn model(&self) -> SourceModel {
        self.model
    }

    /// loads that reached their target group
    pub fn loads_produced(&self) -> Count {
        self.loads_produced
    }

    /// sources currently having a load in service (finite population
    /// models only)
    pub fn active_sources(&self) -> Option<Count> {
        match &self.state {
            SourceState::Poisson(_) => None,
            SourceState::Engset(engset) => Some(engset.active()),
            SourceState::Pascal(pascal) => Some(pascal.active()),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop emitting new requests. Already queued events still fire.
    pub(crate) fn pause(&mut self) {
        self.paused = true;
    }

    fn split<'a>(&'a mut self, scheduler: &'a mut Scheduler) -> (&'a mut SourceState, Producer<'a>) {
        let producer = Producer {
            id: self.id,
            tc: &self.tc,
            target_group: self.target_group,
            intensity: self.intensity,
            paused: self.paused,
            scheduler,
        };
        (&mut self.state, producer)
    }

    pub(crate) fn init(&mut self, scheduler: &mut Scheduler) {
        let (state, mut producer) = self.split(scheduler);
        match state {
            SourceState::Poisson(poisson) => poisson.init(&mut producer),
            SourceState::Engset(engset) => engset.init(&mut producer),
            SourceState::Pascal(pascal) => pascal.init(&mut producer),
        }
    }

    pub(crate) fn on_produce(&mut self, scheduler: &mut Scheduler, event: EventId) {
        let (state, mut producer) = self.split(scheduler);
        match state {
            SourceState::Poisson(poisson) => poisson.on_produce(&mut producer),
            SourceState::Engset(engset) => engset.on_produce(&mut producer),
            SourceState::Pascal(pascal) => pascal.on_produce(&mut producer, event),
        }
    }

    pub(crate) fn on_service_start(&mut self, scheduler: &mut Scheduler, request: EventId) {
        self.loads_produced += Count::ONE;
        let (state, mut producer) = self.split(scheduler);
        if let SourceState::Pascal(pascal) = state {
            pascal.on_service_start(&mut producer, request);
        }
    }

    pub(crate) fn on_accept(&mut self, scheduler: &mut Scheduler, request: EventId, load: LoadId) {
        let (state, mut producer) = self.split(scheduler);
        match state {
            SourceState::Poisson(_) => {}
            SourceState::Engset(engset) => engset.on_accept(),
            SourceState::Pascal(pascal) => pascal.on_accept(&mut producer, request, load),
        }
    }

    pub(crate) fn on_drop(&mut self, scheduler: &mut Scheduler, request: EventId) {
        let (state, mut producer) = self.split(scheduler);
        match state {
            SourceState::Poisson(_) => {}
            SourceState::Engset(engset) => engset.on_drop(&mut producer),
            SourceState::Pascal(pascal) => pascal.on_drop(request),
        }
    }

    pub(crate) fn on_service_end(
        &mut self,
        scheduler: &mut Scheduler,
        load: &Load,
    ) -> Result<(), SimulationError> {
        let id = self.id;
        let (state, mut producer) = self.split(scheduler);
        let result = match state {
            SourceState::Poisson(_) => Ok(()),
            SourceState::Engset(engset) => engset.on_service_end(&mut producer, load),
            SourceState::Pascal(pascal) => pascal.on_service_end(&mut producer, load),
        };
        result.map_err(|ActiveUnderflow| SimulationError::ActiveSourceUnderflow {
            stream: id,
            load: load.id,
        })
    }

    pub(crate) fn on_skip(&mut self, event: EventId) {
        if let SourceState::Pascal(pascal) = &mut self.state {
            pascal.on_skip(event);
        }
    }
}

/// A load ended while no source was active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ActiveUnderflow;

impl fmt::Display for SourceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poisson => f.write_str("poisson"),
            Self::Engset { sources } => write!(f, "engset N={sources}"),
            Self::Pascal { sources } => write!(f, "pascal S={sources}"),
        }
    }
}

impl fmt::Display for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Source {} {} {}]", self.id, self.name, self.model)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        measure::Size,
        traffic_class::TrafficClassId,
    };

    pub(crate) fn tc(lambda: f64) -> TrafficClass {
        TrafficClass::new(
            TrafficClassId::new(1),
            Intensity::new(lambda).unwrap(),
            Intensity::new(1.0).unwrap(),
            Size::new(1),
        )
    }

    pub(crate) fn stream(model: SourceModel) -> SourceStream {
        SourceStream::new(SourceId::new(0), "s".to_owned(), tc(2.0), GroupId::new(0), model)
            .unwrap()
    }

    /// Pop every due event up to `until`, returning them in order.
    pub(crate) fn drain(scheduler: &mut Scheduler, until: f64) -> Vec<(crate::event::Event, bool)> {
        scheduler.advance_to(Time::new(until));
        std::iter::from_fn(|| scheduler.pop_due()).collect()
    }

    #[test]
    fn per_source_intensity() {
        let engset = stream(SourceModel::Engset {
            sources: Count::new(4),
        });
        assert_eq!(engset.intensity.into_f64(), 0.5);
        let poisson = stream(SourceModel::Poisson);
        assert_eq!(poisson.intensity.into_f64(), 2.0);
    }

    #[test]
    fn empty_population_is_rejected() {
        let result = SourceStream::new(
            SourceId::new(0),
            "s".to_owned(),
            tc(2.0),
            GroupId::new(0),
            SourceModel::Pascal {
                sources: Count::ZERO,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn paused_stream_emits_nothing() {
        let mut scheduler = Scheduler::new(1);
        let mut source = stream(SourceModel::Poisson);
        source.init(&mut scheduler);
        source.pause();

        let events = drain(&mut scheduler, 1_000.0);
        assert_eq!(events.len(), 1);
        let (produce, _) = &events[0];
        source.on_produce(&mut scheduler, produce.id);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn display() {
        assert_eq!(
            stream(SourceModel::Engset {
                sources: Count::new(3)
            })
            .to_string(),
            "[Source S0 s engset N=3]"
        );
    }
}
