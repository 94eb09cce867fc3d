//! Events of the simulation and the queue that orders them.

mod queue;

pub use self::queue::EventQueue;
use crate::{
    id::{EventId, SourceId},
    load::Load,
    measure::Time,
};
use std::fmt;

/// A unit of future work, processed when the clock reaches `time`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub time: Time,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// a load arrives at (or is offered to) its target group
    ServiceRequest(Load),
    /// a load leaves the group that admitted it
    ServiceEnd(Load),
    /// renewal point of a source stream
    Produce(SourceId),
}

impl Event {
    /// The source stream notified when the event is processed or
    /// skipped.
    pub fn owner(&self) -> SourceId {
        match &self.kind {
            EventKind::ServiceRequest(load) | EventKind::ServiceEnd(load) => load.produced_by,
            EventKind::Produce(source) => *source,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::ServiceRequest(load) => {
                write!(f, "[Event id={} t={} request {}]", self.id, self.time, load)
            }
            EventKind::ServiceEnd(load) => {
                write!(f, "[Event id={} t={} end {}]", self.id, self.time, load)
            }
            EventKind::Produce(source) => {
                write!(f, "[Event id={} t={} produce {}]", self.id, self.time, source)
            }
        }
    }
}
