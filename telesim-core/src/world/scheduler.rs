use crate::{
    event::{Event, EventKind, EventQueue},
    id::{EventId, LoadId, UuidGenerator},
    measure::Time,
};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::collections::BTreeSet;
use tracing::trace;

/// The clock, the random engine and the event queue of one world.
///
/// Everything that needs to plan future work or draw a random number
/// during a run receives the scheduler: there is no other source of time,
/// identifiers or randomness.
pub struct Scheduler {
    /// simulation clock, advanced by ticks
    time: Time,
    /// time of the event being processed
    current_time: Time,
    queue: EventQueue,
    /// events cancelled after being scheduled, checked at pop
    skipped: BTreeSet<EventId>,
    uuid: UuidGenerator,
    rng: ChaChaRng,
}

impl Scheduler {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            time: Time::ZERO,
            current_time: Time::ZERO,
            queue: EventQueue::new(),
            skipped: BTreeSet::new(),
            uuid: UuidGenerator::new(),
            rng: ChaChaRng::seed_from_u64(seed),
        }
    }

    /// the simulation clock
    #[inline]
    pub fn time(&self) -> Time {
        self.time
    }

    /// time of the event being (or last) processed
    #[inline]
    pub fn current_time(&self) -> Time {
        self.current_time
    }

    /// number of events waiting in the queue, skipped ones included
    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub(crate) fn rng(&mut self) -> &mut ChaChaRng {
        &mut self.rng
    }

    pub(crate) fn next_load_id(&mut self) -> LoadId {
        LoadId::new(self.uuid.generate())
    }

    /// Queue an event of `kind` due at `time`.
    pub(crate) fn schedule(&mut self, time: Time, kind: EventKind) -> EventId {
        let id = EventId::new(self.uuid.generate());
        let event = Event { id, time, kind };
        trace!(time = %self.current_time, "scheduled {event}");
        self.queue.push(event);
        id
    }

    /// Cancel an already queued event: it will be popped without being
    /// processed.
    pub(crate) fn skip(&mut self, id: EventId) {
        trace!(time = %self.current_time, event = %id, "skip");
        self.skipped.insert(id);
    }

    pub(crate) fn next_event_time(&self) -> Option<Time> {
        self.queue.time_to_next_event()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Move the clock forward to `time`; an earlier time is ignored.
    pub(crate) fn advance_to(&mut self, time: Time) {
        if time > self.time {
            self.time = time;
        }
    }

    /// Pop the next event due at or before the clock, moving the current
    /// time to it. The flag tells whether the event was skipped.
    pub(crate) fn pop_due(&mut self) -> Option<(Event, bool)> {
        let event = self.queue.pop_elapsed(self.time)?;
        self.current_time = event.time;
        let skipped = self.skipped.remove(&event.id);
        Some((event, skipped))
    }
}
