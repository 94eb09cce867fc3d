use super::{ActiveUnderflow, Producer};
use crate::{
    id::{EventId, LoadId},
    load::Load,
    measure::Count,
};
use std::collections::BTreeMap;
use tracing::trace;

/// Growing population of sources.
///
/// Every request spawns a new produce process. While a load is in service
/// it additionally spawns a produce process *linked* to it: the chain of
/// events that descend from that process is cancelled as soon as the load
/// leaves service.
#[derive(Debug, Clone)]
pub(super) struct Pascal {
    sources: Count,
    active: Count,
    /// queued events descending from a load still in service
    linked: BTreeMap<LoadId, Vec<EventId>>,
    /// reverse index of `linked`
    link_of: BTreeMap<EventId, LoadId>,
}

impl Pascal {
    pub(super) fn new(sources: Count) -> Self {
        Self {
            sources,
            active: Count::ZERO,
            linked: BTreeMap::new(),
            link_of: BTreeMap::new(),
        }
    }

    pub(super) fn active(&self) -> Count {
        self.active
    }

    fn link(&mut self, load: LoadId, event: EventId) {
        trace!(load = %load, event = %event, "link");
        self.linked.entry(load).or_default().push(event);
        self.link_of.insert(event, load);
    }

    fn unlink(&mut self, event: EventId) -> Option<LoadId> {
        let load = self.link_of.remove(&event)?;
        if let Some(events) = self.linked.get_mut(&load) {
            events.retain(|linked| *linked != event);
            if events.is_empty() {
                self.linked.remove(&load);
            }
        }
        Some(load)
    }

    pub(super) fn init(&mut self, producer: &mut Producer<'_>) {
        let now = producer.now();
        for _ in 0..self.sources.into_u64() {
            producer.schedule_produce(now);
        }
    }

    /// The request inherits the link of the produce event it comes from.
    pub(super) fn on_produce(&mut self, producer: &mut Producer<'_>, event: EventId) {
        let now = producer.now();
        let request = producer.request(now);
        if let Some(load) = self.unlink(event)
            && let Some(request) = request
        {
            self.link(load, request);
        }
    }

    pub(super) fn on_service_start(&mut self, producer: &mut Producer<'_>, request: EventId) {
        let now = producer.now();
        let produce = producer.schedule_produce(now);
        if let Some(load) = self.link_of.get(&request).copied() {
            self.link(load, produce);
        }
    }

    pub(super) fn on_accept(&mut self, producer: &mut Producer<'_>, request: EventId, load: LoadId) {
        self.active += Count::ONE;
        self.unlink(request);
        let now = producer.now();
        let produce = producer.schedule_produce(now);
        self.link(load, produce);
    }

    pub(super) fn on_drop(&mut self, request: EventId) {
        self.unlink(request);
    }

    /// Cancel everything still linked to the load leaving service.
    pub(super) fn on_service_end(
        &mut self,
        producer: &mut Producer<'_>,
        load: &Load,
    ) -> Result<(), ActiveUnderflow> {
        self.active = self.active.checked_sub(Count::ONE).ok_or(ActiveUnderflow)?;
        for event in self.linked.remove(&load.id).unwrap_or_default() {
            self.link_of.remove(&event);
            producer.scheduler.skip(event);
        }
        Ok(())
    }

    pub(super) fn on_skip(&mut self, event: EventId) {
        self.unlink(event);
    }

    #[cfg(test)]
    fn linked_events(&self) -> usize {
        self.link_of.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::EventKind,
        measure::{Duration, Time},
        source::{tests::stream, SourceModel, SourceState, SourceStream},
        world::Scheduler,
    };

    fn pascal(sources: u64) -> SourceStream {
        stream(SourceModel::Pascal {
            sources: Count::new(sources),
        })
    }

    fn linked_events(source: &SourceStream) -> usize {
        match &source.state {
            SourceState::Pascal(pascal) => pascal.linked_events(),
            _ => unreachable!(),
        }
    }

    /// init, then produce, then pop the resulting request
    fn first_request(scheduler: &mut Scheduler, source: &mut SourceStream) -> (EventId, Load) {
        source.init(scheduler);
        scheduler.advance_to(Time::new(1_000.0));
        let (produce, _) = scheduler.pop_due().unwrap();
        source.on_produce(scheduler, produce.id);
        let (request, _) = scheduler.pop_due().unwrap();
        let EventKind::ServiceRequest(load) = request.kind else {
            panic!("expected a request");
        };
        (request.id, load)
    }

    #[test]
    fn every_request_spawns_a_produce() {
        let mut scheduler = Scheduler::new(0);
        let mut source = pascal(1);
        let (request, _) = first_request(&mut scheduler, &mut source);

        source.on_service_start(&mut scheduler, request);
        source.on_drop(&mut scheduler, request);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(linked_events(&source), 0);
    }

    #[test]
    fn linked_events_are_cancelled_at_service_end() {
        let mut scheduler = Scheduler::new(0);
        let mut source = pascal(1);
        let (request, mut load) = first_request(&mut scheduler, &mut source);

        source.on_service_start(&mut scheduler, request);
        source.on_accept(&mut scheduler, request, load.id);
        assert_eq!(source.active_sources(), Some(Count::ONE));
        assert_eq!(scheduler.pending(), 2);
        assert_eq!(linked_events(&source), 1);

        load.end_time = Some(load.send_time + Duration::new(0.1));
        source.on_service_end(&mut scheduler, &load).unwrap();
        assert_eq!(source.active_sources(), Some(Count::ZERO));
        assert_eq!(linked_events(&source), 0);

        // both produce events are still queued, the linked one is skipped
        scheduler.advance_to(Time::new(1_000_000.0));
        let skipped: Vec<bool> = std::iter::from_fn(|| scheduler.pop_due())
            .map(|(_, skipped)| skipped)
            .collect();
        assert_eq!(skipped.iter().filter(|s| **s).count(), 1);
        assert_eq!(skipped.len(), 2);
    }

    #[test]
    fn link_is_inherited_by_the_next_request() {
        let mut scheduler = Scheduler::new(0);
        let mut source = pascal(1);
        let (request, load) = first_request(&mut scheduler, &mut source);

        source.on_service_start(&mut scheduler, request);
        source.on_accept(&mut scheduler, request, load.id);

        // fire every queued produce: the linked one hands its link over
        // to the request it emits
        let mut produced = Vec::new();
        scheduler.advance_to(Time::new(1_000_000.0));
        while let Some((event, _)) = scheduler.pop_due() {
            if let EventKind::Produce(_) = event.kind {
                source.on_produce(&mut scheduler, event.id);
            } else {
                produced.push(event.id);
            }
        }
        assert_eq!(produced.len(), 2);
        assert_eq!(linked_events(&source), 1);
    }
}
