use super::{ActiveUnderflow, Producer};
use crate::{load::Load, measure::Count};

/// Finite population of independent sources.
///
/// An idle source produces after an exponential gap. A source whose load
/// is accepted becomes active until the service ends; a source whose load
/// is lost goes straight back to idle.
#[derive(Debug, Clone)]
pub(super) struct Engset {
    sources: Count,
    active: Count,
}

impl Engset {
    pub(super) fn new(sources: Count) -> Self {
        Self {
            sources,
            active: Count::ZERO,
        }
    }

    pub(super) fn active(&self) -> Count {
        self.active
    }

    pub(super) fn init(&mut self, producer: &mut Producer<'_>) {
        let now = producer.now();
        for _ in 0..self.sources.into_u64() {
            producer.schedule_produce(now);
        }
    }

    pub(super) fn on_produce(&mut self, producer: &mut Producer<'_>) {
        let now = producer.now();
        producer.request(now);
    }

    pub(super) fn on_accept(&mut self) {
        self.active += Count::ONE;
    }

    pub(super) fn on_drop(&mut self, producer: &mut Producer<'_>) {
        let now = producer.now();
        producer.schedule_produce(now);
    }

    pub(super) fn on_service_end(
        &mut self,
        producer: &mut Producer<'_>,
        load: &Load,
    ) -> Result<(), ActiveUnderflow> {
        self.active = self.active.checked_sub(Count::ONE).ok_or(ActiveUnderflow)?;
        let end_time = load.end_time.unwrap_or(producer.now());
        producer.schedule_produce(end_time);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::EventKind,
        measure::Time,
        source::{tests::stream, SourceModel},
        world::{Scheduler, SimulationError},
    };

    fn engset(sources: u64) -> crate::source::SourceStream {
        stream(SourceModel::Engset {
            sources: Count::new(sources),
        })
    }

    #[test]
    fn one_produce_per_source() {
        let mut scheduler = Scheduler::new(0);
        let mut source = engset(5);
        source.init(&mut scheduler);
        assert_eq!(scheduler.pending(), 5);
    }

    #[test]
    fn accepted_source_stays_active_until_service_end() {
        let mut scheduler = Scheduler::new(0);
        let mut source = engset(1);
        source.init(&mut scheduler);

        scheduler.advance_to(Time::new(1_000.0));
        let (produce, _) = scheduler.pop_due().unwrap();
        source.on_produce(&mut scheduler, produce.id);
        let (request, _) = scheduler.pop_due().unwrap();
        let EventKind::ServiceRequest(mut load) = request.kind else {
            panic!("expected a request, got {request}");
        };

        source.on_service_start(&mut scheduler, request.id);
        source.on_accept(&mut scheduler, request.id, load.id);
        assert_eq!(source.active_sources(), Some(Count::ONE));
        // an active source does not produce
        assert!(!scheduler.has_pending());

        load.end_time = Some(load.send_time + crate::measure::Duration::new(1.0));
        source.on_service_end(&mut scheduler, &load).unwrap();
        assert_eq!(source.active_sources(), Some(Count::ZERO));
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn dropped_request_returns_to_idle() {
        let mut scheduler = Scheduler::new(0);
        let mut source = engset(1);
        source.init(&mut scheduler);

        scheduler.advance_to(Time::new(1_000.0));
        let (produce, _) = scheduler.pop_due().unwrap();
        source.on_produce(&mut scheduler, produce.id);
        let (request, _) = scheduler.pop_due().unwrap();
        source.on_service_start(&mut scheduler, request.id);
        source.on_drop(&mut scheduler, request.id);

        assert_eq!(source.active_sources(), Some(Count::ZERO));
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(source.loads_produced(), Count::ONE);
    }

    #[test]
    fn active_underflow_is_an_error() {
        let mut scheduler = Scheduler::new(0);
        let mut source = engset(1);
        let load = Load::new(
            scheduler.next_load_id(),
            source.traffic_class().id,
            Time::ZERO,
            source.traffic_class().size,
            source.id(),
            source.target_group(),
        );
        let result = source.on_service_end(&mut scheduler, &load);
        assert!(
            matches!(result, Err(SimulationError::ActiveSourceUnderflow { .. })),
            "Expected ActiveSourceUnderflow, got {result:?}"
        );
    }
}
