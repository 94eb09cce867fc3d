use super::Producer;

/// Memoryless stream: every renewal point emits a request and plans the
/// next one.
#[derive(Debug, Clone, Copy)]
pub(super) struct Poisson;

impl Poisson {
    pub(super) fn init(&mut self, producer: &mut Producer<'_>) {
        let now = producer.now();
        producer.schedule_produce(now);
    }

    pub(super) fn on_produce(&mut self, producer: &mut Producer<'_>) {
        let now = producer.now();
        if producer.request(now).is_some() {
            producer.schedule_produce(now);
        }
    }
}
