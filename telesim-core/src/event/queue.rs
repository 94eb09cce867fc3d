use crate::{event::Event, id::EventId, measure::Time};
use core::cmp::Reverse;
use std::collections::BinaryHeap;

/// Future events, popped in `(time, id)` order.
pub struct EventQueue {
    map: BinaryHeap<Reverse<OrderedByTime>>,
}

struct OrderedByTime(Event);

impl OrderedByTime {
    fn key(&self) -> (Time, EventId) {
        (self.0.time, self.0.id)
    }

    fn into_inner(self) -> Event {
        self.0
    }
}

impl PartialEq for OrderedByTime {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OrderedByTime {}

impl PartialOrd for OrderedByTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedByTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            map: BinaryHeap::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn time_to_next_event(&self) -> Option<Time> {
        self.map.peek().map(|v| v.0.0.time)
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.map.pop().map(|v| v.0.into_inner())
    }

    /// Pop the earliest event if it is due at or before `time`.
    pub fn pop_elapsed(&mut self, time: Time) -> Option<Event> {
        match self.time_to_next_event() {
            Some(next) if next <= time => self.pop(),
            _ => None,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.map.push(Reverse(OrderedByTime(event)))
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event::EventKind, id::SourceId};

    fn produce(id: u64, time: f64) -> Event {
        Event {
            id: EventId::new(id),
            time: Time::new(time),
            kind: EventKind::Produce(SourceId::new(0)),
        }
    }

    #[test]
    fn empty() {
        let mut c = EventQueue::new();

        assert!(c.is_empty());
        assert_eq!(c.len(), 0);
        assert!(c.pop().is_none());
        assert!(c.time_to_next_event().is_none());
    }

    #[test]
    fn entry() {
        let mut c = EventQueue::new();
        c.push(produce(1, 1.0));

        assert!(!c.is_empty());
        assert_eq!(c.len(), 1);
        assert_eq!(c.time_to_next_event(), Some(Time::new(1.0)));

        assert!(c.pop_elapsed(Time::new(0.5)).is_none());
        let event = c
            .pop_elapsed(Time::new(1.0))
            .expect("the event is due at the current time");
        assert_eq!(event.id, EventId::new(1));
        assert!(c.is_empty());
    }

    #[test]
    fn ordered_by_time_then_id() {
        let mut c = EventQueue::new();
        c.push(produce(4, 2.0));
        c.push(produce(3, 1.0));
        c.push(produce(1, 2.0));
        c.push(produce(2, 1.0));

        let order: Vec<EventId> = std::iter::from_fn(|| c.pop()).map(|e| e.id).collect();
        assert_eq!(
            order,
            vec![EventId::new(2), EventId::new(3), EventId::new(1), EventId::new(4)]
        );
    }
}
