use std::time::Duration;

use tracing::{event, Level};

use base::collections::pq::EarliestFirstQueue;

use super::registry::DeviceId;

/// Something which needs attention at a particular (simulated) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventSource {
    Device(DeviceId),
    RealTimeClock,
}

/// Keeps track of the next time at which each event source needs
/// attention.  Each source has at most one pending event.
#[derive(Debug, Default)]
pub struct EventQueue {
    items: EarliestFirstQueue<EventSource, Duration>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> EventQueue {
        EventQueue {
            items: EarliestFirstQueue::new(),
        }
    }

    /// Schedule (or reschedule) `source` for time `when`.  Returns
    /// the previously scheduled time, if there was one.
    pub fn schedule(&mut self, source: EventSource, when: Duration) -> Option<Duration> {
        let old = self.items.push(source, when);
        if let Some(prev) = old {
            if prev < when {
                event!(
                    Level::DEBUG,
                    "{:?} event time pushed back from {:?} to {:?}",
                    source,
                    prev,
                    when
                );
            }
        }
        old
    }

    pub fn cancel(&mut self, source: EventSource) -> Option<Duration> {
        self.items.remove(&source)
    }

    /// Remove and return the earliest event, if it is due at or
    /// before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(EventSource, Duration)> {
        match self.items.peek() {
            Some((_, when)) if *when <= now => self.items.pop(),
            _ => None,
        }
    }

    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.items.peek().map(|(_, when)| *when)
    }

    pub fn clear(&mut self) {
        self.items = EarliestFirstQueue::new();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[test]
fn test_eventq_empty() {
    let mut q = EventQueue::new();
    assert!(q.is_empty());
    assert_eq!(0, q.len());
    assert_eq!(q.next_due(), None);
    assert_eq!(q.pop_due(Duration::MAX), None);
}

#[test]
fn test_eventq_repeat_schedule() {
    let mut q = EventQueue::new();
    let rtc = EventSource::RealTimeClock;
    assert_eq!(q.schedule(rtc, Duration::from_micros(200)), None);
    assert_eq!(
        q.schedule(rtc, Duration::from_micros(400)),
        Some(Duration::from_micros(200))
    );
    assert_eq!(
        q.schedule(rtc, Duration::from_micros(300)),
        Some(Duration::from_micros(400))
    );
    assert_eq!(q.len(), 1);
    assert_eq!(q.pop_due(Duration::from_micros(299)), None);
    assert_eq!(
        q.pop_due(Duration::from_micros(300)),
        Some((rtc, Duration::from_micros(300)))
    );
    assert!(q.is_empty());
}

#[test]
fn test_eventq_earliest_first() {
    let mut q = EventQueue::new();
    let dev = EventSource::Device(DeviceId::new(0));
    q.schedule(EventSource::RealTimeClock, Duration::from_millis(16));
    q.schedule(dev, Duration::from_millis(2));
    assert_eq!(q.next_due(), Some(Duration::from_millis(2)));
    assert_eq!(
        q.pop_due(Duration::from_secs(1)),
        Some((dev, Duration::from_millis(2)))
    );
    assert_eq!(q.cancel(EventSource::RealTimeClock), Some(Duration::from_millis(16)));
    assert!(q.is_empty());
}
