//! The real-time clock.
//!
//! The clock pulses at the power-line frequency.  Each pulse
//! requests interrupt level 31, whose vector holds a single MIN or
//! SKR instruction which counts the pulses (see the control unit).
use std::time::Duration;

use serde::Serialize;
use tracing::{event, Level};

use crate::interrupt::{InterruptController, RTC_PULSE_LEVEL};
use crate::io::{EventQueue, EventSource};

#[derive(Debug, Clone, Serialize)]
pub struct RtcConfiguration {
    pub enabled: bool,
    /// Simulated time between pulses.
    pub period: Duration,
}

impl Default for RtcConfiguration {
    fn default() -> RtcConfiguration {
        RtcConfiguration {
            enabled: true,
            period: Duration::from_nanos(16_666_667),
        }
    }
}

#[derive(Debug)]
pub struct RealTimeClock {
    config: RtcConfiguration,
}

impl RealTimeClock {
    #[must_use]
    pub fn new(config: RtcConfiguration) -> RealTimeClock {
        RealTimeClock { config }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, now: Duration, enabled: bool, events: &mut EventQueue) {
        self.config.enabled = enabled;
        if enabled {
            self.start(now, events);
        } else {
            events.cancel(EventSource::RealTimeClock);
        }
    }

    /// Schedule the first pulse.
    pub fn start(&self, now: Duration, events: &mut EventQueue) {
        if self.config.enabled {
            events.schedule(EventSource::RealTimeClock, now + self.config.period);
        }
    }

    /// Handle the pulse which was due at `due`, and schedule the next
    /// one.
    pub fn on_pulse(
        &self,
        due: Duration,
        interrupts: &mut InterruptController,
        events: &mut EventQueue,
    ) {
        if !self.config.enabled {
            return;
        }
        event!(Level::TRACE, "real-time clock pulse at {:?}", due);
        interrupts.request(RTC_PULSE_LEVEL);
        events.schedule(EventSource::RealTimeClock, due + self.config.period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulses_are_periodic() {
        let rtc = RealTimeClock::new(RtcConfiguration {
            enabled: true,
            period: Duration::from_millis(10),
        });
        let mut events = EventQueue::new();
        let mut interrupts = InterruptController::new();
        rtc.start(Duration::from_millis(3), &mut events);
        assert_eq!(events.next_due(), Some(Duration::from_millis(13)));
        assert_eq!(events.pop_due(Duration::from_millis(12)), None);
        let (source, due) = events
            .pop_due(Duration::from_millis(14))
            .expect("pulse should be due");
        assert_eq!(source, EventSource::RealTimeClock);
        rtc.on_pulse(due, &mut interrupts, &mut events);
        assert!(interrupts.is_requested(RTC_PULSE_LEVEL));
        assert_eq!(events.next_due(), Some(Duration::from_millis(23)));
    }

    #[test]
    fn test_disabled_clock_does_not_pulse() {
        let mut rtc = RealTimeClock::new(RtcConfiguration {
            enabled: false,
            ..RtcConfiguration::default()
        });
        let mut events = EventQueue::new();
        rtc.start(Duration::ZERO, &mut events);
        assert_eq!(events.next_due(), None);
        rtc.set_enabled(Duration::ZERO, true, &mut events);
        assert_eq!(
            events.next_due(),
            Some(RtcConfiguration::default().period)
        );
        rtc.set_enabled(Duration::ZERO, false, &mut events);
        assert_eq!(events.next_due(), None);
    }
}
