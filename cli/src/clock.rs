//! A simulated clock which can be slowed down to track real time.
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{event, Level};

use cpu::{BasicClock, Clock};

/// Wraps a [`BasicClock`].  When a speed multiplier is set, calls to
/// `consume` sleep so that simulated time passes at `multiplier`
/// times the rate of real time.  We only sleep once the simulation
/// is at least `min_sleep` ahead, to keep the number of system calls
/// down.
#[derive(Debug)]
pub struct PacedClock {
    inner: BasicClock,
    multiplier: Option<f64>,
    min_sleep: Duration,
    started: Instant,
    total_sleep: Duration,
}

impl PacedClock {
    pub fn new(multiplier: Option<f64>, min_sleep: Duration) -> PacedClock {
        PacedClock {
            inner: BasicClock::new(),
            multiplier,
            min_sleep,
            started: Instant::now(),
            total_sleep: Duration::ZERO,
        }
    }

    fn pace(&mut self, multiplier: f64) {
        let due = self.inner.now().div_f64(multiplier);
        let elapsed = self.started.elapsed();
        match due.checked_sub(elapsed) {
            Some(ahead) if ahead > self.min_sleep => {
                event!(Level::TRACE, "sleeping for {:?}", ahead);
                sleep(ahead);
                self.total_sleep += ahead;
            }
            _ => (),
        }
    }
}

impl Clock for PacedClock {
    fn now(&self) -> Duration {
        self.inner.now()
    }

    fn consume(&mut self, interval: &Duration) {
        self.inner.consume(interval);
        if let Some(m) = self.multiplier {
            self.pace(m);
        }
    }
}

impl Drop for PacedClock {
    fn drop(&mut self) {
        event!(
            Level::DEBUG,
            "total time spent sleeping was {:?}",
            self.total_sleep
        );
    }
}

#[test]
fn test_unpaced_clock_does_not_sleep() {
    let mut clk = PacedClock::new(None, Duration::from_millis(1));
    clk.consume(&Duration::from_secs(100));
    assert_eq!(clk.now(), Duration::from_secs(100));
    assert_eq!(clk.total_sleep, Duration::ZERO);
}

#[test]
fn test_fast_clock_sleeps_little() {
    let mut clk = PacedClock::new(Some(1000.0), Duration::from_millis(1));
    clk.consume(&Duration::from_millis(20));
    assert_eq!(clk.now(), Duration::from_millis(20));
    assert!(clk.total_sleep <= Duration::from_micros(20));
}
