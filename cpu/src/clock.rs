//! Simulation of elapsed time in the simulated system.

use std::time::Duration;

/// A source of simulated time for [`crate::Sds940::run_until_stop`].
///
/// Every step of the machine reports how long it took, and the
/// driver hands that duration to `consume`.  An implementation which
/// paces the simulation against the wall clock may block there.
pub trait Clock {
    /// Simulated time since the clock was created.
    fn now(&self) -> Duration;

    /// Advance simulated time by `interval`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use cpu::Clock;
    ///
    /// fn g<C: Clock>(clk: &mut C) {
    ///   // We just executed an LDA instruction, which takes two
    ///   // memory cycles.
    ///   clk.consume(&Duration::from_nanos(3_500));
    /// }
    /// ```
    fn consume(&mut self, interval: &Duration);
}

/// BasicClock provides a simulated clock which never blocks.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use cpu::BasicClock;
/// use cpu::Clock;
/// let mut clk = BasicClock::new();
/// clk.consume(&Duration::from_micros(12));
/// assert_eq!(clk.now(), Duration::from_micros(12));
/// ```
#[derive(Debug)]
pub struct BasicClock {
    /// Elapsed time as measured by the simulated clock.
    simulator_elapsed: Duration,
}

impl BasicClock {
    #[must_use]
    pub fn new() -> BasicClock {
        BasicClock {
            simulator_elapsed: Duration::ZERO,
        }
    }
}

impl Default for BasicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BasicClock {
    fn now(&self) -> Duration {
        self.simulator_elapsed
    }

    fn consume(&mut self, interval: &Duration) {
        self.simulator_elapsed += *interval;
    }
}
