//! The priority interrupt system.
//!
//! There are 31 interrupt levels, numbered 1 to 31; level 31 has the
//! highest priority and level 0 does not exist.  A level which has
//! been requested is accepted (between instructions) only if it has
//! higher priority than every level which is currently active.
//! Accepting a level makes it active; BRI dismisses the highest
//! active level.
use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

/// The real-time clock requests this level on each pulse.
pub const RTC_PULSE_LEVEL: Unsigned5Bit = u5!(31);
/// The real-time clock's counter-overflow level.
pub const RTC_OVERFLOW_LEVEL: Unsigned5Bit = u5!(30);

/// Physical location of the vector word for interrupt level 0; level
/// `L` uses the following location `L`.
pub const INTERRUPT_VECTOR_BASE: u32 = 0o200;

/// The channel interrupt levels.  Channel `c` uses three levels,
/// starting at `29 - 3c` and working downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelInterrupt {
    EndOfRecord,
    ZeroWordCount,
    DataChain,
}

impl ChannelInterrupt {
    #[must_use]
    pub fn level(&self, channel: Unsigned3Bit) -> Unsigned5Bit {
        let base = 29 - 3 * u8::from(channel);
        let offset = match self {
            ChannelInterrupt::EndOfRecord => 0,
            ChannelInterrupt::ZeroWordCount => 1,
            ChannelInterrupt::DataChain => 2,
        };
        Unsigned5Bit::from_low_bits(u64::from(base - offset))
    }
}

/// `mask[l]` keeps only the levels of higher priority than `l`.
const fn build_priority_masks() -> [u32; 32] {
    let mut masks = [0_u32; 32];
    let mut level = 0;
    while level < 31 {
        masks[level] = !((2_u32 << level) - 1);
        level += 1;
    }
    masks
}

const PRIORITY_MASKS: [u32; 32] = build_priority_masks();

fn bit(level: Unsigned5Bit) -> u32 {
    1_u32 << u32::from(level)
}

fn highest_set(bits: u32) -> Unsigned5Bit {
    if bits == 0 {
        Unsigned5Bit::ZERO
    } else {
        Unsigned5Bit::from_low_bits(u64::from(31 - bits.leading_zeros()))
    }
}

#[derive(Debug, Default, Serialize)]
pub struct InterruptController {
    requests: u32,
    active: u32,
    highest_active: Unsigned5Bit,
    enabled: bool,
    deferred: bool,
}

impl InterruptController {
    #[must_use]
    pub fn new() -> InterruptController {
        InterruptController::default()
    }

    pub fn reset(&mut self) {
        *self = InterruptController::default();
    }

    /// Request an interrupt on `level`.  Requests for level 0 are
    /// ignored, since there is no such level.
    pub fn request(&mut self, level: Unsigned5Bit) {
        if level.is_zero() {
            event!(Level::WARN, "ignoring request for interrupt level 0");
            return;
        }
        if self.requests & bit(level) == 0 {
            event!(Level::TRACE, "interrupt level {level} requested");
        }
        self.requests |= bit(level);
    }

    pub fn cancel_request(&mut self, level: Unsigned5Bit) {
        self.requests &= !bit(level);
    }

    #[must_use]
    pub fn is_requested(&self, level: Unsigned5Bit) -> bool {
        self.requests & bit(level) != 0
    }

    #[must_use]
    pub fn is_active(&self, level: Unsigned5Bit) -> bool {
        self.active & bit(level) != 0
    }

    /// The highest requested level with higher priority than the
    /// highest active level, or zero if there is none.  This does
    /// not consider whether interrupts are enabled.
    #[must_use]
    pub fn find_highest_request(&self) -> Unsigned5Bit {
        let mask = PRIORITY_MASKS[usize::from(self.highest_active)];
        highest_set(self.requests & mask)
    }

    /// The level to accept before the next instruction, if any.
    /// This consumes a pending one-instruction deferral.
    pub fn next_acceptable(&mut self) -> Option<Unsigned5Bit> {
        if !self.enabled {
            return None;
        }
        if self.deferred {
            self.deferred = false;
            return None;
        }
        let level = self.find_highest_request();
        if level.is_zero() {
            None
        } else {
            Some(level)
        }
    }

    /// Mark `level` as active.
    pub fn accept(&mut self, level: Unsigned5Bit) {
        event!(Level::DEBUG, "accepting interrupt level {level}");
        self.active |= bit(level);
        self.highest_active = highest_set(self.active);
    }

    /// Clear the request and active bits of the highest active level,
    /// returning that level.  Does nothing when no level is active.
    pub fn dismiss(&mut self) -> Option<Unsigned5Bit> {
        if self.active == 0 {
            return None;
        }
        let level = self.highest_active;
        self.active &= !bit(level);
        self.requests &= !bit(level);
        self.highest_active = highest_set(self.active);
        event!(Level::DEBUG, "dismissed interrupt level {level}");
        Some(level)
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Ensure that the next instruction executes before any
    /// interrupt is accepted.
    pub fn defer_next(&mut self) {
        self.deferred = true;
    }

    #[must_use]
    pub fn highest_active(&self) -> Unsigned5Bit {
        self.highest_active
    }
}
