//! This crate emulates the SDS 940: its instruction engine, address
//! translation, priority interrupts and the channel I/O system.
#![crate_name = "cpu"]

mod alarm;
mod alarmunit;
mod arith;
mod changelog;
mod clock;
mod context;
mod control;
mod diagnostics;
mod interrupt;
pub mod io;
mod memory;
mod memorymap;
mod rtc;
mod sds940;
mod types;

pub use alarm::{Alarm, AlarmDetails, AlarmKind, UnknownAlarmName, UnmaskedAlarm};
pub use alarmunit::AlarmStatus;
pub use clock::{BasicClock, Clock};
pub use context::Context;
pub use control::timing::{estimate_instruction_ns, MEMORY_CYCLE_NS};
pub use control::{ControlRegisters, ControlUnit};
pub use interrupt::{InterruptController, RTC_OVERFLOW_LEVEL, RTC_PULSE_LEVEL};
pub use memory::{MemoryConfiguration, MemorySize, MemoryUnit, UnsupportedMemorySize};
pub use memorymap::{Access, AddressTranslator, Fault, MapRegisters, PageEntry};
pub use rtc::RtcConfiguration;
pub use sds940::{Sds940, StopReason};
pub use types::*;
