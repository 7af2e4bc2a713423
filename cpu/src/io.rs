//! This module simulates the SDS 940's I/O system: the eight buffer
//! channels (W, Y and C through H), the devices attached to them, and
//! the alert mechanism used by PIN and POT.
//!
//! ## Device numbers
//!
//! A device is selected by a channel number and a six-bit device
//! number.  Bit 5 of the device number is the direction (set for
//! output), so an input/output device such as a teletype occupies
//! two device numbers.  Device number 0 is not a device; connecting
//! it disconnects the channel.
//!
//! ## Characters
//!
//! Channels move characters of 6, 12 or 24 bits between memory and a
//! device.  A channel packs (or unpacks) between 1 and 4 characters
//! per word in its word-assembly register.
use std::error;
use std::fmt::{self, Debug, Display, Formatter};
use std::time::Duration;

use base::prelude::*;

use crate::context::Context;

mod alert;
mod channel;
mod eventq;
mod registry;
mod subsystem;

#[cfg(test)]
pub(crate) mod testdevice;

pub use alert::{AlertRegister, AlertTarget};
pub use channel::{ArmedInterrupts, Channel, ChannelFlags, TransferFunction};
pub use eventq::{EventQueue, EventSource};
pub use registry::{DeviceId, DispatchRegistry, RegistryError};
pub use subsystem::IoSubsystem;

pub(crate) use subsystem::IoFailure;

/// Bit 5 of a device number selects output.
pub const OUTPUT_DIRECTION_BIT: u8 = 0o40;

/// The width of the characters a channel transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterWidth {
    Six,
    Twelve,
    TwentyFour,
}

impl CharacterWidth {
    #[must_use]
    pub fn bits(&self) -> u32 {
        match self {
            CharacterWidth::Six => 6,
            CharacterWidth::Twelve => 12,
            CharacterWidth::TwentyFour => 24,
        }
    }

    /// The largest number of characters of this width that fit in a
    /// word.
    #[must_use]
    pub fn per_word(&self) -> u8 {
        match self {
            CharacterWidth::Six => 4,
            CharacterWidth::Twelve => 2,
            CharacterWidth::TwentyFour => 1,
        }
    }
}

/// The parameters of a connect (EOM mode 0) as they are passed to
/// a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRequest {
    pub channel: Unsigned3Bit,
    pub unit: Unsigned6Bit,
    pub chars_per_word: u8,
    pub width: CharacterWidth,
    pub scan: bool,
}

/// Which directions a device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directions {
    Input,
    Output,
    Both,
}

/// The device numbers a device answers to on its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub channel: Unsigned3Bit,
    /// The lowest device number, excluding the direction bit.
    pub base: Unsigned5Bit,
    pub count: u8,
    pub directions: Directions,
}

impl AddressRange {
    /// Returns false if the range runs past device number 37.
    #[must_use]
    pub fn fits(&self) -> bool {
        u16::from(u8::from(self.base)) + u16::from(self.count) <= 0o40
    }

    /// All the device numbers in the range, including the direction
    /// bit.  Numbers which would not fit in five bits are omitted, so
    /// check `fits` first.
    #[must_use]
    pub fn units(&self) -> Vec<Unsigned6Bit> {
        let base = u8::from(self.base);
        let mut result = Vec::new();
        for n in (0..self.count).filter_map(|i| base.checked_add(i).filter(|n| *n < 0o40)) {
            if matches!(self.directions, Directions::Input | Directions::Both) {
                result.push(Unsigned6Bit::from_low_bits(u64::from(n)));
            }
            if matches!(self.directions, Directions::Output | Directions::Both) {
                result.push(Unsigned6Bit::from_low_bits(u64::from(
                    n | OUTPUT_DIRECTION_BIT,
                )));
            }
        }
        result
    }
}

/// Returns true if `unit` is an output device number.
#[must_use]
pub fn is_output_unit(unit: Unsigned6Bit) -> bool {
    u8::from(unit) & OUTPUT_DIRECTION_BIT != 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Char(Unsigned24Bit),
    /// The device has no character yet; the channel tries again
    /// later.
    NotReady,
    /// The device reached the end of a record.
    EndOfRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    NotReady,
}

/// Failures reported by devices.  The channel absorbs these: they
/// set the channel's error flag and end the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// There is no medium (tape, disk pack, ...) to read or write.
    NotAttached,
    IoFailure(String),
}

impl Display for DeviceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            DeviceError::NotAttached => f.write_str("no medium is attached to the device"),
            DeviceError::IoFailure(msg) => write!(f, "I/O failure: {msg}"),
        }
    }
}

impl error::Error for DeviceError {}

/// The contract between a channel and a peripheral.  A device is
/// told which of its device numbers (`unit`) each operation is for.
pub trait Device {
    fn name(&self) -> String;

    /// The device numbers this device answers to.
    fn address_range(&self) -> AddressRange;

    /// Alert codes (0o100 and above) which PIN and POT route to this
    /// device.
    fn alert_codes(&self) -> Vec<Unsigned9Bit> {
        Vec::new()
    }

    fn connect(&mut self, ctx: &Context, request: &ConnectRequest) -> Result<(), DeviceError>;

    /// EOM mode 1: device-specific control.
    fn io_control_mode1(
        &mut self,
        ctx: &Context,
        unit: Unsigned6Bit,
        function: Unsigned12Bit,
    ) -> Result<(), DeviceError>;

    fn disconnect(&mut self, ctx: &Context, unit: Unsigned6Bit);

    fn read(&mut self, ctx: &Context, unit: Unsigned6Bit) -> Result<ReadOutcome, DeviceError>;

    fn write(
        &mut self,
        ctx: &Context,
        unit: Unsigned6Bit,
        ch: Unsigned24Bit,
    ) -> Result<WriteOutcome, DeviceError>;

    fn write_end_of_record(&mut self, ctx: &Context, unit: Unsigned6Bit)
        -> Result<(), DeviceError>;

    /// SKS mode 0: returns true when the tested signal is present.
    fn skip_signal_test(
        &mut self,
        ctx: &Context,
        unit: Unsigned6Bit,
        function: Unsigned12Bit,
    ) -> Result<bool, DeviceError>;

    /// PIN following one of this device's alerts.
    fn parallel_input(&mut self, _ctx: &Context, _code: Unsigned9Bit) -> Unsigned24Bit {
        Unsigned24Bit::ZERO
    }

    /// POT following one of this device's alerts.
    fn parallel_output(&mut self, _ctx: &Context, _code: Unsigned9Bit, _value: Unsigned24Bit) {}

    /// Called when the time returned by `next_service` arrives.
    /// Returns the interrupt level to request, if any.
    fn service(&mut self, _ctx: &Context) -> Option<Unsigned5Bit> {
        None
    }

    /// The (simulated) time at which the device next wants
    /// `service` to be called.
    fn next_service(&self) -> Option<Duration> {
        None
    }
}

impl Debug for dyn Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "<device: {}>", self.name())
    }
}

#[test]
fn test_address_range_units() {
    let range = AddressRange {
        channel: u3!(0),
        base: u5!(1),
        count: 2,
        directions: Directions::Both,
    };
    assert_eq!(
        range.units(),
        vec![u6!(0o01), u6!(0o41), u6!(0o02), u6!(0o42)]
    );
    let range = AddressRange {
        channel: u3!(2),
        base: u5!(0o37),
        count: 3,
        directions: Directions::Output,
    };
    assert_eq!(range.units(), vec![u6!(0o77)]);
}
