//! A single buffer channel.
//!
//! A channel is connected to one device at a time.  Data moves
//! between the device and the channel's word-assembly register one
//! character per tick; full words move between the assembly register
//! and memory either automatically (when the interlace is loaded) or
//! under program control (MIW/MIY and WIM/YIM, "compatible" mode).
use bitflags::bitflags;
use tracing::{event, Level};

use base::prelude::*;

use super::{is_output_unit, CharacterWidth, ConnectRequest, Device, DeviceError, ReadOutcome};
use super::{DeviceId, WriteOutcome};
use crate::context::Context;
use crate::interrupt::{ChannelInterrupt, InterruptController};
use crate::memory::MemoryUnit;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ChannelFlags: u16 {
        const ERROR = 1 << 0;
        const INTERRECORD = 1 << 1;
        const INTERLACE = 1 << 2;
        const CHAIN_ARMED = 1 << 3;
        const END_OF_RECORD = 1 << 4;
        const WIDTH_12 = 1 << 5;
        const WIDTH_24 = 1 << 6;
        const OUTPUT_WAKE = 1 << 7;
        const SCAN = 1 << 8;
        const TOP_PENDING = 1 << 9;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ArmedInterrupts: u8 {
        const END_OF_RECORD = 1 << 0;
        const ZERO_WORD_COUNT = 1 << 1;
    }
}

/// The extended transfer functions selected by buffer control (EOD
/// mode 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFunction {
    Compatible,
    RecordDisconnect,
    SignalDisconnect,
    RecordProceed,
    SignalProceed,
}

impl TransferFunction {
    #[must_use]
    pub fn from_bits(bits: u8) -> Option<TransferFunction> {
        match bits {
            0 => Some(TransferFunction::Compatible),
            1 => Some(TransferFunction::RecordDisconnect),
            2 => Some(TransferFunction::SignalDisconnect),
            3 => Some(TransferFunction::RecordProceed),
            4 => Some(TransferFunction::SignalProceed),
            _ => None,
        }
    }

    fn is_signal(&self) -> bool {
        matches!(
            self,
            TransferFunction::SignalDisconnect | TransferFunction::SignalProceed
        )
    }

    fn proceeds(&self) -> bool {
        matches!(
            self,
            TransferFunction::RecordProceed | TransferFunction::SignalProceed
        )
    }
}

/// Whether the channel is still connected after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Connected,
    Disconnected,
}

/// The things a channel works on during a transfer.
pub(crate) struct Link<'a> {
    pub(crate) ctx: &'a Context,
    pub(crate) device: &'a mut dyn Device,
    pub(crate) mem: &'a mut MemoryUnit,
    pub(crate) interrupts: &'a mut InterruptController,
}

#[derive(Debug, Clone)]
pub struct Channel {
    number: Unsigned3Bit,
    unit: Option<Unsigned6Bit>,
    device: Option<DeviceId>,
    word_count: Unsigned15Bit,
    address: PhysicalAddress,
    chain: Unsigned6Bit,
    assembly: Unsigned24Bit,
    chars_per_word: u8,
    count: u8,
    held: Option<Unsigned24Bit>,
    function: TransferFunction,
    flags: ChannelFlags,
    armed: ArmedInterrupts,
}

impl Channel {
    #[must_use]
    pub fn new(number: Unsigned3Bit) -> Channel {
        Channel {
            number,
            unit: None,
            device: None,
            word_count: Unsigned15Bit::ZERO,
            address: PhysicalAddress::ZERO,
            chain: Unsigned6Bit::ZERO,
            assembly: Unsigned24Bit::ZERO,
            chars_per_word: 1,
            count: 0,
            held: None,
            function: TransferFunction::Compatible,
            flags: ChannelFlags::empty(),
            armed: ArmedInterrupts::empty(),
        }
    }

    #[must_use]
    pub fn number(&self) -> Unsigned3Bit {
        self.number
    }

    /// The connected device number, if any.
    #[must_use]
    pub fn unit(&self) -> Option<Unsigned6Bit> {
        self.unit
    }

    pub(crate) fn device(&self) -> Option<DeviceId> {
        self.device
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.unit.is_some()
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        self.unit.is_some_and(is_output_unit)
    }

    #[must_use]
    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    #[must_use]
    pub fn function(&self) -> TransferFunction {
        self.function
    }

    #[must_use]
    pub fn word_count(&self) -> Unsigned15Bit {
        self.word_count
    }

    #[must_use]
    pub fn memory_address(&self) -> PhysicalAddress {
        self.address
    }

    fn width(&self) -> CharacterWidth {
        if self.flags.contains(ChannelFlags::WIDTH_24) {
            CharacterWidth::TwentyFour
        } else if self.flags.contains(ChannelFlags::WIDTH_12) {
            CharacterWidth::Twelve
        } else {
            CharacterWidth::Six
        }
    }

    fn fire(&self, kind: ChannelInterrupt, interrupts: &mut InterruptController) {
        let armed = match kind {
            ChannelInterrupt::EndOfRecord => ArmedInterrupts::END_OF_RECORD,
            ChannelInterrupt::ZeroWordCount => ArmedInterrupts::ZERO_WORD_COUNT,
            // The chain interrupt is requested by bit 5 of the data
            // chain register instead.
            ChannelInterrupt::DataChain => ArmedInterrupts::empty(),
        };
        if self.armed.contains(armed) {
            interrupts.request(kind.level(self.number));
        }
    }

    /// Return to the idle state, keeping only the error and
    /// end-of-record flags (and any word held for WIM/YIM).
    pub(crate) fn reset_connection(&mut self) {
        self.unit = None;
        self.device = None;
        self.assembly = Unsigned24Bit::ZERO;
        self.count = 0;
        self.function = TransferFunction::Compatible;
        self.flags &= ChannelFlags::ERROR | ChannelFlags::END_OF_RECORD;
        self.armed = ArmedInterrupts::empty();
    }

    pub(crate) fn set_error(&mut self) {
        self.flags.insert(ChannelFlags::ERROR);
    }

    /// Clear everything, as at machine reset.
    pub(crate) fn clear(&mut self) {
        *self = Channel::new(self.number);
    }

    /// Attach the channel to a device (EOM mode 0).  The caller has
    /// already checked that the channel is free and that the device
    /// exists.  Returns the parameters passed to the device.
    pub(crate) fn connect(
        &mut self,
        id: DeviceId,
        unit: Unsigned6Bit,
        function: Unsigned12Bit,
    ) -> Result<ConnectRequest, String> {
        let bits = u16::from(function);
        let (width, width_flag) = match (bits >> 8) & 0o3 {
            0 => (CharacterWidth::Six, ChannelFlags::empty()),
            1 => (CharacterWidth::Twelve, ChannelFlags::WIDTH_12),
            2 => (CharacterWidth::TwentyFour, ChannelFlags::WIDTH_24),
            _ => {
                return Err(format!(
                    "character width code 3 in connect function {function:04o}"
                ));
            }
        };
        let requested = match (bits >> 6) & 0o3 {
            0 => 4,
            n => n as u8,
        };
        let chars_per_word = requested.min(width.per_word());
        let scan = bits & 0o2000 != 0;

        // A pending interlace load survives the connect.
        let keep = self.flags & ChannelFlags::INTERLACE;
        self.flags = keep | width_flag;
        if scan {
            self.flags.insert(ChannelFlags::SCAN);
        }
        self.unit = Some(unit);
        self.device = Some(id);
        self.function = TransferFunction::Compatible;
        self.armed = ArmedInterrupts::empty();
        self.chars_per_word = chars_per_word;
        self.assembly = Unsigned24Bit::ZERO;
        self.count = 0;
        event!(
            Level::DEBUG,
            "channel {} connected to device {:02o} ({} bit characters, {} per word)",
            self.number,
            unit,
            width.bits(),
            chars_per_word
        );
        Ok(ConnectRequest {
            channel: self.number,
            unit,
            chars_per_word,
            width,
            scan,
        })
    }

    /// Buffer control (EOD mode 1).
    pub(crate) fn buffer_control(&mut self, function: Unsigned12Bit) -> Result<(), String> {
        let bits = u32::from(function);
        let transfer = TransferFunction::from_bits((bits & 0o7) as u8)
            .ok_or_else(|| format!("undefined transfer function {}", bits & 0o7))?;
        self.function = transfer;
        self.armed = ArmedInterrupts::empty();
        if bits & 0o10 != 0 {
            self.armed.insert(ArmedInterrupts::END_OF_RECORD);
        }
        if bits & 0o20 != 0 {
            self.armed.insert(ArmedInterrupts::ZERO_WORD_COUNT);
        }
        let address_high = (bits >> 5) & 0o3;
        self.address = PhysicalAddress::from_low_bits(
            (u32::from(self.address) & 0o37777) | (address_high << 14),
        );
        let count_high = (bits >> 7) & 0o37;
        self.word_count = Unsigned15Bit::from_low_bits(u64::from(
            (u32::from(self.word_count) & 0o1777) | (count_high << 10),
        ));
        event!(
            Level::DEBUG,
            "channel {} transfer function is now {:?}",
            self.number,
            transfer
        );
        Ok(())
    }

    /// The value PIN reads after the interlace alert.
    #[must_use]
    pub fn interlace_word(&self) -> Unsigned24Bit {
        let wc = u32::from(self.word_count) & 0o1777;
        let mar = u32::from(self.address) & 0o37777;
        Unsigned24Bit::from_low_bits(u64::from((wc << 14) | mar))
    }

    /// POT after the interlace alert.
    pub(crate) fn load_interlace(&mut self, word: Unsigned24Bit) {
        let w = u32::from(word);
        let wc = (u32::from(self.word_count) & !0o1777) | (w >> 14);
        let mar = (u32::from(self.address) & !0o37777) | (w & 0o37777);
        self.word_count = Unsigned15Bit::from_low_bits(u64::from(wc));
        self.address = PhysicalAddress::from_low_bits(mar);
        self.flags.insert(ChannelFlags::INTERLACE);
        self.flags
            .remove(ChannelFlags::INTERRECORD | ChannelFlags::END_OF_RECORD);
        event!(
            Level::DEBUG,
            "channel {} interlace loaded: {} words at {}",
            self.number,
            self.word_count,
            self.address
        );
    }

    #[must_use]
    pub fn data_chain(&self) -> Unsigned6Bit {
        self.chain
    }

    /// POT after the data chain alert.
    pub(crate) fn load_data_chain(&mut self, word: Unsigned24Bit) {
        self.chain = Unsigned6Bit::from_low_bits(u64::from(u32::from(word) & 0o77));
        self.flags.insert(ChannelFlags::CHAIN_ARMED);
    }

    /// TOP: end the record once the current word has been sent.
    pub(crate) fn terminate_output(&mut self) {
        self.flags.insert(ChannelFlags::TOP_PENDING);
    }

    /// Returns true while MIW/MIY must wait for the previous word to
    /// be sent.
    #[must_use]
    pub fn output_buffer_busy(&self) -> bool {
        self.count > 0
    }

    /// MIW/MIY.
    pub(crate) fn load_output_word(&mut self, word: Unsigned24Bit) {
        self.assembly = word;
        self.count = self.chars_per_word;
        self.flags.remove(ChannelFlags::OUTPUT_WAKE);
    }

    #[must_use]
    pub fn held_word(&self) -> Option<Unsigned24Bit> {
        self.held
    }

    /// WIM/YIM.
    pub(crate) fn take_held_word(&mut self) -> Option<Unsigned24Bit> {
        self.held.take()
    }

    /// The condition tested by SKS mode 1.
    #[must_use]
    pub fn test_conditions(&self, selection: u16) -> bool {
        let conditions: [(u16, bool); 5] = [
            (0o1, !self.is_connected()),
            (0o2, self.flags.contains(ChannelFlags::ERROR)),
            (0o4, self.flags.contains(ChannelFlags::END_OF_RECORD)),
            (0o10, self.flags.contains(ChannelFlags::INTERRECORD)),
            (0o20, !self.flags.contains(ChannelFlags::INTERLACE)),
        ];
        conditions
            .iter()
            .any(|&(bit, holds)| selection & bit != 0 && holds)
    }

    fn advance_address(&mut self, interrupts: &mut InterruptController) {
        let next = self.address.successor();
        if self.flags.contains(ChannelFlags::CHAIN_ARMED) && next.page_offset() == 0 {
            let frame = Unsigned5Bit::from_low_bits(u64::from(u8::from(self.chain) & 0o37));
            self.address = PhysicalAddress::from_frame(frame, 0);
            self.flags.remove(ChannelFlags::CHAIN_ARMED);
            event!(
                Level::DEBUG,
                "channel {} data chained to {}",
                self.number,
                self.address
            );
            if self.chain.bit(5) {
                interrupts.request(ChannelInterrupt::DataChain.level(self.number));
            }
        } else {
            self.address = next;
        }
    }

    /// Move the channel on by one character.
    pub(crate) fn tick(&mut self, link: &mut Link<'_>) -> TickOutcome {
        let Some(unit) = self.unit else {
            return TickOutcome::Disconnected;
        };
        if is_output_unit(unit) {
            self.tick_output(unit, link)
        } else {
            self.tick_input(unit, link)
        }
    }

    fn tick_output(&mut self, unit: Unsigned6Bit, link: &mut Link<'_>) -> TickOutcome {
        if self.count == 0 {
            if self.flags.contains(ChannelFlags::TOP_PENDING) {
                return self.end_of_record(unit, link);
            }
            if !self.flags.contains(ChannelFlags::INTERLACE) {
                if self.function == TransferFunction::Compatible {
                    self.flags.insert(ChannelFlags::OUTPUT_WAKE);
                }
                return TickOutcome::Connected;
            }
            if self.word_count.is_zero() {
                return self.zero_word_count(unit, link);
            }
            self.assembly = link.mem.fetch(self.address);
            self.advance_address(link.interrupts);
            self.word_count = self.word_count.wrapping_decrement();
            self.count = self.chars_per_word;
        }

        let width = self.width().bits();
        let ch = self.assembly >> (24 - width);
        match link.device.write(link.ctx, unit, ch) {
            Ok(WriteOutcome::Accepted) => {
                event!(
                    Level::TRACE,
                    "channel {} sent {:o} to device {:02o}",
                    self.number,
                    ch,
                    unit
                );
                self.assembly = self.assembly << width;
                self.count -= 1;
            }
            Ok(WriteOutcome::NotReady) => return TickOutcome::Connected,
            Err(e) => return self.device_error(unit, link, &e),
        }

        if self.count == 0 {
            if self.flags.contains(ChannelFlags::INTERLACE) {
                if self.word_count.is_zero() {
                    return self.zero_word_count(unit, link);
                }
            } else if self.function == TransferFunction::Compatible {
                self.flags.insert(ChannelFlags::OUTPUT_WAKE);
            }
            if self.flags.contains(ChannelFlags::TOP_PENDING) {
                return self.end_of_record(unit, link);
            }
        }
        TickOutcome::Connected
    }

    fn tick_input(&mut self, unit: Unsigned6Bit, link: &mut Link<'_>) -> TickOutcome {
        if self.flags.contains(ChannelFlags::INTERRECORD) {
            return TickOutcome::Connected;
        }
        if self.flags.contains(ChannelFlags::INTERLACE) && self.word_count.is_zero() {
            return self.zero_word_count(unit, link);
        }
        match link.device.read(link.ctx, unit) {
            Ok(ReadOutcome::NotReady) => TickOutcome::Connected,
            Ok(ReadOutcome::EndOfRecord) => self.end_of_record(unit, link),
            Ok(ReadOutcome::Char(ch)) => self.accept_character(unit, ch, link),
            Err(e) => self.device_error(unit, link, &e),
        }
    }

    fn accept_character(
        &mut self,
        unit: Unsigned6Bit,
        ch: Unsigned24Bit,
        link: &mut Link<'_>,
    ) -> TickOutcome {
        let request_pending = self.flags.contains(ChannelFlags::INTERLACE)
            || (self.function == TransferFunction::Compatible && self.held.is_none());
        if !request_pending {
            if self.function.is_signal() {
                self.flags.insert(ChannelFlags::ERROR);
            }
            event!(
                Level::WARN,
                "channel {} rate error: discarding character {:o} from device {:02o}",
                self.number,
                ch,
                unit
            );
            return TickOutcome::Connected;
        }
        let width = self.width().bits();
        let mask = if width == 24 {
            0o77777777
        } else {
            (1_u32 << width) - 1
        };
        event!(
            Level::TRACE,
            "channel {} received {:o} from device {:02o}",
            self.number,
            ch,
            unit
        );
        self.assembly = (self.assembly << width) | (ch & mask);
        self.count += 1;
        if self.count >= self.chars_per_word && self.store_input_word(link.mem, link.interrupts) {
            return self.zero_word_count(unit, link);
        }
        TickOutcome::Connected
    }

    /// Move the assembled characters (left justified) to memory or to
    /// the holding register.  Returns true if this exhausted the
    /// interlace word count.
    fn store_input_word(&mut self, mem: &mut MemoryUnit, interrupts: &mut InterruptController) -> bool {
        let width = self.width();
        let unused = u32::from(width.per_word().saturating_sub(self.count)) * width.bits();
        let word = self.assembly << unused;
        self.assembly = Unsigned24Bit::ZERO;
        self.count = 0;
        if self.flags.contains(ChannelFlags::INTERLACE) {
            mem.store(self.address, word);
            self.advance_address(interrupts);
            self.word_count = self.word_count.wrapping_decrement();
            self.word_count.is_zero()
        } else {
            self.held = Some(word);
            false
        }
    }

    fn zero_word_count(&mut self, unit: Unsigned6Bit, link: &mut Link<'_>) -> TickOutcome {
        event!(Level::DEBUG, "channel {} word count exhausted", self.number);
        self.flags.remove(ChannelFlags::INTERLACE);
        self.fire(ChannelInterrupt::ZeroWordCount, link.interrupts);
        let output = is_output_unit(unit);
        if (output && self.function != TransferFunction::Compatible)
            || self.function == TransferFunction::SignalDisconnect
        {
            return self.end_of_record(unit, link);
        }
        TickOutcome::Connected
    }

    /// Output units are sent an end-of-record mark first.
    fn end_of_record(&mut self, unit: Unsigned6Bit, link: &mut Link<'_>) -> TickOutcome {
        if is_output_unit(unit) {
            if let Err(e) = link.device.write_end_of_record(link.ctx, unit) {
                return self.device_error(unit, link, &e);
            }
        } else if self.count > 0 && self.store_input_word(link.mem, link.interrupts) {
            self.flags.remove(ChannelFlags::INTERLACE);
            self.fire(ChannelInterrupt::ZeroWordCount, link.interrupts);
        }
        self.flags.remove(ChannelFlags::TOP_PENDING);
        self.flags.insert(ChannelFlags::END_OF_RECORD);
        self.fire(ChannelInterrupt::EndOfRecord, link.interrupts);
        if self.function.proceeds() {
            event!(Level::DEBUG, "channel {} is between records", self.number);
            self.flags.insert(ChannelFlags::INTERRECORD);
            TickOutcome::Connected
        } else {
            self.disconnect(unit, link.ctx, link.device);
            TickOutcome::Disconnected
        }
    }

    fn device_error(&mut self, unit: Unsigned6Bit, link: &mut Link<'_>, e: &DeviceError) -> TickOutcome {
        self.device_failed(unit, link.ctx, &mut *link.device, link.interrupts, e);
        TickOutcome::Disconnected
    }

    /// The connected device reported a failure: the record ends in
    /// error and the channel lets go of the device.
    pub(crate) fn device_failed(
        &mut self,
        unit: Unsigned6Bit,
        ctx: &Context,
        device: &mut dyn Device,
        interrupts: &mut InterruptController,
        e: &DeviceError,
    ) {
        event!(
            Level::WARN,
            "channel {} device {:02o} failed: {}",
            self.number,
            unit,
            e
        );
        self.flags.insert(ChannelFlags::ERROR | ChannelFlags::END_OF_RECORD);
        self.flags.remove(ChannelFlags::TOP_PENDING);
        self.fire(ChannelInterrupt::EndOfRecord, interrupts);
        self.disconnect(unit, ctx, device);
    }

    pub(crate) fn disconnect(&mut self, unit: Unsigned6Bit, ctx: &Context, device: &mut dyn Device) {
        device.disconnect(ctx, unit);
        event!(
            Level::DEBUG,
            "channel {} disconnected from device {:02o}",
            self.number,
            unit
        );
        self.reset_connection();
    }
}
