//! The I/O subsystem: eight channels, the devices attached to them,
//! and the alert register.
//!
//! The instruction engine calls in here to carry out the I/O
//! instructions (EOM, EOD, SKS, PIN, POT, MIW/MIY and WIM/YIM); the
//! driver calls `tick` after each instruction to move the channels
//! on by one character.
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use super::alert::{AlertRegister, AlertTarget};
use super::channel::{Channel, Link, TickOutcome};
use super::eventq::{EventQueue, EventSource};
use super::registry::{DeviceId, DispatchRegistry};
use super::DeviceError;
use crate::context::Context;
use crate::interrupt::InterruptController;
use crate::memory::MemoryUnit;
use crate::memorymap::AddressTranslator;

/// Why an I/O instruction could not be carried out.  The instruction
/// engine turns these into alarms, retries or traps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IoFailure {
    Illegal(String),
    InvalidDevice {
        channel: Unsigned3Bit,
        unit: Unsigned6Bit,
    },
    /// The channel is not ready; execute the instruction again.
    Retry,
    /// The pending alert code has no handler.
    UnboundAlert(Unsigned9Bit),
}

impl Display for IoFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            IoFailure::Illegal(msg) => f.write_str(msg),
            IoFailure::InvalidDevice { channel, unit } => {
                write!(f, "no device {unit:02o} on channel {channel}")
            }
            IoFailure::Retry => f.write_str("channel busy"),
            IoFailure::UnboundAlert(code) => write!(f, "alert {code:03o} has no handler"),
        }
    }
}

fn unit_of(function: Unsigned12Bit) -> Unsigned6Bit {
    Unsigned6Bit::from_low_bits(u64::from(u16::from(function) & 0o77))
}

fn reschedule(registry: &DispatchRegistry, id: DeviceId, events: &mut EventQueue) {
    match registry.device(id).next_service() {
        Some(when) => {
            events.schedule(EventSource::Device(id), when);
        }
        None => {
            events.cancel(EventSource::Device(id));
        }
    }
}

#[derive(Debug)]
pub struct IoSubsystem {
    channels: [Channel; 8],
    registry: DispatchRegistry,
    alert: AlertRegister,
}

impl IoSubsystem {
    #[must_use]
    pub fn new(registry: DispatchRegistry) -> IoSubsystem {
        IoSubsystem {
            channels: std::array::from_fn(|n| {
                Channel::new(Unsigned3Bit::from_low_bits(n as u64))
            }),
            registry,
            alert: AlertRegister::default(),
        }
    }

    #[must_use]
    pub fn channel(&self, number: Unsigned3Bit) -> &Channel {
        &self.channels[usize::from(number)]
    }

    fn channel_mut(&mut self, number: Unsigned3Bit) -> &mut Channel {
        &mut self.channels[usize::from(number)]
    }

    #[must_use]
    pub fn registry(&self) -> &DispatchRegistry {
        &self.registry
    }

    #[must_use]
    pub fn pending_alert(&self) -> Option<Unsigned9Bit> {
        self.alert.peek()
    }

    /// Bit `c` is set when channel `c` is connected to a device.
    #[must_use]
    pub fn activity_mask(&self) -> u8 {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| ch.is_connected())
            .fold(0, |mask, (n, _)| mask | (1_u8 << n))
    }

    /// Put every device that wants service into the event queue.
    pub(crate) fn schedule_devices(&self, events: &mut EventQueue) {
        for id in self.registry.ids() {
            reschedule(&self.registry, id, events);
        }
    }

    /// Disconnect every channel and forget the pending alert.
    pub(crate) fn reset(&mut self, ctx: &Context, events: &mut EventQueue) {
        for ch in &mut self.channels {
            if let (Some(unit), Some(id)) = (ch.unit(), ch.device()) {
                self.registry.device_mut(id).disconnect(ctx, unit);
            }
            ch.clear();
        }
        for id in self.registry.ids() {
            events.cancel(EventSource::Device(id));
        }
        self.alert.clear();
    }

    fn disconnect(&mut self, ctx: &Context, number: Unsigned3Bit, events: &mut EventQueue) {
        let ch = &mut self.channels[usize::from(number)];
        if let (Some(unit), Some(id)) = (ch.unit(), ch.device()) {
            ch.disconnect(unit, ctx, self.registry.device_mut(id));
            events.cancel(EventSource::Device(id));
        }
    }

    /// A device on channel `number` reported a failure outside a
    /// transfer.  If the channel is connected to that unit, the record
    /// ends in error just as it does for a failed transfer; otherwise
    /// only the channel's error flag is set.
    fn device_failed(
        &mut self,
        ctx: &Context,
        number: Unsigned3Bit,
        unit: Unsigned6Bit,
        id: DeviceId,
        interrupts: &mut InterruptController,
        e: &DeviceError,
    ) {
        let ch = &mut self.channels[usize::from(number)];
        if ch.unit() == Some(unit) && ch.device() == Some(id) {
            ch.device_failed(unit, ctx, self.registry.device_mut(id), interrupts, e);
        } else {
            event!(
                Level::WARN,
                "device {:02o} on channel {} failed: {}",
                unit,
                number,
                e
            );
            ch.set_error();
        }
    }

    /// EOM mode 0.
    pub(crate) fn connect(
        &mut self,
        ctx: &Context,
        number: Unsigned3Bit,
        function: Unsigned12Bit,
        interrupts: &mut InterruptController,
        events: &mut EventQueue,
    ) -> Result<(), IoFailure> {
        let unit = unit_of(function);
        if u8::from(unit) & 0o37 == 0 {
            self.disconnect(ctx, number, events);
            return Ok(());
        }
        let id = self
            .registry
            .lookup(number, unit)
            .ok_or(IoFailure::InvalidDevice {
                channel: number,
                unit,
            })?;
        let ch = &mut self.channels[usize::from(number)];
        if let Some(current) = ch.unit() {
            if current != unit {
                return Err(IoFailure::Illegal(format!(
                    "channel {number} is already connected to device {current:02o}"
                )));
            }
        }
        let request = ch.connect(id, unit, function).map_err(IoFailure::Illegal)?;
        if let Err(e) = self.registry.device_mut(id).connect(ctx, &request) {
            event!(
                Level::WARN,
                "device {:02o} on channel {} refused connection",
                unit,
                number
            );
            self.device_failed(ctx, number, unit, id, interrupts, &e);
            events.cancel(EventSource::Device(id));
            return Ok(());
        }
        reschedule(&self.registry, id, events);
        Ok(())
    }

    /// EOM mode 1.
    pub(crate) fn io_control_mode1(
        &mut self,
        ctx: &Context,
        number: Unsigned3Bit,
        function: Unsigned12Bit,
        interrupts: &mut InterruptController,
        events: &mut EventQueue,
    ) -> Result<(), IoFailure> {
        let unit = unit_of(function);
        let id = self
            .registry
            .lookup(number, unit)
            .ok_or(IoFailure::InvalidDevice {
                channel: number,
                unit,
            })?;
        if let Err(e) = self
            .registry
            .device_mut(id)
            .io_control_mode1(ctx, unit, function)
        {
            self.device_failed(ctx, number, unit, id, interrupts, &e);
        }
        reschedule(&self.registry, id, events);
        Ok(())
    }

    /// EOD mode 1.  Consumes the channel's buffer control alert.
    pub(crate) fn buffer_control(
        &mut self,
        number: Unsigned3Bit,
        function: Unsigned12Bit,
    ) -> Result<(), IoFailure> {
        match self.alert.peek().map(AlertTarget::from) {
            Some(AlertTarget::BufferControl(c)) if c == number => {
                self.alert.take();
            }
            _ => {
                return Err(IoFailure::Illegal(format!(
                    "buffer control of channel {number} without its alert"
                )));
            }
        }
        let ch = self.channel_mut(number);
        if !ch.is_connected() {
            return Err(IoFailure::Illegal(format!(
                "buffer control of channel {number}, which is not connected"
            )));
        }
        ch.buffer_control(function).map_err(IoFailure::Illegal)
    }

    /// TOP.
    pub(crate) fn terminate_output(&mut self, number: Unsigned3Bit) -> Result<(), IoFailure> {
        let ch = self.channel_mut(number);
        if ch.is_output() {
            ch.terminate_output();
            Ok(())
        } else {
            Err(IoFailure::Illegal(format!(
                "terminate output on channel {number}, which is not connected for output"
            )))
        }
    }

    /// EOM mode 2, alert.
    pub(crate) fn set_alert(&mut self, code: Unsigned9Bit) {
        event!(Level::TRACE, "alert {:03o}: {}", code, AlertTarget::from(code));
        self.alert.set(code);
    }

    /// SKS mode 0.
    pub(crate) fn skip_device_signal(
        &mut self,
        ctx: &Context,
        number: Unsigned3Bit,
        function: Unsigned12Bit,
        interrupts: &mut InterruptController,
        events: &mut EventQueue,
    ) -> Result<bool, IoFailure> {
        let unit = unit_of(function);
        let id = self
            .registry
            .lookup(number, unit)
            .ok_or(IoFailure::InvalidDevice {
                channel: number,
                unit,
            })?;
        let result = match self
            .registry
            .device_mut(id)
            .skip_signal_test(ctx, unit, function)
        {
            Ok(signal) => signal,
            Err(e) => {
                self.device_failed(ctx, number, unit, id, interrupts, &e);
                false
            }
        };
        reschedule(&self.registry, id, events);
        Ok(result)
    }

    /// SKS mode 1.
    #[must_use]
    pub(crate) fn skip_channel_signal(&self, number: Unsigned3Bit, function: Unsigned12Bit) -> bool {
        self.channel(number)
            .test_conditions(u16::from(function) & 0o37)
    }

    /// MIW/MIY.
    pub(crate) fn load_output_word(
        &mut self,
        number: Unsigned3Bit,
        word: Unsigned24Bit,
    ) -> Result<(), IoFailure> {
        let ch = self.channel_mut(number);
        if !ch.is_output() {
            Err(IoFailure::Illegal(format!(
                "channel {number} is not connected for output"
            )))
        } else if ch.output_buffer_busy() {
            Err(IoFailure::Retry)
        } else {
            ch.load_output_word(word);
            Ok(())
        }
    }

    /// WIM/YIM: the word which is ready to be stored.  Use
    /// `consume_input_word` once it has been stored.
    pub(crate) fn input_word(&self, number: Unsigned3Bit) -> Result<Unsigned24Bit, IoFailure> {
        let ch = self.channel(number);
        match ch.held_word() {
            Some(word) => Ok(word),
            None if ch.is_connected() => Err(IoFailure::Retry),
            None => Err(IoFailure::Illegal(format!(
                "channel {number} is disconnected and has no word ready"
            ))),
        }
    }

    pub(crate) fn consume_input_word(&mut self, number: Unsigned3Bit) {
        self.channel_mut(number).take_held_word();
    }

    fn take_alert(&mut self, instruction: &str) -> Result<Unsigned9Bit, IoFailure> {
        self.alert
            .take()
            .ok_or_else(|| IoFailure::Illegal(format!("{instruction} with no pending alert")))
    }

    /// PIN.
    pub(crate) fn parallel_input(
        &mut self,
        ctx: &Context,
        translator: &AddressTranslator,
        events: &mut EventQueue,
    ) -> Result<Unsigned24Bit, IoFailure> {
        let code = self.take_alert("PIN")?;
        let regs = translator.registers();
        match AlertTarget::from(code) {
            AlertTarget::Interlace(c) => Ok(self.channel(c).interlace_word()),
            AlertTarget::DataChain(c) => Ok(Unsigned24Bit::from(self.channel(c).data_chain())),
            AlertTarget::Relabel1 => Ok(regs.rl1),
            AlertTarget::Relabel2 => Ok(regs.rl2),
            AlertTarget::Relabel4 => Ok(regs.rl4),
            AlertTarget::Device(code) => {
                let id = self
                    .registry
                    .lookup_alert(code)
                    .ok_or(IoFailure::UnboundAlert(code))?;
                let value = self.registry.device_mut(id).parallel_input(ctx, code);
                reschedule(&self.registry, id, events);
                Ok(value)
            }
            AlertTarget::BufferControl(_) | AlertTarget::Unassigned(_) => {
                Err(IoFailure::UnboundAlert(code))
            }
        }
    }

    /// POT.
    pub(crate) fn parallel_output(
        &mut self,
        ctx: &Context,
        translator: &mut AddressTranslator,
        word: Unsigned24Bit,
        events: &mut EventQueue,
    ) -> Result<(), IoFailure> {
        let code = self.take_alert("POT")?;
        match AlertTarget::from(code) {
            AlertTarget::Interlace(c) => {
                self.channel_mut(c).load_interlace(word);
                Ok(())
            }
            AlertTarget::DataChain(c) => {
                self.channel_mut(c).load_data_chain(word);
                Ok(())
            }
            AlertTarget::Relabel1 => {
                translator.set_rl1(word);
                Ok(())
            }
            AlertTarget::Relabel2 => {
                translator.set_rl2(word);
                Ok(())
            }
            AlertTarget::Relabel4 => {
                translator.set_rl4(word);
                Ok(())
            }
            AlertTarget::Device(code) => {
                let id = self
                    .registry
                    .lookup_alert(code)
                    .ok_or(IoFailure::UnboundAlert(code))?;
                self.registry.device_mut(id).parallel_output(ctx, code, word);
                reschedule(&self.registry, id, events);
                Ok(())
            }
            AlertTarget::BufferControl(_) | AlertTarget::Unassigned(_) => {
                Err(IoFailure::UnboundAlert(code))
            }
        }
    }

    /// Move every connected channel on by one character.
    pub(crate) fn tick(
        &mut self,
        ctx: &Context,
        mem: &mut MemoryUnit,
        interrupts: &mut InterruptController,
        events: &mut EventQueue,
    ) {
        for ch in &mut self.channels {
            let Some(id) = ch.device() else {
                continue;
            };
            let mut link = Link {
                ctx,
                device: self.registry.device_mut(id),
                mem: &mut *mem,
                interrupts: &mut *interrupts,
            };
            match ch.tick(&mut link) {
                TickOutcome::Connected => reschedule(&self.registry, id, events),
                TickOutcome::Disconnected => {
                    events.cancel(EventSource::Device(id));
                }
            }
        }
    }

    /// Called when a device's service time arrives.
    pub(crate) fn service_device(
        &mut self,
        ctx: &Context,
        id: DeviceId,
        interrupts: &mut InterruptController,
        events: &mut EventQueue,
    ) {
        if let Some(level) = self.registry.device_mut(id).service(ctx) {
            event!(
                Level::TRACE,
                "{} requests interrupt level {}",
                self.registry.device(id).name(),
                level
            );
            interrupts.request(level);
        }
        reschedule(&self.registry, id, events);
    }
}

#[cfg(test)]
mod tests;
