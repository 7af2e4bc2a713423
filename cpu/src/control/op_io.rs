//! Implementations of the I/O opcodes
//! - EOM: [`ControlUnit::op_eom`]
//! - EOD: [`ControlUnit::op_eod`]
//! - SKS: [`ControlUnit::op_sks`]
//! - PIN: [`ControlUnit::op_pin`]
//! - POT: [`ControlUnit::op_pot`]
//! - MIW, MIY: [`ControlUnit::op_miw`], [`ControlUnit::op_miy`]
//! - WIM, YIM: [`ControlUnit::op_wim`], [`ControlUnit::op_yim`]
//!
//! EOM, EOD and SKS select a channel with bits 23, 22 and 14 and a
//! mode with bits 13-12; bits 11-0 are the function.  Mode 2 of EOM
//! and SKS addresses the processor itself rather than a channel
//! (internal control).
use tracing::{event, Level};

use base::prelude::*;

use super::{skip_if, Abort, Bus, ControlUnit, OpResult, ProgramCounterChange, Trap};
use crate::alarm::AlarmDetails;
use crate::io::IoFailure;
use crate::memorymap::Access;
use crate::types::ProcessorMode;

const W_CHANNEL: Unsigned3Bit = u3!(0);
const Y_CHANNEL: Unsigned3Bit = u3!(1);

impl ControlUnit {
    /// Turn the outcome of an I/O subsystem call into the value the
    /// instruction needs.  `Ok(None)` means the failure raised an
    /// alarm which is masked, so the instruction has no further
    /// effect.
    fn io_outcome<T>(
        &mut self,
        inst: Instruction,
        result: Result<T, IoFailure>,
    ) -> Result<Option<T>, Abort> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(IoFailure::Retry) => Err(Abort::Retry),
            Err(IoFailure::Illegal(message)) => {
                self.complain(AlarmDetails::IllegalIo {
                    instruction: inst,
                    message,
                })?;
                Ok(None)
            }
            Err(IoFailure::InvalidDevice { channel, unit }) => {
                self.complain(AlarmDetails::InvalidDevice {
                    channel,
                    device: unit,
                })?;
                Ok(None)
            }
            Err(e @ IoFailure::UnboundAlert(_)) => {
                if self.mode == ProcessorMode::Normal {
                    // There is no monitor to trap to.
                    self.complain(AlarmDetails::IllegalIo {
                        instruction: inst,
                        message: e.to_string(),
                    })?;
                    Ok(None)
                } else {
                    event!(Level::DEBUG, "{}", e);
                    Err(Trap::Privileged.into())
                }
            }
        }
    }

    fn illegal_io(&mut self, inst: Instruction, message: &str) -> OpResult {
        self.complain(AlarmDetails::IllegalIo {
            instruction: inst,
            message: message.to_string(),
        })?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_eom(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        let channel = inst.io_channel();
        let function = inst.io_function();
        match inst.io_mode() {
            0 => {
                let result = bus.io.connect(
                    bus.ctx,
                    channel,
                    function,
                    &mut self.interrupts,
                    bus.events,
                );
                self.io_outcome(inst, result)?;
            }
            1 => {
                let result = bus.io.io_control_mode1(
                    bus.ctx,
                    channel,
                    function,
                    &mut self.interrupts,
                    bus.events,
                );
                self.io_outcome(inst, result)?;
            }
            2 => {
                return self.internal_control(bus, inst);
            }
            _ => {
                return self.illegal_io(inst, "EOM mode 3");
            }
        }
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_eod(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        let channel = inst.io_channel();
        let function = inst.io_function();
        match inst.io_mode() {
            0 => {
                let result = bus.io.connect(
                    bus.ctx,
                    channel,
                    function,
                    &mut self.interrupts,
                    bus.events,
                );
                self.io_outcome(inst, result)?;
            }
            1 => {
                let result = bus.io.buffer_control(channel, function);
                self.io_outcome(inst, result)?;
            }
            2 => {
                return self.internal_control(bus, inst);
            }
            _ => {
                return self.illegal_io(inst, "EOD mode 3");
            }
        }
        Ok(ProgramCounterChange::CounterUpdate)
    }

    fn internal_control(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        let f = u32::from(inst.io_function());
        match (f >> 9) & 0o7 {
            0 => {
                if f & 0o1 != 0 {
                    self.regs.ov = false;
                }
                if f & 0o2 != 0 {
                    self.interrupts.enable();
                    self.interrupts.defer_next();
                }
                if f & 0o4 != 0 {
                    self.interrupts.disable();
                }
            }
            1 => {
                let result = bus.io.terminate_output(inst.io_channel());
                self.io_outcome(inst, result)?;
            }
            2 => {
                if f & 0o10 != 0 {
                    self.map.set_em2(Unsigned3Bit::from_low_bits(u64::from(f)));
                }
                if f & 0o200 != 0 {
                    self.map
                        .set_em3(Unsigned3Bit::from_low_bits(u64::from(f >> 4)));
                }
            }
            3 => {
                bus.io
                    .set_alert(Unsigned9Bit::from_low_bits(u64::from(f & 0o777)));
            }
            4 => {
                if f & 0o1 != 0 {
                    self.m2u_trap_armed = true;
                }
                if f & 0o2 != 0 {
                    self.m2u_trap_armed = false;
                }
            }
            5 => {
                if f & 0o1 != 0 && self.mode == ProcessorMode::Normal {
                    self.set_mode(ProcessorMode::Monitor);
                } else if f & 0o2 != 0 && self.mode == ProcessorMode::Monitor {
                    self.set_mode(ProcessorMode::Normal);
                }
            }
            6 => {
                let level = Unsigned5Bit::from_low_bits(u64::from(f));
                if level.is_zero() {
                    return self.illegal_io(inst, "request for interrupt level 0");
                }
                self.interrupts.request(level);
            }
            _ => {
                return self.illegal_io(inst, "undefined internal control function");
            }
        }
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_sks(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        let channel = inst.io_channel();
        let function = inst.io_function();
        let signal = match inst.io_mode() {
            0 => {
                let result = bus.io.skip_device_signal(
                    bus.ctx,
                    channel,
                    function,
                    &mut self.interrupts,
                    bus.events,
                );
                self.io_outcome(inst, result)?.unwrap_or(false)
            }
            1 => bus.io.skip_channel_signal(channel, function),
            2 => {
                let f = u32::from(function);
                let mut signal = false;
                if f & 0o1 != 0 {
                    signal |= !self.regs.ov;
                    self.regs.ov = false;
                }
                if f & 0o2 != 0 {
                    signal |= self.interrupts.is_enabled();
                }
                signal
            }
            _ => {
                return self.illegal_io(inst, "SKS mode 3");
            }
        };
        Ok(skip_if(signal))
    }

    /// Parallel input: store the word selected by the pending alert.
    pub(super) fn op_pin(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        let ea = self.ea(bus.mem, inst)?;
        self.translate(ea, Access::Write)?;
        let result = bus.io.parallel_input(bus.ctx, &self.map, bus.events);
        if let Some(value) = self.io_outcome(inst, result)? {
            self.write(bus.mem, ea, value)?;
        }
        Ok(ProgramCounterChange::CounterUpdate)
    }

    /// Parallel output: send M to whatever the pending alert selects.
    pub(super) fn op_pot(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        let value = self.fetch_operand(bus.mem, inst)?;
        let result = bus
            .io
            .parallel_output(bus.ctx, &mut self.map, value, bus.events);
        self.io_outcome(inst, result)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    fn memory_to_channel(
        &mut self,
        bus: &mut Bus<'_>,
        inst: Instruction,
        channel: Unsigned3Bit,
    ) -> OpResult {
        let value = self.fetch_operand(bus.mem, inst)?;
        let result = bus.io.load_output_word(channel, value);
        self.io_outcome(inst, result)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    fn channel_to_memory(
        &mut self,
        bus: &mut Bus<'_>,
        inst: Instruction,
        channel: Unsigned3Bit,
    ) -> OpResult {
        let ea = self.ea(bus.mem, inst)?;
        self.translate(ea, Access::Write)?;
        let result = bus.io.input_word(channel);
        if let Some(value) = self.io_outcome(inst, result)? {
            self.write(bus.mem, ea, value)?;
            bus.io.consume_input_word(channel);
        }
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_miw(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        self.memory_to_channel(bus, inst, W_CHANNEL)
    }

    pub(super) fn op_miy(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        self.memory_to_channel(bus, inst, Y_CHANNEL)
    }

    pub(super) fn op_wim(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        self.channel_to_memory(bus, inst, W_CHANNEL)
    }

    pub(super) fn op_yim(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> OpResult {
        self.channel_to_memory(bus, inst, Y_CHANNEL)
    }
}
