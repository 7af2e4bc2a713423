//! Emulates the instruction engine of the SDS 940.
//!
//! The control unit holds the programmer-visible registers (A, B, X,
//! P and the overflow flag), the processor mode, the address
//! translator and the interrupt controller.  Each step it either
//! accepts an interrupt or fetches and executes one instruction
//! (possibly the end of a chain of EXU instructions).
//!
//! The instructions themselves are implemented in the `op_*`
//! submodules.  Each returns either a [`ProgramCounterChange`] or an
//! [`Abort`]: a trap, a request to execute the instruction again
//! later, or an alarm which stops the machine.
use std::collections::BTreeMap;

use tracing::{event, span, Level};

mod op_arith;
mod op_io;
mod op_jump;
mod op_loadstore;
mod op_pop;
mod op_register;
mod op_shift;
mod op_skip;
pub mod timing;
mod trap;

use base::prelude::*;

use crate::alarm::{Alarm, AlarmDetails, AlarmKind, Alarmer};
use crate::alarmunit::{AlarmStatus, AlarmUnit};
use crate::context::Context;
use crate::diagnostics::CurrentInstructionDiagnostics;
use crate::interrupt::InterruptController;
use crate::io::{EventQueue, IoSubsystem};
use crate::memory::MemoryUnit;
use crate::memorymap::{Access, AddressTranslator, Fault};
use crate::types::{EngineConfiguration, PanicOnUnmaskedAlarm, ProcessorMode, StepOutcome};

pub(crate) use trap::Trap;

/// Form a machine word from the low 24 bits of `bits`.
pub(crate) fn word(bits: u32) -> Unsigned24Bit {
    Unsigned24Bit::from_low_bits(u64::from(bits))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProgramCounterChange {
    /// Carry on with the instruction after the current one.
    CounterUpdate,
    /// Skip the instruction after the current one.
    Skip,
    /// Transfer control.
    Jump(Address),
    /// Stop, with P pointing after the HLT.
    Halt,
}

pub(crate) fn skip_if(condition: bool) -> ProgramCounterChange {
    if condition {
        ProgramCounterChange::Skip
    } else {
        ProgramCounterChange::CounterUpdate
    }
}

/// The reasons an instruction can fail to complete.
#[derive(Debug)]
pub(crate) enum Abort {
    Trap(Trap),
    /// The I/O system is not ready; execute the same instruction
    /// again next time.
    Retry,
    Alarm(Alarm),
}

impl From<Alarm> for Abort {
    fn from(alarm: Alarm) -> Abort {
        Abort::Alarm(alarm)
    }
}

impl From<Trap> for Abort {
    fn from(trap: Trap) -> Abort {
        Abort::Trap(trap)
    }
}

impl From<Fault> for Abort {
    fn from(fault: Fault) -> Abort {
        match fault {
            Fault::NoAccess(_) => Abort::Trap(Trap::NoAccess),
            Fault::WriteProtect(_) => Abort::Trap(Trap::WriteProtect),
        }
    }
}

type OpResult = Result<ProgramCounterChange, Abort>;

/// The parts of the machine outside the control unit which an
/// instruction can reach.
pub(crate) struct Bus<'a> {
    pub(crate) ctx: &'a Context,
    pub(crate) mem: &'a mut MemoryUnit,
    pub(crate) io: &'a mut IoSubsystem,
    pub(crate) events: &'a mut EventQueue,
}

/// The result of effective address calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EffectiveAddress {
    pub(crate) va: Address,
    /// Set when the address was marked (by bit 23 of any word in the
    /// indirect chain) as belonging to the user's address space.
    /// Never set in Normal mode.
    pub(crate) user: bool,
}

impl EffectiveAddress {
    pub(crate) fn system(va: Address) -> EffectiveAddress {
        EffectiveAddress { va, user: false }
    }

    fn successor(&self) -> EffectiveAddress {
        EffectiveAddress {
            va: self.va.successor(),
            user: self.user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRegisters {
    pub a: Unsigned24Bit,
    pub b: Unsigned24Bit,
    pub x: Unsigned24Bit,
    /// The location of the next instruction.
    pub p: Address,
    pub ov: bool,
    /// The instruction being executed.
    pub n: Instruction,
    /// Where `n` came from.  For a word executed from an interrupt
    /// or trap vector this is the location before P, so that a BRM
    /// in the vector records P as the place to return to.
    pub n_address: Address,
}

impl ControlRegisters {
    fn new() -> ControlRegisters {
        ControlRegisters {
            a: Unsigned24Bit::ZERO,
            b: Unsigned24Bit::ZERO,
            x: Unsigned24Bit::ZERO,
            p: Address::ZERO,
            ov: false,
            n: Instruction::default(),
            n_address: Address::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct ControlUnit {
    regs: ControlRegisters,
    mode: ProcessorMode,
    map: AddressTranslator,
    interrupts: InterruptController,
    m2u_trap_armed: bool,
    /// While a vector word is executing, the mode which was running
    /// when the trap or interrupt happened.
    suspended: Option<ProcessorMode>,
    /// Memory cycles spent on indirect words and EXU targets by the
    /// current instruction.
    extra_cycles: u32,
    config: EngineConfiguration,
    alarm_unit: AlarmUnit,
}

impl ControlUnit {
    #[must_use]
    pub fn new(
        panic_on_unmasked_alarm: PanicOnUnmaskedAlarm,
        config: EngineConfiguration,
    ) -> ControlUnit {
        ControlUnit {
            regs: ControlRegisters::new(),
            mode: config.reset_mode,
            map: AddressTranslator::new(),
            interrupts: InterruptController::new(),
            m2u_trap_armed: false,
            suspended: None,
            extra_cycles: 0,
            config,
            alarm_unit: AlarmUnit::new_with_panic(matches!(
                panic_on_unmasked_alarm,
                PanicOnUnmaskedAlarm::Yes
            )),
        }
    }

    /// Clear the registers, the memory map and the interrupt system,
    /// and enter the configured reset mode.
    pub fn reset(&mut self) {
        event!(Level::INFO, "reset into {} mode", self.config.reset_mode);
        self.regs = ControlRegisters::new();
        self.mode = self.config.reset_mode;
        self.map.reset();
        self.interrupts.reset();
        self.m2u_trap_armed = false;
        self.suspended = None;
    }

    #[must_use]
    pub fn registers(&self) -> &ControlRegisters {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut ControlRegisters {
        &mut self.regs
    }

    #[must_use]
    pub fn mode(&self) -> ProcessorMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ProcessorMode) {
        if mode != self.mode {
            event!(Level::DEBUG, "mode change: {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    #[must_use]
    pub fn translator(&self) -> &AddressTranslator {
        &self.map
    }

    pub fn translator_mut(&mut self) -> &mut AddressTranslator {
        &mut self.map
    }

    #[must_use]
    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    pub fn interrupts_mut(&mut self) -> &mut InterruptController {
        &mut self.interrupts
    }

    #[must_use]
    pub fn monitor_to_user_trap_armed(&self) -> bool {
        self.m2u_trap_armed
    }

    /// Choose whether the machine stops or carries on when an alarm
    /// of the given kind occurs.
    ///
    /// # Errors
    ///
    /// Only the illegal instruction, illegal I/O and invalid device
    /// alarms can be masked; trying to mask another kind of alarm
    /// fails.
    pub fn set_alarm_masked(&mut self, kind: AlarmKind, masked: bool) -> Result<(), Alarm> {
        if masked {
            let diags = self.diagnostics();
            self.alarm_unit.mask(kind, &diags)
        } else {
            self.alarm_unit.unmask(kind);
            Ok(())
        }
    }

    pub fn clear_alarms(&mut self) {
        self.alarm_unit.clear_all_alarms();
    }

    #[must_use]
    pub fn alarm_statuses(&self) -> Vec<AlarmStatus> {
        self.alarm_unit.get_alarm_statuses()
    }

    /// The alarms whose status changed since the last call.
    pub fn drain_alarm_changes(&mut self) -> BTreeMap<AlarmKind, AlarmStatus> {
        self.alarm_unit.drain_alarm_changes()
    }

    #[must_use]
    pub fn alarm_status(&self, name: &str) -> Option<AlarmStatus> {
        self.alarm_unit.get_status_of_alarm(name)
    }

    #[must_use]
    pub fn unmasked_alarm_active(&self) -> bool {
        self.alarm_unit.unmasked_alarm_active()
    }

    pub(crate) fn diagnostics(&self) -> CurrentInstructionDiagnostics {
        CurrentInstructionDiagnostics {
            current_instruction: self.regs.n,
            instruction_address: self.regs.n_address,
        }
    }

    /// Raise an alarm which stops the machine.
    fn stop(&mut self, details: AlarmDetails) -> Alarm {
        let diags = self.diagnostics();
        self.alarm_unit.always_fire(Alarm { details }, &diags)
    }

    /// Raise an alarm which can be masked.  If it is masked, the
    /// caller carries on.
    fn complain(&mut self, details: AlarmDetails) -> Result<(), Abort> {
        let diags = self.diagnostics();
        let alarm = Alarm { details };
        let description = alarm.to_string();
        self.alarm_unit.fire_if_not_masked(alarm, &diags)?;
        event!(Level::WARN, "continuing after masked alarm {}", description);
        Ok(())
    }

    /// The map which applies to a reference to `ea`.  The monitor
    /// reaches into the user's address space with user-flagged
    /// addresses.
    fn map_mode(&self, ea: EffectiveAddress) -> ProcessorMode {
        match self.mode {
            ProcessorMode::Monitor if ea.user => ProcessorMode::User,
            mode => mode,
        }
    }

    fn translate(&self, ea: EffectiveAddress, access: Access) -> Result<PhysicalAddress, Fault> {
        self.map.translate(self.map_mode(ea), ea.va, access)
    }

    fn read(&self, mem: &MemoryUnit, ea: EffectiveAddress) -> Result<Unsigned24Bit, Abort> {
        let pa = self.translate(ea, Access::Read)?;
        Ok(mem.fetch(pa))
    }

    fn write(
        &self,
        mem: &mut MemoryUnit,
        ea: EffectiveAddress,
        value: Unsigned24Bit,
    ) -> Result<(), Abort> {
        let pa = self.translate(ea, Access::Write)?;
        event!(Level::TRACE, "store {:08o} at {} ({})", value, ea.va, pa);
        mem.store(pa, value);
        Ok(())
    }

    fn resolve_address(
        &mut self,
        mem: &MemoryUnit,
        inst: Instruction,
        shift: bool,
    ) -> Result<EffectiveAddress, Abort> {
        let x = self.regs.x.bits();
        let mut bits = inst.bits().bits();
        let mut user = false;
        let mut depth: usize = 0;
        loop {
            let current = Instruction::from(word(bits));
            user = (user || current.user_flag()) && self.mode != ProcessorMode::Normal;
            let va = if !current.is_indexed() {
                bits & ADDRESS_MASK
            } else if shift && depth == 0 && !current.is_indirect() {
                // Indexing a direct shift only changes the count.
                (bits & 0o37000) | (bits.wrapping_add(x) & 0o777)
            } else {
                bits.wrapping_add(x) & ADDRESS_MASK
            };
            let ea = EffectiveAddress {
                va: Address::from_word(word(va)),
                user,
            };
            if !current.is_indirect() {
                return Ok(ea);
            }
            if depth == self.config.indirect_limit {
                return Err(self
                    .stop(AlarmDetails::IndirectLimit {
                        address: ea.va,
                        limit: self.config.indirect_limit,
                    })
                    .into());
            }
            depth += 1;
            self.extra_cycles += 1;
            bits = self.read(mem, ea)?.bits();
        }
    }

    /// The effective address of a memory-reference instruction.
    fn ea(&mut self, mem: &MemoryUnit, inst: Instruction) -> Result<EffectiveAddress, Abort> {
        self.resolve_address(mem, inst, false)
    }

    /// The effective address of a shift instruction.
    fn ea_shift(
        &mut self,
        mem: &MemoryUnit,
        inst: Instruction,
    ) -> Result<EffectiveAddress, Abort> {
        self.resolve_address(mem, inst, true)
    }

    fn fetch_operand(&mut self, mem: &MemoryUnit, inst: Instruction) -> Result<Unsigned24Bit, Abort> {
        let ea = self.ea(mem, inst)?;
        self.read(mem, ea)
    }

    /// The return word recorded by BRM.  For a BRM in a trap or
    /// interrupt vector, the user bit describes the mode which was
    /// interrupted.
    fn return_word(&self) -> Unsigned24Bit {
        let pc = u32::from(self.regs.n_address);
        let ov = u32::from(self.regs.ov);
        let regs = self.map.registers();
        word(match self.suspended.unwrap_or(self.mode) {
            ProcessorMode::Normal => {
                (ov << 23)
                    | (u32::from(u8::from(regs.em3)) << 18)
                    | (u32::from(u8::from(regs.em2)) << 15)
                    | pc
            }
            ProcessorMode::Monitor => (ov << 21) | pc,
            ProcessorMode::User => SIGN_BIT | (ov << 21) | pc,
        })
    }

    fn set_program_counter(&mut self, change: ProgramCounterChange) {
        match change {
            ProgramCounterChange::CounterUpdate | ProgramCounterChange::Halt => {
                self.regs.p = self.regs.n_address.successor();
            }
            ProgramCounterChange::Skip => {
                self.regs.p = self.regs.n_address.successor().successor();
            }
            ProgramCounterChange::Jump(target) => {
                self.regs.p = target;
            }
        }
    }

    fn estimate_execute_time_ns(&self) -> u64 {
        timing::estimate_instruction_ns(self.regs.n, self.extra_cycles)
    }

    /// Fetch the instruction at P and execute it.  Returns the
    /// estimated number of nanoseconds the instruction took.
    pub(crate) fn fetch_and_execute(
        &mut self,
        bus: &mut Bus<'_>,
    ) -> Result<(StepOutcome, u64), Alarm> {
        self.regs.n_address = self.regs.p;
        self.extra_cycles = 0;
        let result = match self.translate(EffectiveAddress::system(self.regs.p), Access::Read) {
            Ok(pa) => {
                self.regs.n = Instruction::from(bus.mem.fetch(pa));
                self.execute_current(bus)
            }
            Err(fault) => {
                event!(Level::DEBUG, "instruction fetch failed: {}", fault);
                Err(Abort::from(fault))
            }
        };
        let outcome = self.conclude(result, bus)?;
        Ok((outcome, self.estimate_execute_time_ns()))
    }

    fn conclude(&mut self, result: OpResult, bus: &mut Bus<'_>) -> Result<StepOutcome, Alarm> {
        match result {
            Ok(change) => {
                self.set_program_counter(change);
                Ok(if change == ProgramCounterChange::Halt {
                    StepOutcome::Halted
                } else {
                    StepOutcome::Running
                })
            }
            Err(Abort::Retry) => {
                self.regs.p = self.regs.n_address;
                Ok(StepOutcome::Running)
            }
            Err(Abort::Trap(trap)) => {
                // The monitor-to-user trap resumes at the branch
                // target, which the branch has already put in P.
                if trap != Trap::MonitorToUser {
                    self.regs.p = self.regs.n_address;
                }
                self.deliver_trap(trap, bus)
            }
            Err(Abort::Alarm(alarm)) => Err(alarm),
        }
    }

    /// Execute the instruction in the N register.
    fn execute_current(&mut self, bus: &mut Bus<'_>) -> OpResult {
        let inst = self.regs.n;
        let span = span!(Level::INFO, "xop", p = %self.regs.n_address, op = %inst);
        let _enter = span.enter();
        let result = self.execute(inst, bus);
        match &result {
            Ok(_) => {
                event!(Level::DEBUG, "instruction {} executed", inst);
            }
            Err(Abort::Retry) => {
                event!(Level::TRACE, "instruction {} will be retried", inst);
            }
            Err(Abort::Trap(trap)) => {
                event!(Level::DEBUG, "instruction {} caused a {} trap", inst, trap);
            }
            Err(Abort::Alarm(alarm)) => {
                event!(Level::WARN, "instruction {} raised alarm {}", inst, alarm);
            }
        }
        result
    }

    fn execute(&mut self, mut inst: Instruction, bus: &mut Bus<'_>) -> OpResult {
        let mut depth: usize = 0;
        loop {
            let opcode = match inst.opcode() {
                Ok(opcode) => opcode,
                Err(DecodeFailure::ProgrammedOperator(number)) => {
                    return self.op_pop(bus.mem, inst, number);
                }
                Err(e @ DecodeFailure::InvalidOpcode(_)) => {
                    self.complain(AlarmDetails::IllegalInstruction {
                        instruction: inst,
                        message: e.to_string(),
                    })?;
                    return Ok(ProgramCounterChange::CounterUpdate);
                }
            };
            if self.mode == ProcessorMode::User && opcode.is_privileged() {
                return Err(Trap::Privileged.into());
            }
            return match opcode {
                Opcode::Exu => {
                    let ea = self.ea(bus.mem, inst)?;
                    if depth == self.config.execute_limit {
                        return Err(self
                            .stop(AlarmDetails::ExecuteLimit {
                                address: ea.va,
                                limit: self.config.execute_limit,
                            })
                            .into());
                    }
                    depth += 1;
                    self.extra_cycles += 1;
                    inst = Instruction::from(self.read(bus.mem, ea)?);
                    continue;
                }
                Opcode::Hlt => self.op_hlt(),
                Opcode::Nop => Ok(ProgramCounterChange::CounterUpdate),

                Opcode::Bru => self.op_bru(bus.mem, inst),
                Opcode::Brx => self.op_brx(bus.mem, inst),
                Opcode::Brm => self.op_brm(bus.mem, inst),
                Opcode::Brr => self.op_brr(bus.mem, inst),
                Opcode::Bri => self.op_bri(bus.mem, inst),

                Opcode::Lda => self.op_lda(bus.mem, inst),
                Opcode::Ldb => self.op_ldb(bus.mem, inst),
                Opcode::Ldx => self.op_ldx(bus.mem, inst),
                Opcode::Sta => self.op_sta(bus.mem, inst),
                Opcode::Stb => self.op_stb(bus.mem, inst),
                Opcode::Stx => self.op_stx(bus.mem, inst),
                Opcode::Xma => self.op_xma(bus.mem, inst),
                Opcode::Eax => self.op_eax(bus.mem, inst),

                Opcode::Etr => self.op_etr(bus.mem, inst),
                Opcode::Mrg => self.op_mrg(bus.mem, inst),
                Opcode::Eor => self.op_eor(bus.mem, inst),
                Opcode::Add => self.op_add(bus.mem, inst),
                Opcode::Sub => self.op_sub(bus.mem, inst),
                Opcode::Adc => self.op_adc(bus.mem, inst),
                Opcode::Suc => self.op_suc(bus.mem, inst),
                Opcode::Adm => self.op_adm(bus.mem, inst),
                Opcode::Min => self.op_min(bus.mem, inst),
                Opcode::Mul => self.op_mul(bus.mem, inst),
                Opcode::Div => self.op_div(bus.mem, inst),

                Opcode::RightShift => self.op_right_shift(bus.mem, inst),
                Opcode::LeftShift => self.op_left_shift(bus.mem, inst),
                Opcode::Rch => self.op_rch(inst),

                Opcode::Ske => self.op_ske(bus.mem, inst),
                Opcode::Skb => self.op_skb(bus.mem, inst),
                Opcode::Skn => self.op_skn(bus.mem, inst),
                Opcode::Skr => self.op_skr(bus.mem, inst),
                Opcode::Skm => self.op_skm(bus.mem, inst),
                Opcode::Ska => self.op_ska(bus.mem, inst),
                Opcode::Skg => self.op_skg(bus.mem, inst),
                Opcode::Skd => self.op_skd(bus.mem, inst),

                Opcode::Eom => self.op_eom(bus, inst),
                Opcode::Eod => self.op_eod(bus, inst),
                Opcode::Sks => self.op_sks(bus, inst),
                Opcode::Pin => self.op_pin(bus, inst),
                Opcode::Pot => self.op_pot(bus, inst),
                Opcode::Miw => self.op_miw(bus, inst),
                Opcode::Miy => self.op_miy(bus, inst),
                Opcode::Wim => self.op_wim(bus, inst),
                Opcode::Yim => self.op_yim(bus, inst),
            };
        }
    }

    fn op_hlt(&mut self) -> OpResult {
        event!(Level::INFO, "halt at {}", self.regs.n_address);
        Ok(ProgramCounterChange::Halt)
    }
}
