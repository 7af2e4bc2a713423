//! Traps and interrupts.
//!
//! Both transfer control through a vector: a word at a fixed
//! physical location which is executed, in place of the next
//! instruction, as if it had been fetched from the location before
//! P.  A trap vector must hold BRU or BRM.  An interrupt vector
//! normally holds BRM, whose return word then records where the
//! interrupted program should resume.
//!
//! The real-time clock pulse level is special: its vector holds a
//! MIN or SKR which counts the pulses, and the level never becomes
//! active.
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use super::{Abort, Bus, ControlUnit, ProgramCounterChange};
use crate::alarm::{Alarm, AlarmDetails};
use crate::arith::add_m24;
use crate::interrupt::{INTERRUPT_VECTOR_BASE, RTC_OVERFLOW_LEVEL, RTC_PULSE_LEVEL};
use crate::memory::MemoryUnit;
use crate::types::{ProcessorMode, StepOutcome};

/// Recoverable conditions which transfer control to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trap {
    /// A privileged instruction in User mode, or PIN/POT with an
    /// alert that nothing answers.
    Privileged,
    NoAccess,
    WriteProtect,
    /// A branch into user space while the trap was armed.
    MonitorToUser,
}

impl Trap {
    pub(crate) fn vector(&self) -> PhysicalAddress {
        PhysicalAddress::from_low_bits(match self {
            Trap::Privileged => 0o40,
            Trap::NoAccess => 0o41,
            Trap::WriteProtect => 0o42,
            Trap::MonitorToUser => 0o43,
        })
    }
}

impl Display for Trap {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            Trap::Privileged => "privileged instruction",
            Trap::NoAccess => "memory no-access",
            Trap::WriteProtect => "memory write-protect",
            Trap::MonitorToUser => "monitor-to-user",
        })
    }
}

impl ControlUnit {
    /// Execute `vector_word` in place of the instruction at P.
    fn execute_vector(
        &mut self,
        vector_word: Unsigned24Bit,
        suspended: ProcessorMode,
        bus: &mut Bus<'_>,
    ) -> Result<ProgramCounterChange, Abort> {
        self.regs.n = Instruction::from(vector_word);
        self.regs.n_address = self.regs.p.predecessor();
        self.suspended = Some(suspended);
        let result = self.execute_current(bus);
        self.suspended = None;
        result
    }

    /// Transfer control to the monitor through the trap's vector.  P
    /// must already hold the resume address.
    pub(super) fn deliver_trap(
        &mut self,
        trap: Trap,
        bus: &mut Bus<'_>,
    ) -> Result<StepOutcome, Alarm> {
        let vector = trap.vector();
        let vector_word = bus.mem.fetch(vector);
        if !matches!(
            Instruction::from(vector_word).opcode(),
            Ok(Opcode::Bru | Opcode::Brm)
        ) {
            return Err(self.stop(AlarmDetails::TrapNotBranch {
                vector,
                word: vector_word,
                message: format!("delivering a {trap} trap"),
            }));
        }
        let suspended = self.mode;
        event!(
            Level::DEBUG,
            "{} trap in {} mode; resume address is {}",
            trap,
            suspended,
            self.regs.p
        );
        self.set_mode(ProcessorMode::Monitor);
        match self.execute_vector(vector_word, suspended, bus) {
            Ok(change) => {
                self.set_program_counter(change);
                Ok(StepOutcome::Running)
            }
            Err(Abort::Alarm(alarm)) => Err(alarm),
            Err(Abort::Trap(nested)) => Err(self.stop(AlarmDetails::TrapNotBranch {
                vector,
                word: vector_word,
                message: format!("{nested} trap while delivering a {trap} trap"),
            })),
            Err(Abort::Retry) => Err(self.stop(AlarmDetails::TrapNotBranch {
                vector,
                word: vector_word,
                message: format!("vector of {trap} trap did not complete"),
            })),
        }
    }

    /// Accept the highest-priority pending interrupt, if interrupts
    /// are enabled and one is waiting.  When an interrupt is
    /// accepted, this takes the place of fetching an instruction and
    /// the estimated execution time is returned.
    pub(crate) fn accept_interrupt(
        &mut self,
        bus: &mut Bus<'_>,
    ) -> Result<Option<(StepOutcome, u64)>, Alarm> {
        let Some(level) = self.interrupts.next_acceptable() else {
            return Ok(None);
        };
        self.extra_cycles = 0;
        let vector = PhysicalAddress::from_low_bits(
            INTERRUPT_VECTOR_BASE + u32::from(u8::from(level)),
        );
        let vector_word = bus.mem.fetch(vector);
        if vector_word.is_zero() {
            return Err(self.stop(AlarmDetails::IllegalVector {
                level,
                vector,
                message: "the vector word is zero".to_string(),
            }));
        }
        if level == RTC_PULSE_LEVEL {
            self.count_clock_pulse(bus.mem, vector, vector_word)?;
            return Ok(Some((StepOutcome::Running, self.estimate_execute_time_ns())));
        }

        let suspended = self.mode;
        event!(
            Level::DEBUG,
            "interrupt level {} in {} mode at {}",
            level,
            suspended,
            self.regs.p
        );
        if suspended == ProcessorMode::User {
            self.set_mode(ProcessorMode::Monitor);
        }
        let change = match self.execute_vector(vector_word, suspended, bus) {
            Ok(change) => change,
            Err(Abort::Alarm(alarm)) => return Err(alarm),
            Err(Abort::Trap(trap)) => {
                return Err(self.stop(AlarmDetails::IllegalVector {
                    level,
                    vector,
                    message: format!("the vector instruction caused a {trap} trap"),
                }));
            }
            Err(Abort::Retry) => {
                return Err(self.stop(AlarmDetails::IllegalVector {
                    level,
                    vector,
                    message: "the vector instruction did not complete".to_string(),
                }));
            }
        };
        self.set_program_counter(change);
        self.interrupts.accept(level);
        let outcome = if change == ProgramCounterChange::Halt {
            StepOutcome::Halted
        } else {
            StepOutcome::Running
        };
        Ok(Some((outcome, self.estimate_execute_time_ns())))
    }

    /// Run the one-instruction handler of the clock pulse level.
    fn count_clock_pulse(
        &mut self,
        mem: &mut MemoryUnit,
        vector: PhysicalAddress,
        vector_word: Unsigned24Bit,
    ) -> Result<(), Alarm> {
        self.interrupts.cancel_request(RTC_PULSE_LEVEL);
        let inst = Instruction::from(vector_word);
        let opcode = match inst.opcode() {
            Ok(op @ (Opcode::Min | Opcode::Skr)) => op,
            _ => {
                return Err(self.stop(AlarmDetails::InvalidRtcInstruction {
                    word: vector_word,
                    message: format!("{inst} cannot count clock pulses"),
                }));
            }
        };
        self.regs.n = inst;
        // The counter lives in the system's address space, but the
        // user program is not otherwise disturbed.
        let interrupted = self.mode;
        if interrupted == ProcessorMode::User {
            self.mode = ProcessorMode::Monitor;
        }
        let counted = self.count(mem, inst, opcode);
        self.mode = interrupted;
        match counted {
            Ok(()) => Ok(()),
            Err(Abort::Alarm(alarm)) => Err(alarm),
            Err(Abort::Trap(trap)) => Err(self.stop(AlarmDetails::IllegalVector {
                level: RTC_PULSE_LEVEL,
                vector,
                message: format!("counting the clock pulse caused a {trap} trap"),
            })),
            Err(Abort::Retry) => Err(self.stop(AlarmDetails::IllegalVector {
                level: RTC_PULSE_LEVEL,
                vector,
                message: "counting the clock pulse did not complete".to_string(),
            })),
        }
    }

    fn count(&mut self, mem: &mut MemoryUnit, inst: Instruction, opcode: Opcode) -> Result<(), Abort> {
        let ea = self.ea(mem, inst)?;
        let m = self.read(mem, ea)?;
        let delta = if opcode == Opcode::Min {
            Unsigned24Bit::ONE
        } else {
            Unsigned24Bit::MAX
        };
        let (value, overflow) = add_m24(m, delta);
        self.write(mem, ea, value)?;
        self.regs.ov |= overflow;
        let exhausted = if opcode == Opcode::Min {
            value.is_zero()
        } else {
            value.is_negative()
        };
        if exhausted {
            event!(Level::TRACE, "real-time clock counter overflowed");
            self.interrupts.request(RTC_OVERFLOW_LEVEL);
        }
        Ok(())
    }
}
