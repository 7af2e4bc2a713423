//! Implementations of the load and store opcodes
//! - LDA: [`ControlUnit::op_lda`]
//! - LDB: [`ControlUnit::op_ldb`]
//! - LDX: [`ControlUnit::op_ldx`]
//! - STA: [`ControlUnit::op_sta`]
//! - STB: [`ControlUnit::op_stb`]
//! - STX: [`ControlUnit::op_stx`]
//! - XMA: [`ControlUnit::op_xma`]
//! - EAX: [`ControlUnit::op_eax`]

use base::prelude::*;

use super::{word, ControlUnit, OpResult, ProgramCounterChange};
use crate::memory::MemoryUnit;
use crate::types::ProcessorMode;

impl ControlUnit {
    pub(super) fn op_lda(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        self.regs.a = self.fetch_operand(mem, inst)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_ldb(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        self.regs.b = self.fetch_operand(mem, inst)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_ldx(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        self.regs.x = self.fetch_operand(mem, inst)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    fn store_register(
        &mut self,
        mem: &mut MemoryUnit,
        inst: Instruction,
        value: Unsigned24Bit,
    ) -> OpResult {
        let ea = self.ea(mem, inst)?;
        self.write(mem, ea, value)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_sta(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> OpResult {
        self.store_register(mem, inst, self.regs.a)
    }

    pub(super) fn op_stb(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> OpResult {
        self.store_register(mem, inst, self.regs.b)
    }

    pub(super) fn op_stx(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> OpResult {
        self.store_register(mem, inst, self.regs.x)
    }

    /// Exchange A with memory.
    pub(super) fn op_xma(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> OpResult {
        let ea = self.ea(mem, inst)?;
        let m = self.read(mem, ea)?;
        self.write(mem, ea, self.regs.a)?;
        self.regs.a = m;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    /// Copy the effective address into the address part of X.  In
    /// Monitor mode the user flag is copied into bit 23, so that X
    /// can be used to refer to user space.
    pub(super) fn op_eax(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let ea = self.ea(mem, inst)?;
        let mut bits = (self.regs.x.bits() & !ADDRESS_MASK) | u32::from(ea.va);
        if ea.user && self.mode == ProcessorMode::Monitor {
            bits |= USER_FLAG_BIT;
        }
        self.regs.x = word(bits);
        Ok(ProgramCounterChange::CounterUpdate)
    }
}
