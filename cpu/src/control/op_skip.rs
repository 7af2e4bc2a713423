//! Implementations of the memory-testing skip opcodes
//! - SKE: [`ControlUnit::op_ske`]
//! - SKB: [`ControlUnit::op_skb`]
//! - SKN: [`ControlUnit::op_skn`]
//! - SKR: [`ControlUnit::op_skr`]
//! - SKM: [`ControlUnit::op_skm`]
//! - SKA: [`ControlUnit::op_ska`]
//! - SKG: [`ControlUnit::op_skg`]
//! - SKD: [`ControlUnit::op_skd`]
//!
//! SKS, which tests I/O signals, lives with the other I/O
//! instructions.

use base::prelude::*;

use super::{skip_if, word, ControlUnit, OpResult};
use crate::memory::MemoryUnit;

/// The exponent of a floating-point number, which is held in the low
/// nine bits of a word as a two's-complement value.
fn exponent(w: Unsigned24Bit) -> i32 {
    let e = (w.bits() & 0o777) as i32;
    if e & 0o400 != 0 {
        e - 0o1000
    } else {
        e
    }
}

impl ControlUnit {
    pub(super) fn op_ske(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        Ok(skip_if(self.regs.a == m))
    }

    pub(super) fn op_skb(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        Ok(skip_if((self.regs.b & m).is_zero()))
    }

    pub(super) fn op_skn(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        Ok(skip_if(m.is_negative()))
    }

    /// Decrement memory; skip if the result is negative.
    pub(super) fn op_skr(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> OpResult {
        let value = self.add_to_memory(mem, inst, Unsigned24Bit::MAX)?;
        Ok(skip_if(value.is_negative()))
    }

    /// Skip if A and M agree in the bits selected by B.
    pub(super) fn op_skm(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        Ok(skip_if(((self.regs.a ^ m) & self.regs.b).is_zero()))
    }

    pub(super) fn op_ska(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        Ok(skip_if((self.regs.a & m).is_zero()))
    }

    pub(super) fn op_skg(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        Ok(skip_if(self.regs.a.as_signed() > m.as_signed()))
    }

    /// Compare the exponents in B and M: X receives the magnitude of
    /// the difference, and we skip when B's exponent is the smaller.
    pub(super) fn op_skd(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        let difference = exponent(self.regs.b) - exponent(m);
        self.regs.x = word(difference.unsigned_abs());
        Ok(skip_if(difference < 0))
    }
}
