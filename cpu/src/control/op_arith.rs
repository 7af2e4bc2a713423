//! Implementations of the arithmetic and logical opcodes
//! - ETR: [`ControlUnit::op_etr`]
//! - MRG: [`ControlUnit::op_mrg`]
//! - EOR: [`ControlUnit::op_eor`]
//! - ADD: [`ControlUnit::op_add`]
//! - SUB: [`ControlUnit::op_sub`]
//! - ADC: [`ControlUnit::op_adc`]
//! - SUC: [`ControlUnit::op_suc`]
//! - ADM: [`ControlUnit::op_adm`]
//! - MIN: [`ControlUnit::op_min`]
//! - MUL: [`ControlUnit::op_mul`]
//! - DIV: [`ControlUnit::op_div`]
//!
//! ADD, SUB, ADC and SUC leave the carry out of the adder in the
//! sign bit of X, which is where ADC and SUC take their carry in
//! from.  Overflow sets OV; nothing here clears it.
use tracing::{event, Level};

use base::prelude::*;

use super::{ControlUnit, OpResult, ProgramCounterChange};
use crate::arith::{add24, add_m24, div48, mul48, Sum};
use crate::memory::MemoryUnit;

impl ControlUnit {
    pub(super) fn op_etr(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        self.regs.a = self.regs.a & self.fetch_operand(mem, inst)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_mrg(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        self.regs.a = self.regs.a | self.fetch_operand(mem, inst)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_eor(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        self.regs.a = self.regs.a ^ self.fetch_operand(mem, inst)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    fn carry(&self) -> bool {
        self.regs.x.is_negative()
    }

    fn accumulate(&mut self, sum: Sum) -> OpResult {
        self.regs.a = sum.value;
        self.regs.x = if sum.carry {
            self.regs.x | Unsigned24Bit::SIGN
        } else {
            self.regs.x & !Unsigned24Bit::SIGN
        };
        self.regs.ov |= sum.overflow;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_add(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        self.accumulate(add24(self.regs.a, m, false))
    }

    pub(super) fn op_sub(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        self.accumulate(add24(self.regs.a, !m, true))
    }

    pub(super) fn op_adc(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        self.accumulate(add24(self.regs.a, m, self.carry()))
    }

    /// A - M - 1 + carry.
    pub(super) fn op_suc(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        self.accumulate(add24(self.regs.a, !m, self.carry()))
    }

    /// Add `addend` to the memory word in place.  Returns the new
    /// value.
    pub(super) fn add_to_memory(
        &mut self,
        mem: &mut MemoryUnit,
        inst: Instruction,
        addend: Unsigned24Bit,
    ) -> Result<Unsigned24Bit, super::Abort> {
        let ea = self.ea(mem, inst)?;
        let m = self.read(mem, ea)?;
        let (value, overflow) = add_m24(m, addend);
        self.write(mem, ea, value)?;
        self.regs.ov |= overflow;
        Ok(value)
    }

    pub(super) fn op_adm(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> OpResult {
        self.add_to_memory(mem, inst, self.regs.a)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_min(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> OpResult {
        self.add_to_memory(mem, inst, Unsigned24Bit::ONE)?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_mul(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        let product = mul48(self.regs.a, m);
        self.regs.a = product.a;
        self.regs.b = product.b;
        self.regs.ov |= product.overflow;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    /// Divide the AB pair by M.  On overflow the (meaningless)
    /// results of the division are still stored.
    pub(super) fn op_div(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let m = self.fetch_operand(mem, inst)?;
        let q = div48(self.regs.a, self.regs.b, m);
        if q.overflow {
            event!(
                Level::DEBUG,
                "division overflow: {:08o}{:08o} / {:08o}",
                self.regs.a,
                self.regs.b,
                m
            );
        }
        self.regs.a = q.quotient;
        self.regs.b = q.remainder;
        self.regs.ov |= q.overflow;
        Ok(ProgramCounterChange::CounterUpdate)
    }
}

#[cfg(test)]
mod tests {
    use base::prelude::*;

    use crate::control::tests::{inst, Harness};
    use crate::types::ProcessorMode;

    fn run_with_operand(op: Opcode, a: u32, m: u32) -> Harness {
        let mut h = Harness::new(ProcessorMode::Normal);
        h.store(0o500, m);
        h.control.registers_mut().a = Unsigned24Bit::try_from(a).expect("test data should fit");
        h.load_program(0o100, &[inst(op, 0o500)]);
        h.run(1);
        h
    }

    #[test]
    fn test_logical_operations() {
        assert_eq!(
            run_with_operand(Opcode::Etr, 0o7070, 0o7700).control.registers().a,
            0o7000_u32
        );
        assert_eq!(
            run_with_operand(Opcode::Mrg, 0o7070, 0o0707).control.registers().a,
            0o7777_u32
        );
        assert_eq!(
            run_with_operand(Opcode::Eor, 0o7070, 0o7777).control.registers().a,
            0o0707_u32
        );
    }

    #[test]
    fn test_add_sets_carry_in_x() {
        let h = run_with_operand(Opcode::Add, 0o77777777, 2);
        let regs = h.control.registers();
        assert_eq!(regs.a, 1_u32);
        assert!(regs.x.is_negative());
        assert!(!regs.ov);
    }

    #[test]
    fn test_add_overflow() {
        let h = run_with_operand(Opcode::Add, 0o37777777, 1);
        let regs = h.control.registers();
        assert_eq!(regs.a, 0o40000000_u32);
        assert!(!regs.x.is_negative());
        assert!(regs.ov);
    }

    #[test]
    fn test_sub() {
        let h = run_with_operand(Opcode::Sub, 5, 7);
        let regs = h.control.registers();
        assert_eq!(regs.a, 0o77777776_u32);
        // No carry out means there was a borrow.
        assert!(!regs.x.is_negative());
        let h = run_with_operand(Opcode::Sub, 7, 5);
        assert_eq!(h.control.registers().a, 2_u32);
        assert!(h.control.registers().x.is_negative());
    }

    #[test]
    fn test_double_precision_add() {
        // Add 0o00000001_77777777 to 0o00000002_00000001 using ADD
        // for the low halves and ADC for the high halves.
        let mut h = Harness::new(ProcessorMode::Normal);
        h.store(0o500, 0o77777777);
        h.store(0o501, 0o00000001);
        h.store(0o502, 0o00000001);
        h.store(0o503, 0o00000002);
        h.load_program(
            0o100,
            &[
                inst(Opcode::Lda, 0o500),
                inst(Opcode::Add, 0o502),
                inst(Opcode::Sta, 0o504),
                inst(Opcode::Lda, 0o501),
                inst(Opcode::Adc, 0o503),
                inst(Opcode::Sta, 0o505),
            ],
        );
        h.run(6);
        assert_eq!(h.fetch(0o504), 0);
        assert_eq!(h.fetch(0o505), 4);
    }

    #[test]
    fn test_suc_without_carry_subtracts_one_more() {
        let h = run_with_operand(Opcode::Suc, 7, 5);
        assert_eq!(h.control.registers().a, 1_u32);
    }

    #[test]
    fn test_memory_increment_and_add() {
        let h = run_with_operand(Opcode::Min, 0, 0o77777777);
        assert_eq!(h.fetch(0o500), 0);
        assert!(!h.control.registers().ov);

        let h = run_with_operand(Opcode::Adm, 3, 0o37777777);
        assert_eq!(h.fetch(0o500), 0o40000002);
        assert!(h.control.registers().ov);
        assert_eq!(h.control.registers().a, 3_u32);
    }

    #[test]
    fn test_mul_and_div() {
        let h = run_with_operand(Opcode::Mul, 6, 7);
        let regs = h.control.registers();
        // The 47-bit product is left-justified in AB.
        assert_eq!(regs.a, 0_u32);
        assert_eq!(regs.b, 84_u32);

        let mut h = Harness::new(ProcessorMode::Normal);
        h.store(0o500, 7);
        h.control.registers_mut().b = u24!(84);
        h.load_program(0o100, &[inst(Opcode::Div, 0o500)]);
        h.run(1);
        let regs = h.control.registers();
        assert_eq!(regs.a, 6_u32);
        assert_eq!(regs.b, 0_u32);
        assert!(!regs.ov);
    }

    #[test]
    fn test_div_overflow_sets_ov() {
        let h = run_with_operand(Opcode::Div, 0o100, 0o10);
        assert!(h.control.registers().ov);
    }
}
