//! Shifts of the AB register pair
//! - RSH, RCY, LRSH: [`ControlUnit::op_right_shift`]
//! - LSH, NOD, LCY: [`ControlUnit::op_left_shift`]
//!
//! Opcodes 66 and 67 each cover several shift instructions; bits 13-11
//! of the shift address choose among them and bits 8-0 hold the
//! count.
use base::prelude::*;

use super::{ControlUnit, OpResult, ProgramCounterChange};
use crate::alarm::AlarmDetails;
use crate::arith::{shift_count, shift_left, shift_right, LeftShift, RightShift, Shifted};
use crate::memory::MemoryUnit;

fn sub_op(va: Address) -> u32 {
    (u32::from(va) >> 11) & 0o7
}

impl ControlUnit {
    fn load_shifted(&mut self, shifted: &Shifted) {
        self.regs.a = shifted.a;
        self.regs.b = shifted.b;
    }

    fn undefined_shift(&mut self, inst: Instruction) -> OpResult {
        self.complain(AlarmDetails::IllegalInstruction {
            instruction: inst,
            message: "undefined shift operation".to_string(),
        })?;
        Ok(ProgramCounterChange::CounterUpdate)
    }

    pub(super) fn op_right_shift(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let ea = self.ea_shift(mem, inst)?;
        let kind = match sub_op(ea.va) {
            0 => RightShift::Arithmetic,
            4 => RightShift::Cycle,
            5 => RightShift::Logical,
            _ => {
                return self.undefined_shift(inst);
            }
        };
        let count = shift_count(ea.va.into());
        let shifted = shift_right(kind, self.regs.a, self.regs.b, count);
        self.load_shifted(&shifted);
        Ok(ProgramCounterChange::CounterUpdate)
    }

    /// NOD also subtracts the number of places shifted from X.
    pub(super) fn op_left_shift(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let ea = self.ea_shift(mem, inst)?;
        let kind = match sub_op(ea.va) {
            0 => LeftShift::Arithmetic,
            2 => LeftShift::Normalize,
            4 => LeftShift::Cycle,
            _ => {
                return self.undefined_shift(inst);
            }
        };
        let count = shift_count(ea.va.into());
        let shifted = shift_left(kind, self.regs.a, self.regs.b, count);
        self.load_shifted(&shifted);
        match kind {
            LeftShift::Arithmetic => {
                self.regs.ov |= shifted.overflow;
            }
            LeftShift::Normalize => {
                self.regs.x = self
                    .regs
                    .x
                    .wrapping_sub(Unsigned24Bit::from_low_bits(u64::from(shifted.shifts)));
            }
            LeftShift::Cycle => (),
        }
        Ok(ProgramCounterChange::CounterUpdate)
    }
}

#[cfg(test)]
mod tests {
    use base::prelude::*;

    use crate::alarm::AlarmKind;
    use crate::control::tests::{inst, Harness};
    use crate::types::ProcessorMode;

    const RCY: u32 = 0o20000;
    const LRSH: u32 = 0o24000;
    const NOD: u32 = 0o10000;
    const LCY: u32 = 0o20000;

    fn shift(op: Opcode, address: u32, a: u32, b: u32) -> Harness {
        let mut h = Harness::new(ProcessorMode::Normal);
        let regs = h.control.registers_mut();
        regs.a = Unsigned24Bit::try_from(a).expect("test data should fit");
        regs.b = Unsigned24Bit::try_from(b).expect("test data should fit");
        h.load_program(0o100, &[inst(op, address)]);
        h.run(1);
        h
    }

    fn ab(h: &Harness) -> (u32, u32) {
        let regs = h.control.registers();
        (regs.a.bits(), regs.b.bits())
    }

    #[test]
    fn test_right_shifts() {
        let h = shift(Opcode::RightShift, 3, 0o40000000, 0);
        assert_eq!(ab(&h), (0o74000000, 0));
        let h = shift(Opcode::RightShift, LRSH | 3, 0o40000000, 0);
        assert_eq!(ab(&h), (0o04000000, 0));
        let h = shift(Opcode::RightShift, RCY | 24, 0o12345670, 0o76543210);
        assert_eq!(ab(&h), (0o76543210, 0o12345670));
    }

    #[test]
    fn test_left_shift_overflow() {
        let h = shift(Opcode::LeftShift, 1, 0o20000000, 0);
        assert_eq!(ab(&h), (0o40000000, 0));
        assert!(h.control.registers().ov);
        let h = shift(Opcode::LeftShift, LCY | 1, 0o40000000, 0);
        assert_eq!(ab(&h), (0, 1));
        assert!(!h.control.registers().ov);
    }

    #[test]
    fn test_normalize_counts_down_x() {
        let mut h = Harness::new(ProcessorMode::Normal);
        h.control.registers_mut().a = u24!(1);
        h.control.registers_mut().x = u24!(100);
        h.load_program(0o100, &[inst(Opcode::LeftShift, NOD | 48)]);
        h.run(1);
        assert_eq!(h.control.registers().a, 0o20000000_u32);
        // The 1 starts in bit 24 of the pair and stops in bit 46.
        assert_eq!(h.control.registers().x, 78_u32);
    }

    #[test]
    fn test_indexing_changes_only_the_count() {
        let mut h = Harness::new(ProcessorMode::Normal);
        h.control.registers_mut().a = u24!(0o12345670);
        h.control.registers_mut().b = u24!(0o76543210);
        // 12 + 12 = 24; the upper bits of X leave the shift type
        // alone.
        h.control.registers_mut().x = u24!(0o77777014);
        h.load_program(0o100, &[inst(Opcode::RightShift, RCY | 12) | INDEX_BIT]);
        h.run(1);
        assert_eq!(ab(&h), (0o76543210, 0o12345670));
    }

    #[test]
    fn test_indexed_indirect_shift_uses_the_whole_address() {
        let mut h = Harness::new(ProcessorMode::Normal);
        h.control.registers_mut().a = u24!(0o12345670);
        h.control.registers_mut().b = u24!(0o76543210);
        // The index register carries into the shift type, turning the
        // RCY 12 at 200 into LRSH 24.
        h.control.registers_mut().x = u24!(0o4014);
        h.store(0o200, (RCY | 12) | INDEX_BIT);
        h.load_program(0o100, &[inst(Opcode::RightShift, 0o200) | INDIRECT_BIT]);
        h.run(1);
        assert_eq!(ab(&h), (0, 0o12345670));
    }

    #[test]
    fn test_undefined_shift_is_illegal() {
        let mut h = Harness::new(ProcessorMode::Normal);
        h.load_program(0o100, &[inst(Opcode::RightShift, 0o4000 | 1)]);
        assert!(h.step().is_err());

        let mut h = Harness::new(ProcessorMode::Normal);
        h.control
            .set_alarm_masked(AlarmKind::IllegalInstruction, true)
            .expect("illegal instruction alarms are maskable");
        h.control.registers_mut().a = u24!(0o40);
        h.load_program(0o100, &[inst(Opcode::LeftShift, 0o4000 | 1)]);
        h.run(1);
        assert_eq!(h.control.registers().a, 0o40_u32);
        assert_eq!(u32::from(h.control.registers().p), 0o101);
    }
}
