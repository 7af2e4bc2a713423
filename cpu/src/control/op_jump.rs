//! ## Branch opcodes
//!
//! - BRU: [`ControlUnit::op_bru`]
//! - BRX: [`ControlUnit::op_brx`]
//! - BRM: [`ControlUnit::op_brm`]
//! - BRR: [`ControlUnit::op_brr`]
//! - BRI: [`ControlUnit::op_bri`]
//!
//! In Monitor mode, a branch to an address carrying the user flag
//! enters User mode, unless the monitor-to-user trap is armed.  In
//! that case the trap happens instead (and is disarmed), with P
//! already holding the branch target.
use tracing::{event, Level};

use base::prelude::*;

use super::{Abort, ControlUnit, EffectiveAddress, OpResult, ProgramCounterChange, Trap};
use crate::memory::MemoryUnit;
use crate::memorymap::Access;
use crate::types::ProcessorMode;

const RETURN_OVERFLOW_BIT: u32 = 1 << 21;

impl ControlUnit {
    fn branch(&mut self, target: EffectiveAddress) -> OpResult {
        self.translate(target, Access::Read)?;
        if self.mode == ProcessorMode::Monitor && target.user {
            if self.m2u_trap_armed {
                self.m2u_trap_armed = false;
                self.regs.p = target.va;
                return Err(Trap::MonitorToUser.into());
            }
            event!(Level::DEBUG, "entering user mode at {}", target.va);
            self.set_mode(ProcessorMode::User);
        }
        Ok(ProgramCounterChange::Jump(target.va))
    }

    pub(super) fn op_bru(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let target = self.ea(mem, inst)?;
        self.branch(target)
    }

    /// Increment X, and branch if bit 14 of the result is set.
    pub(super) fn op_brx(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let target = self.ea(mem, inst)?;
        self.regs.x = self.regs.x.wrapping_add(Unsigned24Bit::ONE);
        if self.regs.x.bits() & INDIRECT_BIT != 0 {
            self.branch(target)
        } else {
            Ok(ProgramCounterChange::CounterUpdate)
        }
    }

    /// Mark place and branch: store the return word at the effective
    /// address and continue at the following location.
    pub(super) fn op_brm(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> OpResult {
        let target = self.ea(mem, inst)?;
        let return_word = self.return_word();
        self.write(mem, target, return_word)?;
        self.regs.ov = false;
        self.branch(target.successor())
    }

    /// Read a return word made by BRM, restore the overflow flag
    /// from it, and work out where to go back to.
    fn unwind(
        &mut self,
        mem: &MemoryUnit,
        inst: Instruction,
    ) -> Result<(Unsigned24Bit, EffectiveAddress), Abort> {
        let ea = self.ea(mem, inst)?;
        let return_word = self.read(mem, ea)?;
        let bits = return_word.bits();
        let user = match self.mode {
            ProcessorMode::Normal => {
                self.regs.ov |= bits & SIGN_BIT != 0;
                false
            }
            ProcessorMode::Monitor => {
                self.regs.ov |= bits & RETURN_OVERFLOW_BIT != 0;
                bits & USER_FLAG_BIT != 0
            }
            ProcessorMode::User => {
                self.regs.ov |= bits & RETURN_OVERFLOW_BIT != 0;
                false
            }
        };
        Ok((
            return_word,
            EffectiveAddress {
                va: Address::from_word(return_word).successor(),
                user,
            },
        ))
    }

    pub(super) fn op_brr(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let (_, target) = self.unwind(mem, inst)?;
        self.branch(target)
    }

    /// Return from an interrupt.  As BRR, but also dismisses the
    /// active interrupt level and (in Normal mode) restores the
    /// memory extension registers saved by BRM.  No interrupt is
    /// accepted until the instruction after the return has run.
    pub(super) fn op_bri(&mut self, mem: &MemoryUnit, inst: Instruction) -> OpResult {
        let (return_word, target) = self.unwind(mem, inst)?;
        if self.mode == ProcessorMode::Normal {
            let bits = return_word.bits();
            self.map
                .set_em3(Unsigned3Bit::from_low_bits(u64::from(bits >> 18)));
            self.map
                .set_em2(Unsigned3Bit::from_low_bits(u64::from(bits >> 15)));
        }
        if self.interrupts.dismiss().is_none() {
            event!(Level::DEBUG, "BRI with no active interrupt level");
        }
        self.interrupts.defer_next();
        self.branch(target)
    }
}

/// Build a return word by hand, for tests which need one.
#[cfg(test)]
pub(crate) fn return_word(user: bool, ov: bool, pc: u32) -> u32 {
    let mut bits = pc;
    if user {
        bits |= USER_FLAG_BIT;
    }
    if ov {
        bits |= RETURN_OVERFLOW_BIT;
    }
    bits
}

#[cfg(test)]
mod tests {
    use base::prelude::*;

    use super::return_word;
    use crate::control::tests::{inst, Harness};
    use crate::types::ProcessorMode;

    fn p(h: &Harness) -> u32 {
        u32::from(h.control.registers().p)
    }

    #[test]
    fn test_bru_indirect() {
        let mut h = Harness::new(ProcessorMode::Normal);
        h.store(0o500, 0o2345);
        h.load_program(0o100, &[inst(Opcode::Bru, 0o500) | INDIRECT_BIT]);
        h.run(1);
        assert_eq!(p(&h), 0o2345);
    }

    #[test]
    fn test_brx_loop_counts_to_zero() {
        // X starts at -3 and the loop body is the BRX itself.
        let mut h = Harness::new(ProcessorMode::Normal);
        h.control.registers_mut().x = u24!(0o77777775);
        h.load_program(0o100, &[inst(Opcode::Brx, 0o100)]);
        h.run(1);
        assert_eq!(p(&h), 0o100);
        h.run(1);
        assert_eq!(p(&h), 0o100);
        h.run(1);
        assert_eq!(p(&h), 0o101);
        assert_eq!(h.control.registers().x, 0_u32);
    }

    #[test]
    fn test_brm_brr_normal_mode() {
        let mut h = Harness::new(ProcessorMode::Normal);
        h.control.registers_mut().ov = true;
        h.control.translator_mut().set_em2(u3!(5));
        h.load_program(0o100, &[inst(Opcode::Brm, 0o1000)]);
        h.store(0o1001, inst(Opcode::Brr, 0o1000));
        h.run(1);
        assert_eq!(p(&h), 0o1001);
        // OV, EM3 (3) and EM2 (5) are saved; OV is then cleared.
        assert_eq!(h.fetch(0o1000), 0o43500100);
        assert!(!h.control.registers().ov);
        h.run(1);
        assert_eq!(p(&h), 0o101);
        assert!(h.control.registers().ov);
    }

    #[test]
    fn test_brr_in_monitor_mode_can_enter_user_mode() {
        let mut h = Harness::new(ProcessorMode::Monitor);
        h.store(0o600, return_word(true, true, 0o1777));
        h.load_program(0o100, &[inst(Opcode::Brr, 0o600)]);
        h.run(1);
        assert_eq!(h.control.mode(), ProcessorMode::User);
        assert_eq!(p(&h), 0o2000);
        assert!(h.control.registers().ov);
    }

    #[test]
    fn test_bri_dismisses_and_defers() {
        let mut h = Harness::new(ProcessorMode::Normal);
        let level = u5!(3);
        h.control.interrupts_mut().enable();
        h.control.interrupts_mut().request(level);
        h.control.interrupts_mut().accept(level);
        h.control.interrupts_mut().request(u5!(2));
        h.store(0o700, 0o01400123);
        h.load_program(0o100, &[inst(Opcode::Bri, 0o700)]);
        h.run(1);
        assert_eq!(p(&h), 0o124);
        assert!(!h.control.interrupts().is_active(level));
        assert!(!h.control.interrupts().is_requested(level));
        // EM3 and EM2 came back from the return word.
        assert_eq!(h.control.translator().registers().em3, u3!(1));
        assert_eq!(h.control.translator().registers().em2, u3!(4));
        // Level 2 is waiting, but must wait one more instruction.
        assert_eq!(h.control.interrupts_mut().next_acceptable(), None);
        assert_eq!(h.control.interrupts_mut().next_acceptable(), Some(u5!(2)));
    }
}
