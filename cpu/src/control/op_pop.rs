//! Programmed operators.
//!
//! An instruction with bit 21 set is a POP: bits 20-15 give its
//! number `n`, and the instruction behaves as a BRM to location
//! `0o100 + n` which stores its return word at location 0 rather than
//! at the branch target.
//!
//! In User mode a POP whose user flag is clear is a system POP, and
//! it is how a user program calls the monitor.  It enters Monitor
//! mode.  A user POP (user flag set) stays in User mode.
use tracing::{event, Level};

use base::prelude::*;

use super::{word, ControlUnit, EffectiveAddress, OpResult, ProgramCounterChange};
use crate::memory::MemoryUnit;
use crate::types::ProcessorMode;

const POP_VECTOR_BASE: u32 = 0o100;

impl ControlUnit {
    pub(super) fn op_pop(
        &mut self,
        mem: &mut MemoryUnit,
        inst: Instruction,
        number: Unsigned6Bit,
    ) -> OpResult {
        let pc = u32::from(self.regs.n_address);
        let ov = u32::from(self.regs.ov);
        let return_word = match self.mode {
            ProcessorMode::Normal => (ov << 23) | pc,
            ProcessorMode::Monitor => (ov << 21) | pc,
            ProcessorMode::User => {
                if !inst.user_flag() {
                    event!(Level::DEBUG, "system POP {:02o} from user mode", number);
                    self.set_mode(ProcessorMode::Monitor);
                }
                SIGN_BIT | (ov << 21) | pc
            }
        };
        self.write(mem, EffectiveAddress::system(Address::ZERO), word(return_word))?;
        self.regs.ov = false;
        let target = Address::from_word(word(POP_VECTOR_BASE + u32::from(u8::from(number))));
        Ok(ProgramCounterChange::Jump(target))
    }
}

#[cfg(test)]
mod tests {
    use base::prelude::*;

    use crate::control::tests::Harness;
    use crate::types::ProcessorMode;

    fn pop(number: u32) -> u32 {
        POP_BIT | (number << 15)
    }

    fn p(h: &Harness) -> u32 {
        u32::from(h.control.registers().p)
    }

    #[test]
    fn test_pop_in_normal_mode() {
        let mut h = Harness::new(ProcessorMode::Normal);
        h.control.registers_mut().ov = true;
        h.load_program(0o1000, &[pop(0o12)]);
        h.run(1);
        assert_eq!(p(&h), 0o112);
        assert_eq!(h.fetch(0), 0o40001000);
        assert!(!h.control.registers().ov);
    }

    #[test]
    fn test_pop_in_monitor_mode() {
        let mut h = Harness::new(ProcessorMode::Monitor);
        h.control.registers_mut().ov = true;
        h.load_program(0o1000, &[pop(0o77)]);
        h.run(1);
        assert_eq!(p(&h), 0o177);
        assert_eq!(h.fetch(0), 0o10001000);
        assert_eq!(h.control.mode(), ProcessorMode::Monitor);
    }

    #[test]
    fn test_system_pop_from_user_mode_enters_monitor() {
        let mut h = Harness::new(ProcessorMode::User);
        // User page 0 is frame 0, so the user program and the
        // monitor's page 0 are the same memory here.
        h.load_program(0o1000, &[pop(0o3)]);
        h.run(1);
        assert_eq!(h.control.mode(), ProcessorMode::Monitor);
        assert_eq!(p(&h), 0o103);
        assert_eq!(h.fetch(0), 0o40001000);
    }

    #[test]
    fn test_user_pop_stays_in_user_mode() {
        let mut h = Harness::new(ProcessorMode::User);
        h.control.registers_mut().ov = true;
        h.load_program(0o1000, &[pop(0o3) | USER_FLAG_BIT]);
        h.run(1);
        assert_eq!(h.control.mode(), ProcessorMode::User);
        assert_eq!(p(&h), 0o103);
        assert_eq!(h.fetch(0), 0o50001000);
        assert!(!h.control.registers().ov);
    }
}
