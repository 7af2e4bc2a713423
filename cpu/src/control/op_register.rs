//! Register change (RCH, opcode 46).
//!
//! The low bits of an RCH instruction are microcode: each bit clears
//! a register or copies one register into another.  All the source
//! values are taken before any register is changed, so for example
//! CAB and CBA together (XAB) exchange A and B.  When several
//! transfers have the same destination, it receives the OR of their
//! sources.
use base::prelude::*;

use super::{ControlUnit, OpResult, ProgramCounterChange};

pub(crate) const CLA: u32 = 0o1;
pub(crate) const CLB: u32 = 0o2;
pub(crate) const CAB: u32 = 0o4;
pub(crate) const CBA: u32 = 0o10;
pub(crate) const CBX: u32 = 0o20;
pub(crate) const CXB: u32 = 0o40;
/// Transfers affect only the exponent part (bits 8-0) of the
/// destination.
pub(crate) const EXPONENT_ONLY: u32 = 0o100;
pub(crate) const CXA: u32 = 0o200;
pub(crate) const CAX: u32 = 0o400;
pub(crate) const CNA: u32 = 0o1000;
pub(crate) const CLX: u32 = 0o40000;

const EXPONENT_MASK: u32 = 0o777;

/// Work out the new value of one register.  `sources` lists the
/// transfers which could write it.
fn change(
    mask: u32,
    current: Unsigned24Bit,
    clear: u32,
    sources: &[(u32, Unsigned24Bit)],
) -> Unsigned24Bit {
    let cleared = if mask & clear != 0 {
        Unsigned24Bit::ZERO
    } else {
        current
    };
    let merged = sources
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .fold(None, |acc: Option<u32>, (_, value)| {
            Some(acc.unwrap_or(0) | value.bits())
        });
    let Some(merged) = merged else {
        return cleared;
    };
    if mask & EXPONENT_ONLY != 0 {
        Unsigned24Bit::from_low_bits(u64::from(
            (cleared.bits() & !EXPONENT_MASK) | (merged & EXPONENT_MASK),
        ))
    } else {
        Unsigned24Bit::from_low_bits(u64::from(merged))
    }
}

impl ControlUnit {
    pub(super) fn op_rch(&mut self, inst: Instruction) -> OpResult {
        let mask = u32::from(inst.rch_mask());
        let (a, b, x) = (self.regs.a, self.regs.b, self.regs.x);
        self.regs.a = change(mask, a, CLA, &[(CBA, b), (CXA, x), (CNA, a.negate())]);
        self.regs.b = change(mask, b, CLB, &[(CAB, a), (CXB, x)]);
        self.regs.x = change(mask, x, CLX, &[(CBX, b), (CAX, a)]);
        Ok(ProgramCounterChange::CounterUpdate)
    }
}

#[cfg(test)]
mod tests {
    use base::prelude::*;

    use super::*;
    use crate::control::tests::{inst, Harness};
    use crate::types::ProcessorMode;

    fn rch(mask: u32, a: u32, b: u32, x: u32) -> (u32, u32, u32) {
        let mut h = Harness::new(ProcessorMode::Normal);
        let regs = h.control.registers_mut();
        regs.a = Unsigned24Bit::try_from(a).expect("test data should fit");
        regs.b = Unsigned24Bit::try_from(b).expect("test data should fit");
        regs.x = Unsigned24Bit::try_from(x).expect("test data should fit");
        h.load_program(0o100, &[inst(Opcode::Rch, mask)]);
        h.run(1);
        let regs = h.control.registers();
        (regs.a.bits(), regs.b.bits(), regs.x.bits())
    }

    #[test]
    fn test_clear() {
        assert_eq!(rch(CLA, 1, 2, 3), (0, 2, 3));
        assert_eq!(rch(CLB | CLX, 1, 2, 3), (1, 0, 0));
    }

    #[test]
    fn test_exchange_a_and_b() {
        assert_eq!(rch(CAB | CBA, 0o1111, 0o2222, 3), (0o2222, 0o1111, 3));
    }

    #[test]
    fn test_copy() {
        // CAB on its own leaves A alone and replaces B.
        assert_eq!(rch(CAB, 0o1111, 0o2222, 0), (0o1111, 0o1111, 0));
        assert_eq!(rch(CXA, 0o1111, 0o2222, 7), (7, 0o2222, 7));
        // X and B exchanged.
        assert_eq!(rch(CBX | CXB, 0, 0o2222, 7), (0, 7, 0o2222));
    }

    #[test]
    fn test_negate_a() {
        assert_eq!(rch(CNA, 1, 0, 0), (0o77777777, 0, 0));
    }

    #[test]
    fn test_transfers_to_one_register_merge() {
        assert_eq!(rch(CBA | CXA, 0o7000, 0o0070, 0o0007), (0o0077, 0o0070, 0o0007));
    }

    #[test]
    fn test_exponent_only() {
        assert_eq!(
            rch(CBA | EXPONENT_ONLY, 0o12345670, 0o76543210, 0),
            (0o12345210, 0o76543210, 0)
        );
        // With CLA the rest of A is cleared.
        assert_eq!(
            rch(CLA | CBA | EXPONENT_ONLY, 0o12345670, 0o76543210, 0),
            (0o210, 0o76543210, 0)
        );
    }
}
