//! Instruction timing.
//!
//! The simulator does not model the machine's timing exactly.  Each
//! instruction is charged a number of memory cycles according to its
//! opcode, plus one cycle for each indirect word and each EXU in the
//! chain which led to it.  Simulated time advances by that many
//! cycles of 1.75 microseconds.

use base::prelude::*;

/// Duration of one memory cycle.
pub const MEMORY_CYCLE_NS: u64 = 1_750;

fn base_cycles(inst: Instruction) -> u64 {
    let opcode = match inst.opcode() {
        Ok(opcode) => opcode,
        // A POP stores a word as well as fetching the instruction.
        Err(DecodeFailure::ProgrammedOperator(_)) => return 2,
        Err(DecodeFailure::InvalidOpcode(_)) => return 1,
    };
    match opcode {
        Opcode::Hlt
        | Opcode::Nop
        | Opcode::Exu
        | Opcode::Bru
        | Opcode::Brx
        | Opcode::Eax
        | Opcode::Rch
        | Opcode::Eom
        | Opcode::Eod
        | Opcode::Sks => 1,

        Opcode::Brm | Opcode::Brr | Opcode::Bri => 2,

        Opcode::Lda
        | Opcode::Ldb
        | Opcode::Ldx
        | Opcode::Sta
        | Opcode::Stb
        | Opcode::Stx
        | Opcode::Etr
        | Opcode::Mrg
        | Opcode::Eor
        | Opcode::Add
        | Opcode::Sub
        | Opcode::Adc
        | Opcode::Suc
        | Opcode::Ske
        | Opcode::Skb
        | Opcode::Skn
        | Opcode::Skm
        | Opcode::Ska
        | Opcode::Skg
        | Opcode::Skd => 2,

        // Read, modify and write back.
        Opcode::Xma | Opcode::Adm | Opcode::Min | Opcode::Skr => 3,

        Opcode::Mul => 7,
        Opcode::Div => 10,

        Opcode::RightShift | Opcode::LeftShift => 2,

        Opcode::Pin | Opcode::Pot | Opcode::Miw | Opcode::Miy | Opcode::Wim | Opcode::Yim => 2,
    }
}

/// Estimate how long `inst` took to execute, given the number of
/// additional memory cycles used in finding its operand.
#[must_use]
pub fn estimate_instruction_ns(inst: Instruction, extra_cycles: u32) -> u64 {
    (base_cycles(inst) + u64::from(extra_cycles)) * MEMORY_CYCLE_NS
}

#[cfg(test)]
mod tests {
    use base::prelude::*;

    use super::*;

    fn instruction(bits: u32) -> Instruction {
        Instruction::from(Unsigned24Bit::try_from(bits).expect("test data should fit"))
    }

    #[test]
    fn test_simple_instructions() {
        let lda = instruction(u32::from(Opcode::Lda.number()) << 15);
        assert_eq!(estimate_instruction_ns(lda, 0), 3_500);
        let nop = instruction(u32::from(Opcode::Nop.number()) << 15);
        assert_eq!(estimate_instruction_ns(nop, 0), 1_750);
    }

    #[test]
    fn test_indirection_costs_a_cycle_per_word() {
        let lda = instruction((u32::from(Opcode::Lda.number()) << 15) | INDIRECT_BIT);
        assert_eq!(estimate_instruction_ns(lda, 3), 5 * MEMORY_CYCLE_NS);
    }

    #[test]
    fn test_slow_instructions() {
        let div = instruction(u32::from(Opcode::Div.number()) << 15);
        let mul = instruction(u32::from(Opcode::Mul.number()) << 15);
        assert!(estimate_instruction_ns(div, 0) > estimate_instruction_ns(mul, 0));
        assert!(estimate_instruction_ns(mul, 0) > 3 * MEMORY_CYCLE_NS);
    }

    #[test]
    fn test_programmed_operator() {
        let pop = instruction(POP_BIT | (0o12 << 15));
        assert_eq!(estimate_instruction_ns(pop, 0), 2 * MEMORY_CYCLE_NS);
    }
}
