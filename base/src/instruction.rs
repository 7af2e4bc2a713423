//! Binary representation of SDS 940 instructions.
//!
//! An SDS 940 instruction occupies one 24-bit word.  SDS
//! documentation numbers the bits from 0 (most significant) to 23
//! (least significant); here we number them the other way round, so
//! that bit 23 is the sign bit.  A memory-reference instruction looks
//! like this:
//!
//! |User |Index|POP  |Opcode |Indirect|Address |
//! |-----|-----|-----|-------|--------|--------|
//! |1 bit|1 bit|1 bit|6 bits | 1 bit  |14 bits |
//! |(23) |(22) |(21) |(20-15)|  (14)  |(13-0)  |
//!
//! When the POP bit is set, the opcode field is instead the number of
//! a programmed operator, which traps to location 0o100 plus that
//! number.
//!
//! The register change instruction (RCH, opcode 46) uses bits 14-0
//! as a mask of register transfers to perform.
//!
//! I/O instructions (EOM, EOD, SKS, PIN, POT and the compatible
//! buffer instructions) select a channel with bits 23-22 and bit 14,
//! use bits 13-12 as a mode and bits 11-0 as a function field whose
//! meaning depends on the mode.

use std::fmt::{self, Debug, Display, Formatter};

#[cfg(test)]
use test_strategy::{proptest, Arbitrary};

use super::types::Address;
use super::word::unsigned::{Unsigned12Bit, Unsigned15Bit, Unsigned24Bit, Unsigned3Bit, Unsigned6Bit};

pub const USER_FLAG_BIT: u32 = 1 << 23;
pub const INDEX_BIT: u32 = 1 << 22;
pub const POP_BIT: u32 = 1 << 21;
pub const INDIRECT_BIT: u32 = 1 << 14;
pub const ADDRESS_MASK: u32 = 0o37777;

/// An SDS 940 instruction word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Instruction(Unsigned24Bit);

impl Instruction {
    pub const fn bits(&self) -> Unsigned24Bit {
        self.0
    }

    /// Build a memory-reference instruction.
    pub fn memory_reference(
        opcode: Opcode,
        indirect: bool,
        indexed: bool,
        address: Address,
    ) -> Instruction {
        let mut w: u32 = (u32::from(opcode.number()) << 15) | u32::from(address);
        if indirect {
            w |= INDIRECT_BIT;
        }
        if indexed {
            w |= INDEX_BIT;
        }
        Instruction(Unsigned24Bit::from_low_bits(u64::from(w)))
    }

    /// Bit 23, which marks an address as belonging to the user's
    /// address space, and selects between system and user
    /// programmed operators.
    pub const fn user_flag(&self) -> bool {
        self.0.bits() & USER_FLAG_BIT != 0
    }

    pub const fn is_indexed(&self) -> bool {
        self.0.bits() & INDEX_BIT != 0
    }

    pub const fn is_pop(&self) -> bool {
        self.0.bits() & POP_BIT != 0
    }

    pub const fn is_indirect(&self) -> bool {
        self.0.bits() & INDIRECT_BIT != 0
    }

    /// The six-bit opcode field.  For a programmed operator this is
    /// the POP number.
    pub const fn opcode_number(&self) -> Unsigned6Bit {
        Unsigned6Bit::from_low_bits((self.0.bits() >> 15) as u64)
    }

    /// The opcode, if the instruction is not a programmed operator
    /// and the opcode field is defined.
    pub fn opcode(&self) -> Result<Opcode, DecodeFailure> {
        if self.is_pop() {
            Err(DecodeFailure::ProgrammedOperator(self.opcode_number()))
        } else {
            Opcode::try_from(self.opcode_number())
        }
    }

    /// The 14-bit address field.
    pub const fn address(&self) -> Address {
        Address::from_word(self.0)
    }

    /// The register-change microcode mask of an RCH instruction.
    pub const fn rch_mask(&self) -> Unsigned15Bit {
        Unsigned15Bit::from_low_bits(self.0.bits() as u64)
    }

    /// The channel selected by an I/O instruction.  Bits 23 and 22
    /// give the low two bits of the channel number; bit 14 supplies
    /// the 4s bit.
    pub const fn io_channel(&self) -> Unsigned3Bit {
        let bits = self.0.bits();
        let low = (bits >> 22) & 0b11;
        let high = if bits & INDIRECT_BIT != 0 { 0b100 } else { 0 };
        Unsigned3Bit::from_low_bits((high | low) as u64)
    }

    /// Bits 13-12 of an I/O instruction.
    pub const fn io_mode(&self) -> u8 {
        ((self.0.bits() >> 12) & 0b11) as u8
    }

    /// Bits 11-0 of an I/O instruction.
    pub const fn io_function(&self) -> Unsigned12Bit {
        Unsigned12Bit::from_low_bits(self.0.bits() as u64)
    }
}

impl From<Unsigned24Bit> for Instruction {
    fn from(w: Unsigned24Bit) -> Instruction {
        Instruction(w)
    }
}

impl From<Instruction> for Unsigned24Bit {
    fn from(inst: Instruction) -> Unsigned24Bit {
        inst.0
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        if self.is_pop() {
            write!(f, "POP{:02o}", self.opcode_number())?;
        } else {
            match Opcode::try_from(self.opcode_number()) {
                Ok(op) => write!(f, "{op}")?,
                Err(_) => write!(f, "?{:02o}", self.opcode_number())?,
            }
        }
        let star = if self.is_indirect() { "*" } else { "" };
        let tag = if self.is_indexed() { ",2" } else { "" };
        write!(f, "{star} {}{tag}", self.address())
    }
}

impl Debug for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:08o} ({self})", self.0)
    }
}

/// `Opcode` enumerates the defined SDS 940 opcodes.  The shift
/// instructions share two opcodes (66 and 67) and are distinguished
/// by bits 13-11 of their effective address.
#[repr(u8)]
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Opcode {
    Hlt = 0o00,
    Bru = 0o01,
    Eom = 0o02,
    Eod = 0o06,
    Miy = 0o10,
    Bri = 0o11,
    Miw = 0o12,
    Pot = 0o13,
    Etr = 0o14,
    Mrg = 0o16,
    Eor = 0o17,
    Nop = 0o20,
    Exu = 0o23,
    Yim = 0o30,
    Wim = 0o32,
    Pin = 0o33,
    Sta = 0o35,
    Stb = 0o36,
    Stx = 0o37,
    Sks = 0o40,
    Brx = 0o41,
    Brm = 0o43,
    Rch = 0o46,
    Ske = 0o50,
    Brr = 0o51,
    Skb = 0o52,
    Skn = 0o53,
    Sub = 0o54,
    Add = 0o55,
    Suc = 0o56,
    Adc = 0o57,
    Skr = 0o60,
    Min = 0o61,
    Xma = 0o62,
    Adm = 0o63,
    Mul = 0o64,
    Div = 0o65,
    RightShift = 0o66,
    LeftShift = 0o67,
    Skm = 0o70,
    Ldx = 0o71,
    Ska = 0o72,
    Skg = 0o73,
    Skd = 0o74,
    Ldb = 0o75,
    Lda = 0o76,
    Eax = 0o77,
}

impl Opcode {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Privileged instructions may not be executed in User mode.
    pub fn is_privileged(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Hlt | Bri | Eom | Eod | Pin | Pot | Miw | Miy | Wim | Yim | Sks
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        use Opcode::*;
        match self {
            Hlt => "HLT",
            Bru => "BRU",
            Eom => "EOM",
            Eod => "EOD",
            Miy => "MIY",
            Bri => "BRI",
            Miw => "MIW",
            Pot => "POT",
            Etr => "ETR",
            Mrg => "MRG",
            Eor => "EOR",
            Nop => "NOP",
            Exu => "EXU",
            Yim => "YIM",
            Wim => "WIM",
            Pin => "PIN",
            Sta => "STA",
            Stb => "STB",
            Stx => "STX",
            Sks => "SKS",
            Brx => "BRX",
            Brm => "BRM",
            Rch => "RCH",
            Ske => "SKE",
            Brr => "BRR",
            Skb => "SKB",
            Skn => "SKN",
            Sub => "SUB",
            Add => "ADD",
            Suc => "SUC",
            Adc => "ADC",
            Skr => "SKR",
            Min => "MIN",
            Xma => "XMA",
            Adm => "ADM",
            Mul => "MUL",
            Div => "DIV",
            RightShift => "RSH",
            LeftShift => "LSH",
            Skm => "SKM",
            Ldx => "LDX",
            Ska => "SKA",
            Skg => "SKG",
            Skd => "SKD",
            Ldb => "LDB",
            Lda => "LDA",
            Eax => "EAX",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(self.mnemonic())
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeFailure;
    fn try_from(opcode: u8) -> Result<Opcode, DecodeFailure> {
        use Opcode::*;
        match opcode {
            0o00 => Ok(Hlt),
            0o01 => Ok(Bru),
            0o02 => Ok(Eom),
            0o06 => Ok(Eod),
            0o10 => Ok(Miy),
            0o11 => Ok(Bri),
            0o12 => Ok(Miw),
            0o13 => Ok(Pot),
            0o14 => Ok(Etr),
            0o16 => Ok(Mrg),
            0o17 => Ok(Eor),

            0o20 => Ok(Nop),
            0o23 => Ok(Exu),
            0o30 => Ok(Yim),
            0o32 => Ok(Wim),
            0o33 => Ok(Pin),
            0o35 => Ok(Sta),
            0o36 => Ok(Stb),
            0o37 => Ok(Stx),

            0o40 => Ok(Sks),
            0o41 => Ok(Brx),
            0o43 => Ok(Brm),
            0o46 => Ok(Rch),

            0o50 => Ok(Ske),
            0o51 => Ok(Brr),
            0o52 => Ok(Skb),
            0o53 => Ok(Skn),
            0o54 => Ok(Sub),
            0o55 => Ok(Add),
            0o56 => Ok(Suc),
            0o57 => Ok(Adc),

            0o60 => Ok(Skr),
            0o61 => Ok(Min),
            0o62 => Ok(Xma),
            0o63 => Ok(Adm),
            0o64 => Ok(Mul),
            0o65 => Ok(Div),
            0o66 => Ok(RightShift),
            0o67 => Ok(LeftShift),

            0o70 => Ok(Skm),
            0o71 => Ok(Ldx),
            0o72 => Ok(Ska),
            0o73 => Ok(Skg),
            0o74 => Ok(Skd),
            0o75 => Ok(Ldb),
            0o76 => Ok(Lda),
            0o77 => Ok(Eax),
            _ => Err(DecodeFailure::InvalidOpcode(opcode)),
        }
    }
}

impl TryFrom<Unsigned6Bit> for Opcode {
    type Error = DecodeFailure;
    fn try_from(opcode: Unsigned6Bit) -> Result<Opcode, DecodeFailure> {
        Opcode::try_from(u8::from(opcode))
    }
}

/// Signals that an instruction's opcode field could not be decoded
/// as an [`Opcode`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DecodeFailure {
    /// The opcode field does not correspond to a defined opcode.
    InvalidOpcode(u8),

    /// The POP bit is set, so the opcode field is a programmed
    /// operator number.
    ProgrammedOperator(Unsigned6Bit),
}

impl Display for DecodeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            DecodeFailure::InvalidOpcode(n) => write!(f, "invalid opcode {n:02o}"),
            DecodeFailure::ProgrammedOperator(n) => write!(f, "programmed operator {n:02o}"),
        }
    }
}

impl std::error::Error for DecodeFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(w: u32) -> Instruction {
        Instruction::from(Unsigned24Bit::try_from(w).expect("test data should be in range"))
    }

    #[test]
    fn test_lda_indirect_indexed() {
        // LDA* 1234,2
        let i = inst(0o7641234 | INDEX_BIT);
        assert!(i.is_indexed());
        assert!(i.is_indirect());
        assert!(!i.is_pop());
        assert!(!i.user_flag());
        assert_eq!(i.opcode(), Ok(Opcode::Lda));
        assert_eq!(u32::from(i.address()), 0o1234);
    }

    #[test]
    fn test_pop() {
        let i = inst(POP_BIT | (0o12 << 15) | 0o500);
        assert!(i.is_pop());
        assert_eq!(i.opcode_number(), Unsigned6Bit::try_from(0o12_u8).unwrap());
        assert_eq!(
            i.opcode(),
            Err(DecodeFailure::ProgrammedOperator(
                Unsigned6Bit::try_from(0o12_u8).unwrap()
            ))
        );
    }

    #[test]
    fn test_io_fields() {
        // EOM on channel 5 (bits 23-22 = 01, bit 14 set), mode 2.
        let i = inst((1 << 22) | (0o02 << 15) | INDIRECT_BIT | (2 << 12) | 0o1234);
        assert_eq!(i.io_channel(), Unsigned3Bit::try_from(5_u8).unwrap());
        assert_eq!(i.io_mode(), 2);
        assert_eq!(i.io_function(), Unsigned12Bit::try_from(0o1234_u16).unwrap());
    }

    #[test]
    fn test_rch_mask() {
        let i = inst((0o46 << 15) | 0o40014);
        assert_eq!(i.opcode(), Ok(Opcode::Rch));
        assert_eq!(i.rch_mask(), Unsigned15Bit::try_from(0o40014_u16).unwrap());
    }

    #[test]
    fn test_undefined_opcodes() {
        for n in [0o03_u8, 0o04, 0o05, 0o07, 0o15, 0o21, 0o22, 0o24, 0o34, 0o42, 0o44, 0o47] {
            assert_eq!(Opcode::try_from(n), Err(DecodeFailure::InvalidOpcode(n)));
        }
    }

    #[test]
    fn test_privileged() {
        assert!(Opcode::Hlt.is_privileged());
        assert!(Opcode::Sks.is_privileged());
        assert!(!Opcode::Bru.is_privileged());
        assert!(!Opcode::Lda.is_privileged());
    }

    #[test]
    fn test_display() {
        assert_eq!(inst(0o7600100).to_string(), "LDA 00100");
        assert_eq!(inst(0o0140200 | INDEX_BIT).to_string(), "BRU* 00200,2");
        assert_eq!(inst(POP_BIT | (0o12 << 15) | 5).to_string(), "POP12 00005");
    }

    #[test]
    fn test_memory_reference() {
        let a = Address::try_from(0o1234_u32).unwrap();
        let i = Instruction::memory_reference(Opcode::Sta, true, false, a);
        assert_eq!(i.bits(), 0o3541234_u32);
    }

    #[proptest]
    fn opcode_number_round_trip(op: Opcode) {
        assert_eq!(Opcode::try_from(op.number()), Ok(op));
    }

    #[derive(Debug, Arbitrary)]
    struct Fields {
        user: bool,
        indexed: bool,
        pop: bool,
        #[strategy(0u32..64)]
        opcode: u32,
        indirect: bool,
        #[strategy(0u32..0o40000)]
        address: u32,
    }

    #[proptest]
    fn field_accessors(fields: Fields) {
        let mut w = (fields.opcode << 15) | fields.address;
        if fields.user {
            w |= USER_FLAG_BIT;
        }
        if fields.indexed {
            w |= INDEX_BIT;
        }
        if fields.pop {
            w |= POP_BIT;
        }
        if fields.indirect {
            w |= INDIRECT_BIT;
        }
        let i = inst(w);
        assert_eq!(i.user_flag(), fields.user);
        assert_eq!(i.is_indexed(), fields.indexed);
        assert_eq!(i.is_pop(), fields.pop);
        assert_eq!(i.is_indirect(), fields.indirect);
        assert_eq!(u32::from(i.opcode_number()), fields.opcode);
        assert_eq!(u32::from(i.address()), fields.address);
    }
}
