//! Virtual and physical addresses.
//!
//! The SDS 940 has two address spaces.  Programs (and the P
//! register) use 14-bit virtual addresses; these are turned into
//! physical addresses (at most 16 bits, for 64K words of memory) by
//! the address translator in the cpu crate.  I/O channels address
//! physical memory directly.
use std::fmt::{Debug, Display, Error, Formatter, Octal};

use super::word::error::ConversionFailed;
use super::word::unsigned::{Unsigned14Bit, Unsigned24Bit, Unsigned3Bit, Unsigned5Bit};

/// Number of words in a page.  Monitor and User mode map virtual
/// memory in units of this size.
pub const PAGE_SIZE: u32 = 2048;

/// Low-order bits of an address which give the offset within a page.
pub const PAGE_OFFSET_MASK: u32 = PAGE_SIZE - 1;

/// The `IndexBy` trait implements address arithmetic (adding a
/// value to an address).  Virtual address arithmetic wraps around
/// at 14 bits, just as incrementing the P register does.
pub trait IndexBy<T> {
    fn index_by(&self, delta: T) -> Address;
}

/// A 14-bit virtual address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(Unsigned14Bit);

impl Address {
    pub const ZERO: Address = Address(Unsigned14Bit::ZERO);
    pub const MAX: Address = Address(Unsigned14Bit::MAX);

    pub const fn new(a: Unsigned14Bit) -> Address {
        Address(a)
    }

    /// Form an address from the low 14 bits of a word (discarding
    /// the indirect, opcode and flag bits).
    pub const fn from_word(w: Unsigned24Bit) -> Address {
        Address(Unsigned14Bit::from_low_bits(w.bits() as u64))
    }

    /// Virtual page number (bits 13-11).
    pub fn page(&self) -> Unsigned3Bit {
        Unsigned3Bit::from_low_bits(u64::from(self.0.bits() >> 11))
    }

    /// Offset within the 2K page.
    pub fn page_offset(&self) -> u32 {
        u32::from(self.0) & PAGE_OFFSET_MASK
    }

    /// Computes the address following the current address.  Used,
    /// among other things, to increment the program counter; the
    /// calculation wraps from 0o37777 to 0.
    pub fn successor(&self) -> Address {
        Address(self.0.wrapping_increment())
    }

    /// Computes the address preceding the current address (wrapping
    /// from 0 to 0o37777).
    pub fn predecessor(&self) -> Address {
        Address(self.0.wrapping_decrement())
    }

    pub const fn bits(&self) -> u16 {
        self.0.bits()
    }
}

impl IndexBy<Unsigned24Bit> for Address {
    fn index_by(&self, delta: Unsigned24Bit) -> Address {
        Address(Unsigned14Bit::from_low_bits(
            u64::from(self.0.bits()) + u64::from(delta.bits()),
        ))
    }
}

impl IndexBy<u8> for Address {
    fn index_by(&self, delta: u8) -> Address {
        Address(self.0.wrapping_add(Unsigned14Bit::from(delta)))
    }
}

impl From<Unsigned14Bit> for Address {
    fn from(a: Unsigned14Bit) -> Address {
        Address(a)
    }
}

impl From<Address> for Unsigned14Bit {
    fn from(a: Address) -> Unsigned14Bit {
        a.0
    }
}

impl From<Address> for Unsigned24Bit {
    fn from(a: Address) -> Unsigned24Bit {
        Unsigned24Bit::from(a.0)
    }
}

impl From<Address> for u32 {
    fn from(a: Address) -> u32 {
        u32::from(a.0)
    }
}

impl From<&Address> for u32 {
    fn from(a: &Address) -> u32 {
        u32::from(a.0)
    }
}

impl TryFrom<u32> for Address {
    type Error = ConversionFailed;
    fn try_from(n: u32) -> Result<Address, ConversionFailed> {
        Unsigned14Bit::try_from(n).map(Address)
    }
}

impl Octal for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        Octal::fmt(&self.0, f)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{:05o}", self.0)
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "Address({:05o})", self.0)
    }
}

/// An address in physical memory.  Physical memory is at most 32
/// frames of 2048 words, so a physical address has at most 16 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PhysicalAddress(u32);

impl PhysicalAddress {
    pub const ZERO: PhysicalAddress = PhysicalAddress(0);
    pub const MAX: PhysicalAddress = PhysicalAddress(0o177777);

    /// Form a physical address from a page frame number and an
    /// offset within that frame.
    pub fn from_frame(frame: Unsigned5Bit, offset: u32) -> PhysicalAddress {
        PhysicalAddress((u32::from(frame) << 11) | (offset & PAGE_OFFSET_MASK))
    }

    /// Form a physical address from the low 16 bits of `n`.
    pub const fn from_low_bits(n: u32) -> PhysicalAddress {
        PhysicalAddress(n & 0o177777)
    }

    pub fn frame(&self) -> Unsigned5Bit {
        Unsigned5Bit::from_low_bits(u64::from(self.0 >> 11))
    }

    pub fn page_offset(&self) -> u32 {
        self.0 & PAGE_OFFSET_MASK
    }

    /// The next physical address, wrapping at 64K words.
    pub fn successor(&self) -> PhysicalAddress {
        PhysicalAddress::from_low_bits(self.0 + 1)
    }

    pub fn index(&self) -> usize {
        // A 16-bit value always fits in usize.
        self.0 as usize
    }
}

impl From<PhysicalAddress> for u32 {
    fn from(a: PhysicalAddress) -> u32 {
        a.0
    }
}

impl TryFrom<u32> for PhysicalAddress {
    type Error = ConversionFailed;
    fn try_from(n: u32) -> Result<PhysicalAddress, ConversionFailed> {
        if n > PhysicalAddress::MAX.0 {
            Err(ConversionFailed::TooLarge)
        } else {
            Ok(PhysicalAddress(n))
        }
    }
}

impl Octal for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        Octal::fmt(&self.0, f)
    }
}

impl Display for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{:06o}", self.0)
    }
}

impl Debug for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "PhysicalAddress({:06o})", self.0)
    }
}

#[test]
fn test_address_successor_wraps() {
    assert_eq!(Address::MAX.successor(), Address::ZERO);
    assert_eq!(Address::ZERO.predecessor(), Address::MAX);
}

#[test]
fn test_address_page() {
    let a = Address::try_from(0o14005_u32).expect("test data should be in range");
    assert_eq!(a.page(), Unsigned3Bit::try_from(3_u8).unwrap());
    assert_eq!(a.page_offset(), 0o4005 & PAGE_OFFSET_MASK);
}

#[test]
fn test_address_index_by_wraps() {
    let a = Address::try_from(0o37776_u32).unwrap();
    assert_eq!(
        a.index_by(Unsigned24Bit::from(3_u8)),
        Address::try_from(1_u32).unwrap()
    );
    // Only the low 14 bits of the index participate.
    assert_eq!(
        Address::ZERO.index_by(Unsigned24Bit::MAX),
        Address::MAX
    );
}

#[test]
fn test_physical_address_from_frame() {
    let frame = Unsigned5Bit::try_from(0o21_u8).unwrap();
    let pa = PhysicalAddress::from_frame(frame, 0o17);
    assert_eq!(u32::from(pa), 0o104017);
    assert_eq!(pa.frame(), frame);
    assert_eq!(pa.page_offset(), 0o17);
}

#[test]
fn test_address_display() {
    assert_eq!(Address::try_from(0o100_u32).unwrap().to_string(), "00100");
    assert_eq!(PhysicalAddress::from_low_bits(0o100).to_string(), "000100");
}
