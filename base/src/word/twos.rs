//! Two's-complement interpretation of the 24-bit machine word.
//!
//! The SDS 940 registers hold plain bit patterns; it is the
//! instructions which decide whether bit 23 is a sign.  So rather
//! than having a separate signed type, these operations interpret an
//! [`Unsigned24Bit`] as a two's-complement value when asked to.

use super::unsigned::Unsigned24Bit;

/// The sign bit of a machine word (bit 0 in SDS documentation).
pub const SIGN_BIT: u32 = 0o40000000;

/// All 24 bits of a machine word.
pub const WORD_MASK: u32 = 0o77777777;

impl Unsigned24Bit {
    pub const SIGN: Unsigned24Bit = Unsigned24Bit { bits: SIGN_BIT };

    /// Returns true if the sign bit (bit 23) is set.
    pub const fn is_negative(&self) -> bool {
        self.bits & SIGN_BIT != 0
    }

    /// Two's-complement negation.  The most negative value is its
    /// own negation.
    #[must_use]
    pub const fn negate(self) -> Unsigned24Bit {
        Unsigned24Bit {
            bits: ((self.bits ^ WORD_MASK) + 1) & WORD_MASK,
        }
    }

    /// The absolute value, as a native integer.  Since the most
    /// negative value (0o40000000) has no positive counterpart in
    /// 24 bits, the result can be 2^23.
    pub const fn magnitude(&self) -> u32 {
        if self.is_negative() {
            self.negate().bits
        } else {
            self.bits
        }
    }

    /// Sign-extend into a native signed integer.
    pub const fn as_signed(&self) -> i32 {
        if self.is_negative() {
            (self.bits | !WORD_MASK) as i32
        } else {
            self.bits as i32
        }
    }

    /// Convert a native signed integer, keeping only the low 24
    /// bits of its two's-complement representation.
    pub const fn from_signed_wrapping(n: i32) -> Unsigned24Bit {
        Unsigned24Bit {
            bits: (n as u32) & WORD_MASK,
        }
    }
}

#[test]
fn test_negate() {
    assert_eq!(Unsigned24Bit::ONE.negate(), Unsigned24Bit::MAX);
    assert_eq!(Unsigned24Bit::ZERO.negate(), Unsigned24Bit::ZERO);
    assert_eq!(Unsigned24Bit::SIGN.negate(), Unsigned24Bit::SIGN);
    assert_eq!(
        Unsigned24Bit::from(0o1234_u16).negate().negate(),
        Unsigned24Bit::from(0o1234_u16)
    );
}

#[test]
fn test_magnitude() {
    assert_eq!(Unsigned24Bit::MAX.magnitude(), 1);
    assert_eq!(Unsigned24Bit::SIGN.magnitude(), 0o40000000);
    assert_eq!(Unsigned24Bit::from(7_u8).magnitude(), 7);
}

#[test]
fn test_as_signed() {
    assert_eq!(Unsigned24Bit::MAX.as_signed(), -1);
    assert_eq!(Unsigned24Bit::SIGN.as_signed(), -(1 << 23));
    assert_eq!(Unsigned24Bit::from_signed_wrapping(-2).bits(), 0o77777776);
    assert_eq!(Unsigned24Bit::from_signed_wrapping(-2).as_signed(), -2);
}
