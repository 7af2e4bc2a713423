//! Unsigned fixed-width types.
//!
//! The SDS 940 works on 24-bit words, but many fields within a word
//! (opcodes, page numbers, device numbers, relocation register
//! entries and so on) are narrower.  Each of these is represented by
//! a type which guarantees that its value fits in the appropriate
//! number of bits.  Two's-complement interpretation of 24-bit words
//! lives in the sibling `twos` module.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter, Octal};
use std::hash::{Hash, Hasher};

use serde::Serialize;

use super::error::ConversionFailed;


/// This macro implements conversions from native types to Unsigned*Bit
/// which are always possible (e.g. From<u8> for Unsigned9Bit).
macro_rules! from_native_type_to_self {
    ($SelfT:ty, $($from:ty)*) => {
        $(
            impl From<$from> for $SelfT {
                fn from(n: $from) -> Self {
                    Self {
                        bits: n.into(),
                    }
                }
            }
        )*
    }
}

/// This macro implements conversions from Unsigned*Bit to native
/// types which are always possible (e.g. From<Unsigned9Bit> for i16).
macro_rules! from_self_to_native_type {
    ($SelfT:ty, $($to:ty)*) => {
        $(
            impl From<$SelfT> for $to {
                fn from(n: $SelfT) -> $to {
                    // The range of n.bits is narrower than the range
                    // of its storage type, so this cast cannot lose
                    // information even where `into()` would not
                    // compile (for example u16 into i16).
                    n.bits as $to
                }
            }
        )*
    }
}

/// This macro implements conversions from Unsigned*Bit to native
/// types where the conversion may not always fit.  For example
/// TryFrom<Unsigned24Bit> for u8.
macro_rules! try_from_self_to_native_type {
    ($SelfT:ty, $($to:ty)*) => {
        $(
            impl TryFrom<$SelfT> for $to {
                type Error = ConversionFailed;
                fn try_from(n: $SelfT) -> Result<$to, ConversionFailed> {
                    <$to>::try_from(n.bits).map_err(|_| ConversionFailed::TooLarge)
                }
            }
        )*
    }
}

/// This macro implements a conversions from native types to
/// Unsigned*Bit where the conversion may not always fit.  For example
/// TryFrom<u32> for Unsigned24Bit.
macro_rules! try_from_native_type_to_self {
    ($SelfT:ty, $InnerT:ty, $($from:ty)*) => {
        $(
            impl TryFrom<$from> for $SelfT {
                type Error = ConversionFailed;
                fn try_from(n: $from) -> Result<Self, ConversionFailed> {
                    let bits: $InnerT = match n.try_into() {
                        Err(_) => {
                            // $InnerT is unsigned, so a failed
                            // conversion of a negative value is
                            // always "too small".  For unsigned
                            // sources this comparison is useless and
                            // is optimized away.
                            #[allow(unused_comparisons)]
                            if n < 0 {
                                return Err(ConversionFailed::TooSmall);
                            } else {
                                return Err(ConversionFailed::TooLarge);
                            }
                        }
                        Ok(value) if value > Self::VALUE_BITS => {
                            return Err(ConversionFailed::TooLarge);
                        }
                        Ok(value) => value,
                    };
                    Ok(Self { bits })
                }
            }
        )*
    }
}

/// Widening conversion between two of our own types.
macro_rules! widen {
    ($FromT:ty => $($ToT:ty)*) => {
        $(
            impl From<$FromT> for $ToT {
                fn from(n: $FromT) -> $ToT {
                    Self {
                        bits: n.bits.into(),
                    }
                }
            }
        )*
    }
}

/// Narrowing conversion between two of our own types; fails when
/// the value has bits set which the narrower type cannot hold.
macro_rules! narrow {
    ($FromT:ty => $($ToT:ty)*) => {
        $(
            impl TryFrom<$FromT> for $ToT {
                type Error = ConversionFailed;
                fn try_from(n: $FromT) -> Result<$ToT, ConversionFailed> {
                    <$ToT>::try_from(n.bits)
                }
            }
        )*
    }
}

/// This macro implements the base functionality of the unsigned
/// types.  The `SelfT` argument is the name of the type we are
/// defining.  `BITS` is the bit width of the type we are defining.
/// `InnerT` is the name of the native type which will store those
/// bits.
macro_rules! unsigned_word_impl {
    ($SelfT:ty, $BITS:expr, $InnerT:ty) => {
        impl $SelfT {
            const MODULUS: u64 = (1 << $BITS);
            const VALUE_BITS: $InnerT = (Self::MODULUS - 1) as $InnerT;

            pub const BITS: u32 = $BITS;

            pub const MAX: Self = Self {
                bits: Self::VALUE_BITS,
            };

            pub const ZERO: Self = Self { bits: 0 };
            pub const ONE: Self = Self { bits: 1 };
            pub const MIN: Self = Self::ZERO;

            // An out-of-range argument fails at compile time.  It's
            // pub so that it can be used in u24!() and similar.
            pub const fn new<const N: $InnerT>() -> $SelfT {
                type Word = $SelfT;
                struct Helper<const M: $InnerT>;
                impl<const M: $InnerT> Helper<M> {
                    const U: Word = {
                        if M > Word::MAX.bits {
                            panic!("input value is out of range")
                        } else {
                            Word {
                                bits: Word::MAX.bits & M,
                            }
                        }
                    };
                }
                Helper::<N>::U
            }

            /// Keep only the low-order `BITS` bits of `n`.
            pub const fn from_low_bits(n: u64) -> Self {
                Self {
                    bits: (n & (Self::MODULUS - 1)) as $InnerT,
                }
            }

            pub const fn bits(&self) -> $InnerT {
                self.bits
            }

            pub const fn is_zero(&self) -> bool {
                self.bits == 0
            }

            pub const fn wrapping_add(self, rhs: $SelfT) -> $SelfT {
                Self::from_low_bits(self.bits as u64 + rhs.bits as u64)
            }

            pub const fn wrapping_sub(self, rhs: $SelfT) -> $SelfT {
                Self::from_low_bits(self.bits as u64 + Self::MODULUS - rhs.bits as u64)
            }

            pub const fn wrapping_increment(self) -> $SelfT {
                self.wrapping_add(Self::ONE)
            }

            pub const fn wrapping_decrement(self) -> $SelfT {
                self.wrapping_sub(Self::ONE)
            }

            pub fn checked_add(self, rhs: $SelfT) -> Option<$SelfT> {
                let total = u64::from(self.bits) + u64::from(rhs.bits);
                if total < Self::MODULUS {
                    Some(Self::from_low_bits(total))
                } else {
                    None
                }
            }

            pub fn checked_sub(self, rhs: $SelfT) -> Option<$SelfT> {
                self.bits
                    .checked_sub(rhs.bits)
                    .map(|bits| Self { bits })
            }

            // We cannot call std::ops::BitAnd in a const because
            // trait methods cannot be const.  So we have this
            // work-alike in impl, since it can be called in a const
            // context.
            pub const fn and(self, mask: $InnerT) -> Self {
                Self {
                    bits: self.bits & mask,
                }
            }

            // Const work-alike for std::ops::BitOr.
            pub const fn bitor(self, mask: $InnerT) -> Self {
                Self {
                    bits: (self.bits | mask) & Self::VALUE_BITS,
                }
            }

            /// Returns true if bit `n` (counting from the least
            /// significant bit, which is bit 0) is set.
            pub const fn bit(&self, n: u32) -> bool {
                n < $BITS && (self.bits >> n) & 1 != 0
            }

            pub const fn rotate_left(self, n: u32) -> Self {
                let n = n % $BITS;
                if n == 0 {
                    self
                } else {
                    let wide = self.bits as u64;
                    Self::from_low_bits((wide << n) | (wide >> ($BITS - n)))
                }
            }

            pub const fn rotate_right(self, n: u32) -> Self {
                let n = n % $BITS;
                self.rotate_left(($BITS - n) % $BITS)
            }
        }

        impl Default for $SelfT {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl Display for $SelfT {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
                Octal::fmt(&self.bits, f)
            }
        }

        impl Octal for $SelfT {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
                Octal::fmt(&self.bits, f)
            }
        }

        impl Debug for $SelfT {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                write!(f, concat!(stringify!($SelfT), "{{bits: {:#o}}}"), self.bits)
            }
        }

        impl Hash for $SelfT {
            fn hash<H>(&self, state: &mut H)
            where
                H: Hasher,
            {
                self.bits.hash(state)
            }
        }

        impl<T> PartialEq<T> for $SelfT
        where
            T: TryInto<$SelfT> + Copy,
        {
            fn eq(&self, other: &T) -> bool {
                let converted: Result<$SelfT, _> = (*other).try_into();
                match converted {
                    Ok(rhs) => self.bits == rhs.bits,
                    Err(_) => false,
                }
            }
        }

        impl Eq for $SelfT {}

        impl PartialOrd<$SelfT> for $SelfT {
            fn partial_cmp(&self, other: &$SelfT) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl PartialOrd<u32> for $SelfT {
            fn partial_cmp(&self, other: &u32) -> Option<Ordering> {
                match <$SelfT>::try_from(*other) {
                    Ok(value) => Some(self.cmp(&value)),
                    // `other` doesn't fit into $SelfT, so `other`
                    // must be greater.
                    Err(_) => Some(Ordering::Less),
                }
            }
        }

        impl Ord for $SelfT {
            fn cmp(&self, other: &$SelfT) -> Ordering {
                self.bits.cmp(&other.bits)
            }
        }

        impl std::ops::Not for $SelfT {
            type Output = Self;
            fn not(self) -> Self {
                Self {
                    bits: (!self.bits) & Self::VALUE_BITS,
                }
            }
        }

        impl std::ops::BitAnd<$InnerT> for $SelfT {
            type Output = Self;
            fn bitand(self, mask: $InnerT) -> Self {
                Self {
                    bits: self.bits & mask,
                }
            }
        }

        impl std::ops::BitAnd<$SelfT> for $SelfT {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                self.bitand(rhs.bits)
            }
        }

        impl std::ops::BitOr<$InnerT> for $SelfT {
            type Output = Self;
            fn bitor(self, mask: $InnerT) -> Self {
                Self {
                    bits: (self.bits | mask) & Self::VALUE_BITS,
                }
            }
        }

        impl std::ops::BitOr for $SelfT {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                self.bitor(rhs.bits)
            }
        }

        impl std::ops::BitXor<$InnerT> for $SelfT {
            type Output = Self;
            fn bitxor(self, mask: $InnerT) -> Self {
                Self {
                    bits: (self.bits ^ mask) & Self::VALUE_BITS,
                }
            }
        }

        impl std::ops::BitXor for $SelfT {
            type Output = Self;
            fn bitxor(self, rhs: Self) -> Self {
                self.bitxor(rhs.bits)
            }
        }

        /// Logical shift; bits shifted off the right are lost.
        impl std::ops::Shr<u32> for $SelfT {
            type Output = $SelfT;
            fn shr(self, shift_by: u32) -> Self {
                if shift_by >= $BITS {
                    Self::ZERO
                } else {
                    Self {
                        bits: self.bits >> shift_by,
                    }
                }
            }
        }

        /// Logical shift; bits shifted off the left are lost.
        impl std::ops::Shl<u32> for $SelfT {
            type Output = $SelfT;
            fn shl(self, shift_by: u32) -> Self {
                if shift_by >= $BITS {
                    Self::ZERO
                } else {
                    Self::from_low_bits((self.bits as u64) << shift_by)
                }
            }
        }
    };
}

/// `Unsigned3Bit` holds an extension register, a page number or a
/// channel number.
#[derive(Clone, Copy, Serialize)]
pub struct Unsigned3Bit {
    pub(crate) bits: u8,
}

/// `Unsigned5Bit` is a physical page frame number (memory is at most
/// 32 frames of 2048 words) or an interrupt level.
#[derive(Clone, Copy, Serialize)]
pub struct Unsigned5Bit {
    pub(crate) bits: u8,
}

/// `Unsigned6Bit` is an opcode, a device number, a relocation
/// register page entry or a six-bit character.
#[derive(Clone, Copy, Serialize)]
pub struct Unsigned6Bit {
    pub(crate) bits: u8,
}

/// `Unsigned9Bit` is an alert code or a shift count field.
#[derive(Clone, Copy, Serialize)]
pub struct Unsigned9Bit {
    pub(crate) bits: u16,
}

/// `Unsigned12Bit` is the function field of an I/O instruction, or a
/// twelve-bit character.
#[derive(Clone, Copy, Serialize)]
pub struct Unsigned12Bit {
    pub(crate) bits: u16,
}

/// `Unsigned14Bit` is the width of a virtual address.
#[derive(Clone, Copy, Serialize)]
pub struct Unsigned14Bit {
    pub(crate) bits: u16,
}

/// `Unsigned15Bit` is the register-change microcode mask, and the
/// width of a channel's word count register.
#[derive(Clone, Copy, Serialize)]
pub struct Unsigned15Bit {
    pub(crate) bits: u16,
}

/// `Unsigned24Bit` is the basic machine word of the SDS 940.  This
/// is the width of the A, B and X registers, of every memory
/// location and of every instruction.
#[derive(Clone, Copy, Serialize)]
pub struct Unsigned24Bit {
    pub(crate) bits: u32,
}

unsigned_word_impl!(Unsigned3Bit, 3, u8);
unsigned_word_impl!(Unsigned5Bit, 5, u8);
unsigned_word_impl!(Unsigned6Bit, 6, u8);
unsigned_word_impl!(Unsigned9Bit, 9, u16);
unsigned_word_impl!(Unsigned12Bit, 12, u16);
unsigned_word_impl!(Unsigned14Bit, 14, u16);
unsigned_word_impl!(Unsigned15Bit, 15, u16);
unsigned_word_impl!(Unsigned24Bit, 24, u32);

////////////////////////////////////////////////////////////////////////
// Native conversions
////////////////////////////////////////////////////////////////////////

from_self_to_native_type!(Unsigned3Bit, u8 i8 u16 i16 u32 i32 u64 i64 usize isize);
try_from_native_type_to_self!(Unsigned3Bit, u8, i8 u8 u16 i16 u32 i32 u64 i64 usize isize);

from_self_to_native_type!(Unsigned5Bit, u8 i8 u16 i16 u32 i32 u64 i64 usize isize);
try_from_native_type_to_self!(Unsigned5Bit, u8, i8 u8 u16 i16 u32 i32 u64 i64 usize isize);

from_self_to_native_type!(Unsigned6Bit, u8 i8 u16 i16 u32 i32 u64 i64 usize isize);
try_from_native_type_to_self!(Unsigned6Bit, u8, i8 u8 u16 i16 u32 i32 u64 i64 usize isize);

from_native_type_to_self!(Unsigned9Bit, u8);
from_self_to_native_type!(Unsigned9Bit, u16 i16 u32 i32 u64 i64 usize isize);
try_from_self_to_native_type!(Unsigned9Bit, u8 i8);
try_from_native_type_to_self!(Unsigned9Bit, u16, i8 u16 i16 u32 i32 u64 i64 usize isize);

from_native_type_to_self!(Unsigned12Bit, u8);
from_self_to_native_type!(Unsigned12Bit, u16 i16 u32 i32 u64 i64 usize isize);
try_from_self_to_native_type!(Unsigned12Bit, u8 i8);
try_from_native_type_to_self!(Unsigned12Bit, u16, i8 u16 i16 u32 i32 u64 i64 usize isize);

from_native_type_to_self!(Unsigned14Bit, u8);
from_self_to_native_type!(Unsigned14Bit, u16 i16 u32 i32 u64 i64 usize isize);
try_from_self_to_native_type!(Unsigned14Bit, u8 i8);
try_from_native_type_to_self!(Unsigned14Bit, u16, i8 u16 i16 u32 i32 u64 i64 usize isize);

from_native_type_to_self!(Unsigned15Bit, u8);
from_self_to_native_type!(Unsigned15Bit, u16 i16 u32 i32 u64 i64 usize isize);
try_from_self_to_native_type!(Unsigned15Bit, u8 i8);
try_from_native_type_to_self!(Unsigned15Bit, u16, i8 u16 i16 u32 i32 u64 i64 usize isize);

from_native_type_to_self!(Unsigned24Bit, u8 u16);
from_self_to_native_type!(Unsigned24Bit, u32 i32 u64 i64 usize isize);
try_from_self_to_native_type!(Unsigned24Bit, u8 i8 u16 i16);
try_from_native_type_to_self!(Unsigned24Bit, u32, i8 i16 u32 i32 u64 i64 usize isize);

////////////////////////////////////////////////////////////////////////
// Conversions between our own types
////////////////////////////////////////////////////////////////////////

widen!(Unsigned3Bit => Unsigned5Bit Unsigned6Bit Unsigned9Bit Unsigned12Bit Unsigned14Bit Unsigned15Bit Unsigned24Bit);
widen!(Unsigned5Bit => Unsigned6Bit Unsigned9Bit Unsigned12Bit Unsigned14Bit Unsigned15Bit Unsigned24Bit);
widen!(Unsigned6Bit => Unsigned9Bit Unsigned12Bit Unsigned14Bit Unsigned15Bit Unsigned24Bit);
widen!(Unsigned9Bit => Unsigned12Bit Unsigned14Bit Unsigned15Bit Unsigned24Bit);
widen!(Unsigned12Bit => Unsigned14Bit Unsigned15Bit Unsigned24Bit);
widen!(Unsigned14Bit => Unsigned15Bit Unsigned24Bit);
widen!(Unsigned15Bit => Unsigned24Bit);

narrow!(Unsigned24Bit => Unsigned3Bit Unsigned5Bit Unsigned6Bit Unsigned9Bit Unsigned12Bit Unsigned14Bit Unsigned15Bit);
narrow!(Unsigned15Bit => Unsigned3Bit Unsigned5Bit Unsigned6Bit Unsigned9Bit Unsigned12Bit Unsigned14Bit);
narrow!(Unsigned14Bit => Unsigned3Bit Unsigned5Bit Unsigned6Bit Unsigned9Bit Unsigned12Bit);
narrow!(Unsigned12Bit => Unsigned3Bit Unsigned5Bit Unsigned6Bit Unsigned9Bit);
narrow!(Unsigned9Bit => Unsigned3Bit Unsigned5Bit Unsigned6Bit);
narrow!(Unsigned6Bit => Unsigned3Bit Unsigned5Bit);
narrow!(Unsigned5Bit => Unsigned3Bit);
