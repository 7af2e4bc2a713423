//! The arithmetic core: 24-bit addition, 48-bit multiplication and
//! division, and the shifts of the A-B register pair.
//!
//! These are pure functions; the instruction implementations in
//! `control` decide which registers and flags the results go to.
use base::prelude::*;

const MASK: u32 = WORD_MASK;
const SIGN: u32 = SIGN_BIT;
const MASK48: u64 = (1 << 48) - 1;
const SIGN48: u64 = 1 << 47;

fn neg(x: u32) -> u32 {
    ((x ^ MASK).wrapping_add(1)) & MASK
}

fn word(bits: u32) -> Unsigned24Bit {
    Unsigned24Bit::from_low_bits(u64::from(bits))
}

/// The result of a 24-bit addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sum {
    pub(crate) value: Unsigned24Bit,
    /// Carry out of bit 23.  The add and subtract instructions
    /// record this in the sign bit of X.
    pub(crate) carry: bool,
    pub(crate) overflow: bool,
}

/// Add two words and a carry.
pub(crate) fn add24(a: Unsigned24Bit, b: Unsigned24Bit, carry_in: bool) -> Sum {
    let (a, b) = (a.bits(), b.bits());
    let t = a + b + u32::from(carry_in);
    Sum {
        value: word(t & MASK),
        carry: t > MASK,
        overflow: ((a ^ !b) & (a ^ t)) & SIGN != 0,
    }
}

/// Addition for the memory-modifying instructions (ADM, MIN, SKR);
/// these detect overflow but do not record a carry.
pub(crate) fn add_m24(a: Unsigned24Bit, b: Unsigned24Bit) -> (Unsigned24Bit, bool) {
    let sum = add24(a, b, false);
    (sum.value, sum.overflow)
}

/// A 48-bit result held in the A (most significant) and B registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Product {
    pub(crate) a: Unsigned24Bit,
    pub(crate) b: Unsigned24Bit,
    pub(crate) overflow: bool,
}

/// Multiply two words giving a 48-bit product in A and B.  The
/// product is aligned so that its binary point follows the sign of
/// A (that is, it is shifted left one place).  Overflow happens only
/// when both operands are the most negative value.
pub(crate) fn mul48(m1: Unsigned24Bit, m2: Unsigned24Bit) -> Product {
    let s1 = m1.magnitude();
    let s2 = m2.magnitude();
    if s1 == 0 || s2 == 0 {
        return Product {
            a: Unsigned24Bit::ZERO,
            b: Unsigned24Bit::ZERO,
            overflow: false,
        };
    }
    let (t, a) = (u64::from(s1 >> 12), u64::from(s1 & 0o7777));
    let (u, b) = (u64::from(s2 >> 12), u64::from(s2 & 0o7777));
    let middle = a * u + b * t;
    let lo = a * b + ((middle & 0o7777) << 12);
    let hi = t * u + (middle >> 12) + (lo >> 24);
    let mask = u64::from(MASK);
    let mut ra = ((hi << 1) & mask) | ((lo & mask) >> 23);
    let mut rb = (lo << 1) & mask;
    let overflow = ra & u64::from(SIGN) != 0;
    if m1.is_negative() != m2.is_negative() {
        rb = u64::from(neg(rb as u32));
        ra = ((ra ^ mask) + u64::from(rb == 0)) & mask;
    }
    Product {
        a: word(ra as u32),
        b: word(rb as u32),
        overflow,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Quotient {
    pub(crate) quotient: Unsigned24Bit,
    pub(crate) remainder: Unsigned24Bit,
    pub(crate) overflow: bool,
}

/// Divide the 48-bit value in A and B by `m`.
///
/// This follows the hardware's non-restoring algorithm bit for bit,
/// including when the quotient overflows: overflow is flagged but the
/// division still runs and leaves its (meaningless) results in A and
/// B.  The quotient takes the sign of A⊕M and the remainder the sign
/// of A.
pub(crate) fn div48(ar: Unsigned24Bit, br: Unsigned24Bit, m: Unsigned24Bit) -> Quotient {
    let (ar, br, m) = (ar.bits(), br.bits(), m.bits());
    let dvr = if m & SIGN != 0 { neg(m) } else { m };
    let (mut hi, mut lo) = (ar, br);
    if ar & SIGN != 0 {
        lo = neg(lo);
        hi = ((hi ^ MASK) + u32::from(lo == 0)) & MASK;
    }
    let quotient_negative = (ar ^ m) & SIGN != 0;
    let overflow = hi > dvr || (hi == dvr && (lo != 0 || !quotient_negative));
    hi = hi.wrapping_sub(dvr) & MASK;
    let mut quo: u32 = 0;
    for _ in 0..23 {
        quo = ((quo << 1) | ((hi >> 23) ^ 1)) & MASK;
        hi = ((hi << 1) | (lo >> 23)) & MASK;
        lo = (lo << 1) & MASK;
        hi = if quo & 1 != 0 {
            hi.wrapping_sub(dvr) & MASK
        } else {
            hi.wrapping_add(dvr) & MASK
        };
    }
    quo = (quo << 1) & MASK;
    if hi & SIGN != 0 {
        hi = hi.wrapping_add(dvr) & MASK;
    } else {
        quo |= 1;
    }
    Quotient {
        quotient: word(if quotient_negative { neg(quo) } else { quo }),
        remainder: word(if ar & SIGN != 0 { neg(hi) } else { hi }),
        overflow,
    }
}

/// The instructions sharing opcode 66.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RightShift {
    /// RSH: the sign of A is copied into vacated positions.
    Arithmetic,
    /// RCY
    Cycle,
    /// LRSH: vacated positions are cleared.
    Logical,
}

/// The instructions sharing opcode 67.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LeftShift {
    /// LSH
    Arithmetic,
    /// LCY
    Cycle,
    /// NOD: shift until A is normalized.
    Normalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shifted {
    pub(crate) a: Unsigned24Bit,
    pub(crate) b: Unsigned24Bit,
    /// Set by LSH when the sign of A changed during the shift.
    pub(crate) overflow: bool,
    /// The number of places actually shifted.
    pub(crate) shifts: u32,
}

fn join48(a: Unsigned24Bit, b: Unsigned24Bit) -> u64 {
    (u64::from(a.bits()) << 24) | u64::from(b.bits())
}

fn split48(ab: u64, overflow: bool, shifts: u32) -> Shifted {
    Shifted {
        a: Unsigned24Bit::from_low_bits(ab >> 24),
        b: Unsigned24Bit::from_low_bits(ab),
        overflow,
        shifts,
    }
}

fn rotate48_left(ab: u64, n: u32) -> u64 {
    let n = n % 48;
    if n == 0 {
        ab
    } else {
        ((ab << n) | (ab >> (48 - n))) & MASK48
    }
}

/// The shift count is the low nine bits of the shift address.
/// Shifts treat counts above 48 as 48; cycles use the count modulo 48.
pub(crate) fn shift_count(address: Unsigned24Bit) -> u32 {
    address.bits() & 0o777
}

pub(crate) fn shift_right(
    kind: RightShift,
    a: Unsigned24Bit,
    b: Unsigned24Bit,
    count: u32,
) -> Shifted {
    let ab = join48(a, b);
    let n = count.min(48);
    let result = match kind {
        RightShift::Cycle => rotate48_left(ab, 48 - (count % 48)),
        RightShift::Logical => {
            if n >= 48 {
                0
            } else {
                ab >> n
            }
        }
        RightShift::Arithmetic => {
            let fill = if ab & SIGN48 != 0 { MASK48 } else { 0 };
            if n >= 48 {
                fill
            } else {
                ((ab >> n) | (fill << (48 - n))) & MASK48
            }
        }
    };
    let shifts = if kind == RightShift::Cycle { count % 48 } else { n };
    split48(result, false, shifts)
}

pub(crate) fn shift_left(
    kind: LeftShift,
    a: Unsigned24Bit,
    b: Unsigned24Bit,
    count: u32,
) -> Shifted {
    let ab = join48(a, b);
    let n = count.min(48);
    match kind {
        LeftShift::Cycle => split48(rotate48_left(ab, count), false, count % 48),
        LeftShift::Arithmetic => {
            let sign = ab & SIGN48;
            let mut v = ab;
            let mut overflow = false;
            for _ in 0..n {
                v = (v << 1) & MASK48;
                if v & SIGN48 != sign {
                    overflow = true;
                }
            }
            split48(v, overflow, n)
        }
        LeftShift::Normalize => {
            let mut v = ab;
            let mut shifts = 0;
            while shifts < n && ((v >> 47) & 1) == ((v >> 46) & 1) {
                v = (v << 1) & MASK48;
                shifts += 1;
            }
            split48(v, false, shifts)
        }
    }
}
