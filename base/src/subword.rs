//! Convenience utilities for splitting 24-bit SDS words into the
//! characters a channel transfers (four 6-bit characters or two
//! 12-bit characters) and for joining them together again.
use std::ops::Shl;

use crate::word::unsigned::{Unsigned12Bit, Unsigned24Bit, Unsigned6Bit};

/// Split a word into four 6-bit characters, ordered from most
/// significant (the first character transmitted) to least
/// significant.
pub fn split_sixes(w: Unsigned24Bit) -> [Unsigned6Bit; 4] {
    let bits = u64::from(w);
    [
        Unsigned6Bit::from_low_bits(bits >> 18),
        Unsigned6Bit::from_low_bits(bits >> 12),
        Unsigned6Bit::from_low_bits(bits >> 6),
        Unsigned6Bit::from_low_bits(bits),
    ]
}

/// Join four 6-bit characters (most significant first) into a word.
pub fn join_sixes(chars: [Unsigned6Bit; 4]) -> Unsigned24Bit {
    chars
        .iter()
        .fold(Unsigned24Bit::ZERO, |acc, ch| {
            acc.shl(6) | Unsigned24Bit::from(*ch)
        })
}

/// Split a word into its left (more significant) and right 12-bit
/// halves.
pub fn split_halves(w: Unsigned24Bit) -> (Unsigned12Bit, Unsigned12Bit) {
    let bits = u64::from(w);
    (
        Unsigned12Bit::from_low_bits(bits >> 12),
        Unsigned12Bit::from_low_bits(bits),
    )
}

/// Join two 12-bit values into a 24-bit word.
pub fn join_halves(left: Unsigned12Bit, right: Unsigned12Bit) -> Unsigned24Bit {
    Unsigned24Bit::from(left).shl(12) | Unsigned24Bit::from(right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn six(n: u8) -> Unsigned6Bit {
        Unsigned6Bit::try_from(n).expect("valid test data")
    }

    #[test]
    fn test_split_sixes() {
        assert_eq!(
            split_sixes(Unsigned24Bit::try_from(0o12345670_u32).unwrap()),
            [six(0o12), six(0o34), six(0o56), six(0o70)]
        );
    }

    #[test]
    fn test_join_sixes() {
        assert_eq!(
            join_sixes([six(0o77), six(0), six(0o01), six(0o40)]),
            Unsigned24Bit::try_from(0o77000140_u32).unwrap()
        );
    }

    #[test]
    fn test_halves() {
        let w = Unsigned24Bit::try_from(0o12345670_u32).unwrap();
        let (left, right) = split_halves(w);
        assert_eq!(left, Unsigned12Bit::try_from(0o1234_u16).unwrap());
        assert_eq!(right, Unsigned12Bit::try_from(0o5670_u16).unwrap());
        assert_eq!(join_halves(left, right), w);
    }
}
