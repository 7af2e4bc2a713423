//! The `base` crate defines the SDS 940 related things which don't
//! depend on the state of a simulated machine: machine words and the
//! narrower fields within them, instruction words, virtual and
//! physical addresses, and a small number of collections.  The
//! simulator itself lives in the `cpu` crate.

mod types;
mod word;

pub mod collections {
    pub mod pq;
}
pub mod instruction;
pub mod prelude;
pub mod subword;
pub use crate::word::unsigned::*;

#[macro_export]
macro_rules! u24 {
    ($n:expr) => {
        $crate::prelude::Unsigned24Bit::new::<{ $n }>()
    };
}

#[macro_export]
macro_rules! u15 {
    ($n:expr) => {
        $crate::prelude::Unsigned15Bit::new::<{ $n }>()
    };
}

#[macro_export]
macro_rules! u14 {
    ($n:expr) => {
        $crate::prelude::Unsigned14Bit::new::<{ $n }>()
    };
}

#[macro_export]
macro_rules! u12 {
    ($n:expr) => {
        $crate::prelude::Unsigned12Bit::new::<{ $n }>()
    };
}

#[macro_export]
macro_rules! u9 {
    ($n:expr) => {
        $crate::prelude::Unsigned9Bit::new::<{ $n }>()
    };
}

#[macro_export]
macro_rules! u6 {
    ($n:expr) => {
        $crate::prelude::Unsigned6Bit::new::<{ $n }>()
    };
}

#[macro_export]
macro_rules! u5 {
    ($n:expr) => {
        $crate::prelude::Unsigned5Bit::new::<{ $n }>()
    };
}

#[macro_export]
macro_rules! u3 {
    ($n:expr) => {
        $crate::prelude::Unsigned3Bit::new::<{ $n }>()
    };
}

#[test]
fn test_u24() {
    use prelude::Unsigned24Bit;
    let m: Unsigned24Bit = u24!(0o40000000);
    let n: Unsigned24Bit =
        Unsigned24Bit::try_from(1_u32 << 23).expect("test data should be in range");
    assert_eq!(m, n);
    assert_eq!(u24!(40), Unsigned24Bit::from(40_u8));
}

#[test]
fn test_narrow_macros() {
    use prelude::*;
    assert_eq!(u3!(7), Unsigned3Bit::MAX);
    assert_eq!(u5!(0o21), Unsigned5Bit::try_from(17_u8).unwrap());
    assert_eq!(u6!(0o77), Unsigned6Bit::MAX);
    assert_eq!(u9!(0o777), Unsigned9Bit::MAX);
    assert_eq!(u12!(0o4000), Unsigned12Bit::try_from(2048_u16).unwrap());
    assert_eq!(u14!(0o37777), Unsigned14Bit::MAX);
    assert_eq!(u15!(0o40000), Unsigned15Bit::try_from(1_u16 << 14).unwrap());
}
