//! The prelude exports the structs which are useful in representing
//! things to do with the SDS 940.  Providing this prelude is the main
//! purpose of the base crate.
pub use super::instruction::*;
pub use super::subword::{join_halves, join_sixes, split_halves, split_sixes};
pub use super::types::*;
pub use super::word::error::*;
pub use super::word::twos::{SIGN_BIT, WORD_MASK};
pub use super::word::unsigned::*;
pub use super::{u12, u14, u15, u24, u3, u5, u6, u9};
