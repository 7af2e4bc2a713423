//! Machine words and the narrower fields found within them.
pub mod error;
pub mod twos;
pub mod unsigned;
