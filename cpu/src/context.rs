//! The context in which the simulator performs a single operation.
//!
//! Each call into the simulator is an opportunity to execute an
//! instruction, to move a character through an I/O channel or to let
//! a peripheral change state.  The simulator is mostly concerned with
//! how much time would have elapsed on the SDS 940 it simulates:
//! this tells us, for example, when the next real-time clock pulse
//! is due or when a teletype will have finished printing.  The
//! caller also keeps track of actual elapsed time.
//!
//! These two quantities have the same type, so we keep them together
//! in a struct in order to give them clear names.
use core::time::Duration;

#[derive(Debug, Clone)]
pub struct Context {
    pub simulated_time: Duration,
    pub real_elapsed_time: Duration,
}

impl Context {
    #[must_use]
    pub fn new(simulated_time: Duration, real_elapsed_time: Duration) -> Context {
        Context {
            simulated_time,
            real_elapsed_time,
        }
    }
}
