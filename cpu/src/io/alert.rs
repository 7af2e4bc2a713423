//! Alerts.
//!
//! An internal-control EOM places a nine-bit alert code in the alert
//! register.  The next PIN or POT consumes it and transfers a word to
//! or from whatever the code selects: a channel register, one of the
//! relocation registers, or a device.
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

/// What an alert code selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTarget {
    /// 0o10 + c: the channel's interlace (word count and memory
    /// address).
    Interlace(Unsigned3Bit),
    /// 0o20 + c: the channel's data-chain register.
    DataChain(Unsigned3Bit),
    /// 0o30 + c: extended control of the channel (EOD mode 1).
    BufferControl(Unsigned3Bit),
    /// 0o40: relocation register 1.
    Relabel1,
    /// 0o41: relocation register 2.
    Relabel2,
    /// 0o42: the monitor relocation register.
    Relabel4,
    /// 0o100 and above: a device alert.
    Device(Unsigned9Bit),
    Unassigned(Unsigned9Bit),
}

impl From<Unsigned9Bit> for AlertTarget {
    fn from(code: Unsigned9Bit) -> AlertTarget {
        let n = u16::from(code);
        let channel = Unsigned3Bit::from_low_bits(u64::from(n & 0o7));
        match n {
            0o10..=0o17 => AlertTarget::Interlace(channel),
            0o20..=0o27 => AlertTarget::DataChain(channel),
            0o30..=0o37 => AlertTarget::BufferControl(channel),
            0o40 => AlertTarget::Relabel1,
            0o41 => AlertTarget::Relabel2,
            0o42 => AlertTarget::Relabel4,
            0o100.. => AlertTarget::Device(code),
            _ => AlertTarget::Unassigned(code),
        }
    }
}

impl Display for AlertTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            AlertTarget::Interlace(ch) => write!(f, "interlace of channel {ch}"),
            AlertTarget::DataChain(ch) => write!(f, "data chain of channel {ch}"),
            AlertTarget::BufferControl(ch) => write!(f, "buffer control of channel {ch}"),
            AlertTarget::Relabel1 => f.write_str("relabeling register 1"),
            AlertTarget::Relabel2 => f.write_str("relabeling register 2"),
            AlertTarget::Relabel4 => f.write_str("monitor relabeling register"),
            AlertTarget::Device(code) => write!(f, "device alert {code:03o}"),
            AlertTarget::Unassigned(code) => write!(f, "unassigned alert {code:03o}"),
        }
    }
}

/// Holds the alert code set by the most recent EOM mode 3 until an
/// instruction consumes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlertRegister {
    pending: Option<Unsigned9Bit>,
}

impl AlertRegister {
    pub fn set(&mut self, code: Unsigned9Bit) {
        if let Some(prev) = self.pending {
            event!(
                Level::DEBUG,
                "alert {prev:03o} replaced by {code:03o} before being used"
            );
        }
        self.pending = Some(code);
    }

    pub fn take(&mut self) -> Option<Unsigned9Bit> {
        self.pending.take()
    }

    #[must_use]
    pub fn peek(&self) -> Option<Unsigned9Bit> {
        self.pending
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[test]
fn test_alert_decoding() {
    assert_eq!(AlertTarget::from(u9!(0o13)), AlertTarget::Interlace(u3!(3)));
    assert_eq!(AlertTarget::from(u9!(0o20)), AlertTarget::DataChain(u3!(0)));
    assert_eq!(
        AlertTarget::from(u9!(0o37)),
        AlertTarget::BufferControl(u3!(7))
    );
    assert_eq!(AlertTarget::from(u9!(0o40)), AlertTarget::Relabel1);
    assert_eq!(AlertTarget::from(u9!(0o41)), AlertTarget::Relabel2);
    assert_eq!(AlertTarget::from(u9!(0o42)), AlertTarget::Relabel4);
    assert_eq!(AlertTarget::from(u9!(0o43)), AlertTarget::Unassigned(u9!(0o43)));
    assert_eq!(AlertTarget::from(u9!(0o7)), AlertTarget::Unassigned(u9!(0o7)));
    assert_eq!(AlertTarget::from(u9!(0o100)), AlertTarget::Device(u9!(0o100)));
    assert_eq!(AlertTarget::from(u9!(0o777)), AlertTarget::Device(u9!(0o777)));
}

#[test]
fn test_alert_is_consumed_once() {
    let mut reg = AlertRegister::default();
    assert_eq!(reg.take(), None);
    reg.set(u9!(0o12));
    reg.set(u9!(0o41));
    assert_eq!(reg.peek(), Some(u9!(0o41)));
    assert_eq!(reg.take(), Some(u9!(0o41)));
    assert_eq!(reg.take(), None);
}
