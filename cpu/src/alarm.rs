//! SDS 940 stop conditions.
//!
//! The real machine halted (or trapped) on various error conditions,
//! and the operator inspected the console.  The simulator represents
//! each stop condition as an [`Alarm`].  Some alarms can be masked,
//! meaning that the simulator carries on (as if the condition had
//! not happened) instead of stopping.
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde::Serialize;

use base::prelude::*;

use super::diagnostics::{CurrentInstructionDiagnostics, DiagnosticFetcher};

/// Describes whether a particular kind of alarm can be masked.
#[derive(Debug, PartialEq, Eq)]
pub enum AlarmMaskability {
    Maskable,
    Unmaskable,
}

/// Describes the kinds of alarm that exist in the simulator.  The
/// meanings of the values are described in [`AlarmDetails`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum AlarmKind {
    IllegalInstruction,
    IllegalIo,
    InvalidDevice,
    IndirectLimit,
    ExecuteLimit,
    IllegalVector,
    TrapNotBranch,
    InvalidRtcInstruction,
    Bug,
}

impl AlarmKind {
    fn name(&self) -> &'static str {
        match self {
            AlarmKind::IllegalInstruction => "IllegalInstruction",
            AlarmKind::IllegalIo => "IllegalIo",
            AlarmKind::InvalidDevice => "InvalidDevice",
            AlarmKind::IndirectLimit => "IndirectLimit",
            AlarmKind::ExecuteLimit => "ExecuteLimit",
            AlarmKind::IllegalVector => "IllegalVector",
            AlarmKind::TrapNotBranch => "TrapNotBranch",
            AlarmKind::InvalidRtcInstruction => "InvalidRtcInstruction",
            AlarmKind::Bug => "Bug",
        }
    }

    /// Indicates whether an alarm can be masked.  A masked illegal
    /// instruction executes as a no-op; masked I/O alarms cause the
    /// offending I/O instruction to be ignored.
    #[must_use]
    pub fn maskable(&self) -> AlarmMaskability {
        match self {
            AlarmKind::IllegalInstruction | AlarmKind::IllegalIo | AlarmKind::InvalidDevice => {
                AlarmMaskability::Maskable
            }
            _ => AlarmMaskability::Unmaskable,
        }
    }

    #[must_use]
    pub const fn all_alarm_kinds() -> [AlarmKind; 9] {
        [
            AlarmKind::IllegalInstruction,
            AlarmKind::IllegalIo,
            AlarmKind::InvalidDevice,
            AlarmKind::IndirectLimit,
            AlarmKind::ExecuteLimit,
            AlarmKind::IllegalVector,
            AlarmKind::TrapNotBranch,
            AlarmKind::InvalidRtcInstruction,
            AlarmKind::Bug,
        ]
    }
}

impl Display for AlarmKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct UnknownAlarmName(String);

impl Display for UnknownAlarmName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unknown alarm name '{}'", self.0)
    }
}

impl Error for UnknownAlarmName {}

impl TryFrom<&str> for AlarmKind {
    type Error = UnknownAlarmName;
    fn try_from(s: &str) -> Result<AlarmKind, UnknownAlarmName> {
        AlarmKind::all_alarm_kinds()
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAlarmName(s.to_owned()))
    }
}

#[test]
fn test_alarm_kind_round_trip() {
    for orig_kind in AlarmKind::all_alarm_kinds() {
        let name = orig_kind.to_string();
        match AlarmKind::try_from(name.as_str()) {
            Ok(k) => {
                assert_eq!(k, orig_kind);
            }
            Err(_) => {
                panic!("unable to round-trip alarm kind {orig_kind:?}");
            }
        }
    }
    assert_eq!(
        AlarmKind::try_from("illegalio").ok(),
        Some(AlarmKind::IllegalIo)
    );
    assert!(AlarmKind::try_from("this is not an alarm name").is_err());
}

#[test]
fn test_alarm_maskability() {
    let maskable: Vec<AlarmKind> = AlarmKind::all_alarm_kinds()
        .into_iter()
        .filter(|k| k.maskable() == AlarmMaskability::Maskable)
        .collect();
    assert_eq!(
        maskable,
        vec![
            AlarmKind::IllegalInstruction,
            AlarmKind::IllegalIo,
            AlarmKind::InvalidDevice
        ]
    );
}

/// Indicates what the simulator was doing when a bug was discovered.
#[derive(Debug, Clone)]
pub enum BugActivity {
    Io,
    Opcode,
    AlarmHandling,
}

/// The details of each kind of stop condition.
#[derive(Debug, Clone)]
pub enum AlarmDetails {
    /// An instruction word with an undefined opcode (or an undefined
    /// shift sub-operation) was executed.
    IllegalInstruction {
        instruction: Instruction,
        message: String,
    },

    /// An I/O instruction was used in a way the hardware does not
    /// support (for example PIN with no pending alert, or connecting
    /// a busy channel to a different device).
    IllegalIo {
        instruction: Instruction,
        message: String,
    },

    /// An I/O instruction addressed a device which is not bound to
    /// the selected channel.
    InvalidDevice {
        channel: Unsigned3Bit,
        device: Unsigned6Bit,
    },

    /// The chain of indirect addresses was longer than the configured
    /// limit.
    IndirectLimit { address: Address, limit: usize },

    /// A chain of EXU instructions was longer than the configured
    /// limit.
    ExecuteLimit { address: Address, limit: usize },

    /// An interrupt was accepted, but its vector location could not
    /// be used.
    IllegalVector {
        level: Unsigned5Bit,
        vector: PhysicalAddress,
        message: String,
    },

    /// A trap vector contained something other than BRU or BRM.
    TrapNotBranch {
        vector: PhysicalAddress,
        word: Unsigned24Bit,
        message: String,
    },

    /// The real-time clock pulse vector contained something other
    /// than MIN or SKR.
    InvalidRtcInstruction { word: Unsigned24Bit, message: String },

    /// There is a bug in the simulator.
    Bug {
        activity: BugActivity,
        diagnostics: CurrentInstructionDiagnostics,
        message: String,
    },
}

impl AlarmDetails {
    #[must_use]
    pub fn kind(&self) -> AlarmKind {
        match self {
            AlarmDetails::IllegalInstruction { .. } => AlarmKind::IllegalInstruction,
            AlarmDetails::IllegalIo { .. } => AlarmKind::IllegalIo,
            AlarmDetails::InvalidDevice { .. } => AlarmKind::InvalidDevice,
            AlarmDetails::IndirectLimit { .. } => AlarmKind::IndirectLimit,
            AlarmDetails::ExecuteLimit { .. } => AlarmKind::ExecuteLimit,
            AlarmDetails::IllegalVector { .. } => AlarmKind::IllegalVector,
            AlarmDetails::TrapNotBranch { .. } => AlarmKind::TrapNotBranch,
            AlarmDetails::InvalidRtcInstruction { .. } => AlarmKind::InvalidRtcInstruction,
            AlarmDetails::Bug { .. } => AlarmKind::Bug,
        }
    }
}

impl Display for AlarmDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        use AlarmDetails::*;
        match self {
            IllegalInstruction {
                instruction,
                message,
            } => write!(f, "illegal instruction {instruction:?}: {message}"),
            IllegalIo {
                instruction,
                message,
            } => write!(f, "illegal I/O operation {instruction:?}: {message}"),
            InvalidDevice { channel, device } => write!(
                f,
                "no device {device:02o} is attached to channel {}",
                channel_name(*channel)
            ),
            IndirectLimit { address, limit } => write!(
                f,
                "more than {limit} levels of indirect addressing (last address {address})"
            ),
            ExecuteLimit { address, limit } => write!(
                f,
                "more than {limit} nested EXU instructions (last address {address})"
            ),
            IllegalVector {
                level,
                vector,
                message,
            } => write!(
                f,
                "interrupt level {level} has an unusable vector at {vector}: {message}"
            ),
            TrapNotBranch {
                vector,
                word,
                message,
            } => write!(
                f,
                "trap vector at {vector} contains {word:08o}, which is not BRU or BRM: {message}"
            ),
            InvalidRtcInstruction { word, message } => write!(
                f,
                "real-time clock vector contains {word:08o}, which is not MIN or SKR: {message}"
            ),
            Bug {
                activity,
                diagnostics,
                message,
            } => {
                let activity_desc = match activity {
                    BugActivity::Io => "I/O",
                    BugActivity::Opcode => "instruction execution",
                    BugActivity::AlarmHandling => "alarm handling",
                };
                write!(
                    f,
                    "encountered a bug in simulator {activity_desc} during execution of {diagnostics}: {message}"
                )
            }
        }
    }
}

/// Channels are conventionally named by letter.
fn channel_name(channel: Unsigned3Bit) -> char {
    const NAMES: [char; 8] = ['W', 'Y', 'C', 'D', 'E', 'F', 'G', 'H'];
    NAMES[usize::from(channel)]
}

/// Describes an alarm which is active.
#[derive(Debug, Clone)]
pub struct Alarm {
    pub details: AlarmDetails,
}

impl Alarm {
    #[must_use]
    pub fn kind(&self) -> AlarmKind {
        self.details.kind()
    }
}

impl From<AlarmDetails> for Alarm {
    fn from(details: AlarmDetails) -> Alarm {
        Alarm { details }
    }
}

impl Display for Alarm {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: {}", self.kind(), self.details)
    }
}

impl Error for Alarm {}

/// Describes an alarm which is active and is not masked (meaning that
/// it is actually firing, and the machine has stopped).
#[derive(Debug)]
pub struct UnmaskedAlarm {
    pub alarm: Alarm,
    pub address: Option<Address>,
    pub when: Duration,
}

impl Display for UnmaskedAlarm {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unmasked alarm {}", self.alarm)?;
        if let Some(address) = self.address {
            write!(f, " at address {address}")
        } else {
            Ok(())
        }
    }
}

impl Error for UnmaskedAlarm {}

/// A trait for objects which implement the firing of alarms.
pub trait Alarmer {
    /// Fire the indicated alarm if it is not masked.
    fn fire_if_not_masked<F: DiagnosticFetcher>(
        &mut self,
        alarm_instance: Alarm,
        get_diags: F,
    ) -> Result<(), Alarm>;
    /// Unconditionally fire the indicated alarm.
    fn always_fire<F: DiagnosticFetcher>(&mut self, alarm_instance: Alarm, get_diags: F) -> Alarm;
}

#[test]
fn test_alarm_display() {
    let alarm = Alarm::from(AlarmDetails::InvalidDevice {
        channel: u3!(1),
        device: u6!(0o41),
    });
    assert_eq!(
        alarm.to_string(),
        "InvalidDevice: no device 41 is attached to channel Y"
    );
    let alarm = Alarm::from(AlarmDetails::IndirectLimit {
        address: Address::from(u14!(0o100)),
        limit: 32,
    });
    assert_eq!(
        alarm.to_string(),
        "IndirectLimit: more than 32 levels of indirect addressing (last address 00100)"
    );
}
