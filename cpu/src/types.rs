use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// The three operating modes of the processor.
///
/// - Normal: SDS 930 compatible; the low 8K of virtual memory maps
///   directly onto physical memory and nothing is privileged.
/// - Monitor: the operating system's mode; addresses are mapped
///   through the monitor map, and an address whose bit 23 is set
///   refers to the user's address space.
/// - User: addresses are mapped through the user map, and
///   privileged instructions trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessorMode {
    Normal,
    Monitor,
    User,
}

impl Display for ProcessorMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            ProcessorMode::Normal => "normal",
            ProcessorMode::Monitor => "monitor",
            ProcessorMode::User => "user",
        })
    }
}

/// The result of a single step of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The machine can keep going.
    Running,
    /// A HLT instruction was executed.
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicOnUnmaskedAlarm {
    No,
    Yes,
}

/// Limits and start-up settings for the instruction engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfiguration {
    /// Maximum number of indirect words followed while computing a
    /// single effective address.
    pub indirect_limit: usize,
    /// Maximum length of a chain of EXU instructions.
    pub execute_limit: usize,
    /// The mode the processor is in after a reset.
    pub reset_mode: ProcessorMode,
}

impl Default for EngineConfiguration {
    fn default() -> EngineConfiguration {
        EngineConfiguration {
            indirect_limit: 32,
            execute_limit: 32,
            reset_mode: ProcessorMode::Normal,
        }
    }
}
