//! Diagnostic information for log messages and alarms.
//!
//! The real SDS 940 had no message to go along with a stop, but the
//! simulator does.
use std::fmt::{Display, Formatter};

use base::prelude::{Address, Instruction};

/// CurrentInstructionDiagnostics is only for generating debug
/// information.  They must not be used for control/execution
/// purposes.
///
/// A clone of this struct needs to remain cheap, since we clone it
/// where an alarm is possible but unlikely.
#[derive(Debug, Clone)]
pub struct CurrentInstructionDiagnostics {
    pub current_instruction: Instruction,
    pub instruction_address: Address,
}

impl Display for &CurrentInstructionDiagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "instruction {} ({:08o}) at address {}",
            self.current_instruction,
            self.current_instruction.bits(),
            self.instruction_address
        )
    }
}

pub trait DiagnosticFetcher {
    fn diagnostics(self) -> CurrentInstructionDiagnostics;
}

impl DiagnosticFetcher for CurrentInstructionDiagnostics {
    fn diagnostics(self) -> CurrentInstructionDiagnostics {
        self
    }
}

impl DiagnosticFetcher for &CurrentInstructionDiagnostics {
    fn diagnostics(self) -> CurrentInstructionDiagnostics {
        self.clone()
    }
}

#[test]
fn test_diagnostics_display() {
    use base::prelude::*;
    let diags = CurrentInstructionDiagnostics {
        current_instruction: Instruction::from(u24!(0o7600100)),
        instruction_address: Address::from(u14!(0o1000)),
    };
    assert_eq!(
        (&diags).to_string(),
        "instruction LDA 00100 (07600100) at address 01000"
    );
}
