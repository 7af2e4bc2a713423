//! Some alarms can be "masked", meaning that the machine carries on
//! instead of stopping.  Whether or not this is happening is
//! controlled by the AlarmUnit.
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{event, Level};

use super::alarm::{Alarm, AlarmDetails, AlarmKind, AlarmMaskability, Alarmer, BugActivity};
use super::changelog::ChangeIndex;
use super::diagnostics::{CurrentInstructionDiagnostics, DiagnosticFetcher};

#[derive(Debug, Serialize)]
pub struct AlarmStatus {
    pub name: String,
    pub maskable: bool,
    pub masked: bool,
    pub active: bool,
    pub message: String,
}

/// An alarm is in one of the following states:
///
/// - inactive: it's not happening
/// - firing: it's happening and not masked (execution will stop)
/// - active but not firing (visible to the operator, execution continues)
#[derive(Debug, Default)]
pub struct AlarmUnit {
    panic_on_unmasked_alarm: bool,
    masked: BTreeSet<AlarmKind>,
    active: BTreeMap<AlarmKind, Alarm>,
    changes: ChangeIndex<AlarmKind>,
}

impl AlarmUnit {
    #[must_use]
    pub fn new() -> AlarmUnit {
        AlarmUnit::default()
    }

    #[must_use]
    pub fn new_with_panic(panic: bool) -> AlarmUnit {
        AlarmUnit {
            panic_on_unmasked_alarm: panic,
            ..AlarmUnit::new()
        }
    }

    fn status_for_alarm_kind(&self, kind: &AlarmKind) -> AlarmStatus {
        let maybe_firing_alarm: Option<&Alarm> = self.active.get(kind);
        AlarmStatus {
            name: kind.to_string(),
            maskable: matches!(kind.maskable(), AlarmMaskability::Maskable),
            masked: self.masked.contains(kind),
            active: maybe_firing_alarm.is_some(),
            message: match maybe_firing_alarm {
                Some(a) => a.to_string(),
                None => String::new(),
            },
        }
    }

    #[must_use]
    pub fn get_alarm_statuses(&self) -> Vec<AlarmStatus> {
        AlarmKind::all_alarm_kinds()
            .iter()
            .map(|kind| self.status_for_alarm_kind(kind))
            .collect()
    }

    pub fn drain_alarm_changes(&mut self) -> BTreeMap<AlarmKind, AlarmStatus> {
        self.changes
            .drain()
            .into_iter()
            .map(|kind| (kind, self.status_for_alarm_kind(&kind)))
            .collect()
    }

    #[must_use]
    pub fn get_status_of_alarm(&self, name: &str) -> Option<AlarmStatus> {
        AlarmKind::try_from(name)
            .map(|k| self.status_for_alarm_kind(&k))
            .ok()
    }

    /// Mask an alarm so that, when it occurs, execution continues.
    ///
    /// # Errors
    ///
    /// Attempting to mask an unmaskable alarm raises a `Bug` alarm.
    pub fn mask(
        &mut self,
        kind: AlarmKind,
        diags: &CurrentInstructionDiagnostics,
    ) -> Result<(), Alarm> {
        match kind.maskable() {
            AlarmMaskability::Unmaskable => {
                let bug = Alarm {
                    details: AlarmDetails::Bug {
                        activity: BugActivity::AlarmHandling,
                        diagnostics: diags.clone(),
                        message: format!("attempt to mask unmaskable alarm {kind}"),
                    },
                };
                Err(self.always_fire(bug, diags))
            }
            AlarmMaskability::Maskable => {
                self.changes.add(kind);
                self.masked.insert(kind);
                Ok(())
            }
        }
    }

    pub fn unmask(&mut self, kind: AlarmKind) {
        if self.masked.remove(&kind) {
            self.changes.add(kind);
        }
    }

    fn is_masked(&self, alarm_instance: &Alarm) -> bool {
        let kind = alarm_instance.kind();
        match kind.maskable() {
            AlarmMaskability::Unmaskable => false,
            AlarmMaskability::Maskable => self.masked.contains(&kind),
        }
    }

    fn maybe_panic(&self, alarm_instance: &Alarm) {
        if self.panic_on_unmasked_alarm {
            // Logged first so that the enclosing span (which
            // identifies the instruction) is recorded.
            event!(Level::ERROR, "panicing with alarm {}", alarm_instance);
            panic!(
                "unmasked alarm and panic_on_unmasked_alarm={}: {}",
                self.panic_on_unmasked_alarm, alarm_instance
            );
        }
    }

    pub fn clear_all_alarms(&mut self) {
        event!(Level::INFO, "clearing all alarms");
        for kind in self.active.keys() {
            self.changes.add(*kind);
        }
        self.active.clear();
    }

    #[must_use]
    pub fn unmasked_alarm_active(&self) -> bool {
        self.active.keys().any(|kind| match kind.maskable() {
            AlarmMaskability::Unmaskable => true,
            AlarmMaskability::Maskable => !self.masked.contains(kind),
        })
    }

    fn set_active(&mut self, alarm_instance: Alarm) -> Result<(), Alarm> {
        let kind: AlarmKind = alarm_instance.kind();
        self.changes.add(kind);
        if self.is_masked(&alarm_instance) {
            event!(Level::DEBUG, "ignoring masked alarm {alarm_instance}");
            self.active.insert(kind, alarm_instance);
            Ok(())
        } else {
            self.active.insert(kind, alarm_instance.clone());
            self.maybe_panic(&alarm_instance);
            Err(alarm_instance)
        }
    }
}

impl Alarmer for AlarmUnit {
    fn fire_if_not_masked<F: DiagnosticFetcher>(
        &mut self,
        alarm_instance: Alarm,
        _get_diags: F,
    ) -> Result<(), Alarm> {
        self.set_active(alarm_instance)
    }

    fn always_fire<F: DiagnosticFetcher>(
        &mut self,
        alarm_instance: Alarm,
        get_diagnostics: F,
    ) -> Alarm {
        let kind = alarm_instance.kind();
        match self.set_active(alarm_instance) {
            Err(a) => a,
            Ok(()) => {
                let bug = Alarm {
                    details: AlarmDetails::Bug {
                        activity: BugActivity::AlarmHandling,
                        diagnostics: get_diagnostics.diagnostics(),
                        message: format!(
                            "alarm {kind} is masked, but the caller assumed it could not be"
                        ),
                    },
                };
                match self.set_active(bug) {
                    Err(a) => a,
                    Ok(()) => unreachable!("Bug alarm was unexpectedly masked"),
                }
            }
        }
    }
}

#[cfg(test)]
fn test_diagnostics() -> CurrentInstructionDiagnostics {
    use base::prelude::{Address, Instruction, Unsigned24Bit};
    CurrentInstructionDiagnostics {
        current_instruction: Instruction::from(Unsigned24Bit::ZERO),
        instruction_address: Address::ZERO,
    }
}

#[test]
fn unmaskable_alarms_are_not_maskable() {
    use base::prelude::*;

    let mut alarm_unit = AlarmUnit::new_with_panic(false);
    assert!(!alarm_unit.unmasked_alarm_active());
    let diagnostics = test_diagnostics();
    // Any attempt to mask an unmaskable alarm should itself result in an error.
    assert!(alarm_unit
        .mask(AlarmKind::IndirectLimit, &diagnostics)
        .is_err());
    alarm_unit.clear_all_alarms();
    assert!(!alarm_unit.unmasked_alarm_active());

    assert!(matches!(
        alarm_unit.fire_if_not_masked(
            Alarm {
                details: AlarmDetails::IndirectLimit {
                    address: Address::from(u14!(0o200)),
                    limit: 32,
                },
            },
            &diagnostics
        ),
        Err(Alarm {
            details: AlarmDetails::IndirectLimit { .. },
        })
    ));
    assert!(alarm_unit.unmasked_alarm_active());
}

#[test]
fn maskable_alarms_are_not_masked_by_default() {
    use base::prelude::*;

    let mut alarm_unit = AlarmUnit::new_with_panic(false);
    let diagnostics = test_diagnostics();
    let the_alarm = Alarm {
        details: AlarmDetails::InvalidDevice {
            channel: u3!(0),
            device: u6!(0o12),
        },
    };
    assert!(matches!(
        alarm_unit.fire_if_not_masked(the_alarm, &diagnostics),
        Err(Alarm {
            details: AlarmDetails::InvalidDevice { .. },
        })
    ));
    assert!(alarm_unit.unmasked_alarm_active());
}

#[test]
fn masked_alarms_are_recorded_but_do_not_fire() {
    use base::prelude::*;

    let mut alarm_unit = AlarmUnit::new_with_panic(false);
    let diagnostics = test_diagnostics();
    alarm_unit
        .mask(AlarmKind::IllegalIo, &diagnostics)
        .expect("IllegalIo should be maskable");
    let the_alarm = Alarm {
        details: AlarmDetails::IllegalIo {
            instruction: Instruction::from(u24!(0o3300100)),
            message: "no alert is pending".to_string(),
        },
    };
    assert!(alarm_unit
        .fire_if_not_masked(the_alarm, &diagnostics)
        .is_ok());
    assert!(!alarm_unit.unmasked_alarm_active());
    let status = alarm_unit
        .get_status_of_alarm("IllegalIo")
        .expect("known alarm name");
    assert!(status.masked);
    assert!(status.active);
    assert!(status.message.contains("no alert is pending"));

    let changes = alarm_unit.drain_alarm_changes();
    assert!(changes.contains_key(&AlarmKind::IllegalIo));
    assert!(alarm_unit.drain_alarm_changes().is_empty());

    // Unmasking turns the recorded alarm into a firing one.
    alarm_unit.unmask(AlarmKind::IllegalIo);
    assert!(alarm_unit.unmasked_alarm_active());
}
