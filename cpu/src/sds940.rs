//! The complete machine: control unit, memory, I/O channels and the
//! real-time clock, stepped together in simulated time.
//!
//! Each call to [`Sds940::step`] first serves any device or clock
//! events which have fallen due, then either accepts an interrupt or
//! executes one instruction, and finally moves every active channel
//! on by one character.
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{event, span, Level};

use base::prelude::*;

use crate::alarm::{Alarm, AlarmKind, UnmaskedAlarm};
use crate::alarmunit::AlarmStatus;
use crate::clock::Clock;
use crate::context::Context;
use crate::control::{Bus, ControlUnit};
use crate::io::{DispatchRegistry, EventQueue, EventSource, IoSubsystem};
use crate::memory::{MemoryConfiguration, MemoryUnit};
use crate::rtc::{RealTimeClock, RtcConfiguration};
use crate::types::{EngineConfiguration, PanicOnUnmaskedAlarm, StepOutcome};

/// Why [`Sds940::run_until_stop`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Halted,
    StepLimit,
}

#[derive(Debug)]
pub struct Sds940 {
    control: ControlUnit,
    mem: MemoryUnit,
    io: IoSubsystem,
    events: EventQueue,
    rtc: RealTimeClock,
    halted: bool,
}

impl Sds940 {
    pub fn new(
        panic_on_unmasked_alarm: PanicOnUnmaskedAlarm,
        engine_config: EngineConfiguration,
        mem_config: &MemoryConfiguration,
        rtc_config: RtcConfiguration,
        registry: DispatchRegistry,
    ) -> Sds940 {
        event!(
            Level::DEBUG,
            "building machine with {} words of memory and {} devices",
            mem_config.size.words(),
            registry.len()
        );
        let mut machine = Sds940 {
            control: ControlUnit::new(panic_on_unmasked_alarm, engine_config),
            mem: MemoryUnit::new(mem_config),
            io: IoSubsystem::new(registry),
            events: EventQueue::new(),
            rtc: RealTimeClock::new(rtc_config),
            halted: false,
        };
        machine.io.schedule_devices(&mut machine.events);
        machine.rtc.start(Duration::ZERO, &mut machine.events);
        machine
    }

    /// Reset the processor and the channels.  Memory is left alone.
    pub fn reset(&mut self, ctx: &Context) {
        self.control.reset();
        self.control.clear_alarms();
        self.io.reset(ctx, &mut self.events);
        self.events.clear();
        self.io.schedule_devices(&mut self.events);
        self.rtc.start(ctx.simulated_time, &mut self.events);
        self.halted = false;
    }

    /// Set P and leave the halted state.
    pub fn start_at(&mut self, address: Address) {
        event!(Level::INFO, "starting at {address:o}");
        self.control.registers_mut().p = address;
        self.control.clear_alarms();
        self.halted = false;
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Store a word in physical memory (from the operator's console,
    /// not from the program).
    pub fn deposit(&mut self, addr: PhysicalAddress, value: Unsigned24Bit) {
        self.mem.store(addr, value);
    }

    #[must_use]
    pub fn inspect(&self, addr: PhysicalAddress) -> Unsigned24Bit {
        self.mem.fetch(addr)
    }

    #[must_use]
    pub fn control(&self) -> &ControlUnit {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut ControlUnit {
        &mut self.control
    }

    #[must_use]
    pub fn memory(&self) -> &MemoryUnit {
        &self.mem
    }

    #[must_use]
    pub fn io(&self) -> &IoSubsystem {
        &self.io
    }

    #[must_use]
    pub fn rtc_enabled(&self) -> bool {
        self.rtc.is_enabled()
    }

    pub fn set_rtc_enabled(&mut self, ctx: &Context, enabled: bool) {
        event!(
            Level::DEBUG,
            "real-time clock {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.rtc
            .set_enabled(ctx.simulated_time, enabled, &mut self.events);
    }

    /// The simulated time at which the next device or clock event is
    /// due.
    #[must_use]
    pub fn next_event_due(&self) -> Option<Duration> {
        self.events.next_due()
    }

    /// # Errors
    ///
    /// Fails when `kind` is an alarm which cannot be masked.
    pub fn set_alarm_masked(&mut self, kind: AlarmKind, masked: bool) -> Result<(), Alarm> {
        self.control.set_alarm_masked(kind, masked)
    }

    #[must_use]
    pub fn alarm_statuses(&self) -> Vec<AlarmStatus> {
        self.control.alarm_statuses()
    }

    pub fn drain_alarm_changes(&mut self) -> BTreeMap<AlarmKind, AlarmStatus> {
        self.control.drain_alarm_changes()
    }

    fn serve_due_events(&mut self, ctx: &Context) {
        while let Some((source, due)) = self.events.pop_due(ctx.simulated_time) {
            match source {
                EventSource::Device(id) => {
                    self.io.service_device(
                        ctx,
                        id,
                        self.control.interrupts_mut(),
                        &mut self.events,
                    );
                }
                EventSource::RealTimeClock => {
                    self.rtc
                        .on_pulse(due, self.control.interrupts_mut(), &mut self.events);
                }
            }
        }
    }

    /// Perform one step of the machine.  Returns the outcome and the
    /// number of nanoseconds of simulated time the step took.
    ///
    /// # Errors
    ///
    /// An alarm which is not masked stops the machine; it is returned
    /// along with the address of the instruction which caused it.
    pub fn step(&mut self, ctx: &Context) -> Result<(StepOutcome, u64), UnmaskedAlarm> {
        if self.halted {
            event!(Level::TRACE, "machine is halted; nothing to do");
            return Ok((StepOutcome::Halted, 0));
        }
        let step_span = span!(Level::TRACE, "step", t=?ctx.simulated_time);
        let _enter = step_span.enter();

        self.serve_due_events(ctx);
        let mut bus = Bus {
            ctx,
            mem: &mut self.mem,
            io: &mut self.io,
            events: &mut self.events,
        };
        let executed = match self.control.accept_interrupt(&mut bus) {
            Ok(Some(accepted)) => Ok(accepted),
            Ok(None) => self.control.fetch_and_execute(&mut bus),
            Err(alarm) => Err(alarm),
        };
        self.io.tick(
            ctx,
            &mut self.mem,
            self.control.interrupts_mut(),
            &mut self.events,
        );
        match executed {
            Ok((outcome, ns)) => {
                if outcome == StepOutcome::Halted {
                    event!(
                        Level::INFO,
                        "halted at {:o}",
                        self.control.registers().n_address
                    );
                    self.halted = true;
                }
                Ok((outcome, ns))
            }
            Err(alarm) => {
                let address = self.control.registers().n_address;
                event!(
                    Level::INFO,
                    "alarm raised by the instruction at {:o} at system time {:?}",
                    address,
                    ctx.simulated_time
                );
                Err(UnmaskedAlarm {
                    alarm,
                    address: Some(address),
                    when: ctx.simulated_time,
                })
            }
        }
    }

    /// Step the machine until it halts or `max_steps` steps have been
    /// performed.  Each step consumes its duration from `clock`.
    ///
    /// # Errors
    ///
    /// Stops at the first unmasked alarm.
    pub fn run_until_stop<C: Clock>(
        &mut self,
        clock: &mut C,
        max_steps: Option<u64>,
    ) -> Result<StopReason, UnmaskedAlarm> {
        let started = Instant::now();
        let mut steps: u64 = 0;
        loop {
            if max_steps.is_some_and(|limit| steps >= limit) {
                event!(Level::DEBUG, "stopping after {steps} steps");
                return Ok(StopReason::StepLimit);
            }
            let ctx = Context::new(clock.now(), started.elapsed());
            let (outcome, ns) = self.step(&ctx)?;
            steps += 1;
            clock.consume(&Duration::from_nanos(ns));
            if outcome == StepOutcome::Halted {
                return Ok(StopReason::Halted);
            }
        }
    }
}
