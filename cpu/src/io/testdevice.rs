//! A scripted device for tests.  The test keeps a handle on the
//! device's state so that it can feed input and inspect output after
//! the device has been handed to the registry.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use base::prelude::*;

use super::{
    AddressRange, ConnectRequest, Device, DeviceError, Directions, ReadOutcome, WriteOutcome,
};
use crate::context::Context;

#[derive(Debug, Default)]
pub(crate) struct TestDeviceState {
    pub(crate) input: VecDeque<ReadOutcome>,
    pub(crate) written: Vec<Unsigned24Bit>,
    pub(crate) end_of_record_writes: usize,
    pub(crate) connects: Vec<ConnectRequest>,
    pub(crate) disconnects: usize,
    pub(crate) controls: Vec<Unsigned12Bit>,
    pub(crate) busy: bool,
    pub(crate) signal: bool,
    pub(crate) fail_writes: bool,
    pub(crate) fail_connect: bool,
    pub(crate) fail_control: bool,
    pub(crate) fail_signal: bool,
    pub(crate) parallel_outputs: Vec<(Unsigned9Bit, Unsigned24Bit)>,
    pub(crate) parallel_input_value: Unsigned24Bit,
    pub(crate) service_at: Option<Duration>,
    pub(crate) service_level: Option<Unsigned5Bit>,
    pub(crate) serviced: usize,
}

pub(crate) struct TestDevice {
    name: String,
    range: AddressRange,
    alerts: Vec<Unsigned9Bit>,
    state: Rc<RefCell<TestDeviceState>>,
}

impl TestDevice {
    pub(crate) fn new(
        name: &str,
        channel: Unsigned3Bit,
        base: Unsigned5Bit,
        directions: Directions,
    ) -> TestDevice {
        TestDevice {
            name: name.to_string(),
            range: AddressRange {
                channel,
                base,
                count: 1,
                directions,
            },
            alerts: Vec::new(),
            state: Rc::new(RefCell::new(TestDeviceState::default())),
        }
    }

    pub(crate) fn with_count(mut self, count: u8) -> TestDevice {
        self.range.count = count;
        self
    }

    pub(crate) fn with_alerts(mut self, alerts: Vec<Unsigned9Bit>) -> TestDevice {
        self.alerts = alerts;
        self
    }

    pub(crate) fn boxed(self) -> Box<dyn Device> {
        Box::new(self)
    }

    pub(crate) fn state(&self) -> Rc<RefCell<TestDeviceState>> {
        Rc::clone(&self.state)
    }
}

impl Device for TestDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn address_range(&self) -> AddressRange {
        self.range
    }

    fn alert_codes(&self) -> Vec<Unsigned9Bit> {
        self.alerts.clone()
    }

    fn connect(&mut self, _ctx: &Context, request: &ConnectRequest) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        if state.fail_connect {
            return Err(DeviceError::NotAttached);
        }
        state.connects.push(*request);
        Ok(())
    }

    fn io_control_mode1(
        &mut self,
        _ctx: &Context,
        _unit: Unsigned6Bit,
        function: Unsigned12Bit,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        if state.fail_control {
            return Err(DeviceError::IoFailure("control failed".to_string()));
        }
        state.controls.push(function);
        Ok(())
    }

    fn disconnect(&mut self, _ctx: &Context, _unit: Unsigned6Bit) {
        self.state.borrow_mut().disconnects += 1;
    }

    fn read(&mut self, _ctx: &Context, _unit: Unsigned6Bit) -> Result<ReadOutcome, DeviceError> {
        Ok(self
            .state
            .borrow_mut()
            .input
            .pop_front()
            .unwrap_or(ReadOutcome::NotReady))
    }

    fn write(
        &mut self,
        _ctx: &Context,
        _unit: Unsigned6Bit,
        ch: Unsigned24Bit,
    ) -> Result<WriteOutcome, DeviceError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            Err(DeviceError::IoFailure("write failed".to_string()))
        } else if state.busy {
            Ok(WriteOutcome::NotReady)
        } else {
            state.written.push(ch);
            Ok(WriteOutcome::Accepted)
        }
    }

    fn write_end_of_record(
        &mut self,
        _ctx: &Context,
        _unit: Unsigned6Bit,
    ) -> Result<(), DeviceError> {
        self.state.borrow_mut().end_of_record_writes += 1;
        Ok(())
    }

    fn skip_signal_test(
        &mut self,
        _ctx: &Context,
        _unit: Unsigned6Bit,
        _function: Unsigned12Bit,
    ) -> Result<bool, DeviceError> {
        let state = self.state.borrow();
        if state.fail_signal {
            Err(DeviceError::IoFailure("signal test failed".to_string()))
        } else {
            Ok(state.signal)
        }
    }

    fn parallel_input(&mut self, _ctx: &Context, _code: Unsigned9Bit) -> Unsigned24Bit {
        self.state.borrow().parallel_input_value
    }

    fn parallel_output(&mut self, _ctx: &Context, code: Unsigned9Bit, value: Unsigned24Bit) {
        self.state.borrow_mut().parallel_outputs.push((code, value));
    }

    fn service(&mut self, _ctx: &Context) -> Option<Unsigned5Bit> {
        let mut state = self.state.borrow_mut();
        state.serviced += 1;
        state.service_at = None;
        state.service_level
    }

    fn next_service(&self) -> Option<Duration> {
        self.state.borrow().service_at
    }
}
