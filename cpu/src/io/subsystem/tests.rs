use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use base::prelude::*;

use super::super::testdevice::{TestDevice, TestDeviceState};
use super::super::{ChannelFlags, Directions, ReadOutcome};
use super::*;
use crate::interrupt::ChannelInterrupt;
use crate::memory::MemoryConfiguration;

struct Fixture {
    ctx: Context,
    io: IoSubsystem,
    mem: MemoryUnit,
    interrupts: InterruptController,
    events: EventQueue,
    translator: AddressTranslator,
}

impl Fixture {
    fn new(devices: Vec<TestDevice>) -> Fixture {
        let registry =
            DispatchRegistry::build(devices.into_iter().map(TestDevice::boxed).collect())
                .expect("test devices should not collide");
        Fixture {
            ctx: Context::new(Duration::ZERO, Duration::ZERO),
            io: IoSubsystem::new(registry),
            mem: MemoryUnit::new(&MemoryConfiguration::default()),
            interrupts: InterruptController::new(),
            events: EventQueue::new(),
            translator: AddressTranslator::new(),
        }
    }

    fn connect(&mut self, channel: Unsigned3Bit, function: u16) -> Result<(), IoFailure> {
        let function = Unsigned12Bit::try_from(function).expect("function should fit");
        self.io.connect(
            &self.ctx,
            channel,
            function,
            &mut self.interrupts,
            &mut self.events,
        )
    }

    fn control(&mut self, channel: Unsigned3Bit, function: u16) -> Result<(), IoFailure> {
        let function = Unsigned12Bit::try_from(function).expect("function should fit");
        self.io.io_control_mode1(
            &self.ctx,
            channel,
            function,
            &mut self.interrupts,
            &mut self.events,
        )
    }

    fn signal_test(&mut self, channel: Unsigned3Bit, function: u16) -> Result<bool, IoFailure> {
        let function = Unsigned12Bit::try_from(function).expect("function should fit");
        self.io.skip_device_signal(
            &self.ctx,
            channel,
            function,
            &mut self.interrupts,
            &mut self.events,
        )
    }

    fn pot(&mut self, alert: u16, word: u32) -> Result<(), IoFailure> {
        self.io
            .set_alert(Unsigned9Bit::try_from(alert).expect("alert should fit"));
        self.io.parallel_output(
            &self.ctx,
            &mut self.translator,
            Unsigned24Bit::try_from(word).expect("word should fit"),
            &mut self.events,
        )
    }

    fn buffer_control(&mut self, channel: Unsigned3Bit, function: u16) -> Result<(), IoFailure> {
        self.io
            .set_alert(Unsigned9Bit::from_low_bits(0o30 + u64::from(channel)));
        self.io.buffer_control(
            channel,
            Unsigned12Bit::try_from(function).expect("function should fit"),
        )
    }

    fn tick(&mut self) {
        self.io.tick(
            &self.ctx,
            &mut self.mem,
            &mut self.interrupts,
            &mut self.events,
        );
    }

    fn store(&mut self, addr: u32, word: u32) {
        self.mem.store(
            PhysicalAddress::from_low_bits(addr),
            Unsigned24Bit::try_from(word).expect("word should fit"),
        );
    }

    fn fetch(&self, addr: u32) -> Unsigned24Bit {
        self.mem.fetch(PhysicalAddress::from_low_bits(addr))
    }
}

fn teletype(channel: Unsigned3Bit) -> (TestDevice, Rc<RefCell<TestDeviceState>>) {
    let dev = TestDevice::new("teletype", channel, u5!(1), Directions::Both);
    let state = dev.state();
    (dev, state)
}

fn level(n: u8) -> Unsigned5Bit {
    Unsigned5Bit::try_from(n).expect("level should fit")
}

#[test]
fn test_signal_disconnect_output() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    f.store(0o1000, 0o111);
    f.store(0o1001, 0o222);
    f.store(0o1002, 0o333);
    // Output to device 1, 24-bit characters.
    f.connect(u3!(0), 0o1041).expect("connect should succeed");
    // Signal-disconnect, with both interrupts armed.
    f.buffer_control(u3!(0), 0o32)
        .expect("buffer control should succeed");
    f.pot(0o10, (3 << 14) | 0o1000)
        .expect("interlace load should succeed");
    assert_eq!(f.io.activity_mask(), 1);

    for _ in 0..3 {
        f.tick();
    }
    let ch = f.io.channel(u3!(0));
    assert!(!ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::END_OF_RECORD));
    assert!(!ch.flags().contains(ChannelFlags::ERROR));
    assert!(ch.word_count().is_zero());
    assert!(f.interrupts.is_requested(level(29)));
    assert!(f.interrupts.is_requested(level(28)));
    assert!(!f.interrupts.is_requested(level(27)));
    assert_eq!(f.io.activity_mask(), 0);

    let state = state.borrow();
    assert_eq!(state.written, vec![u24!(0o111), u24!(0o222), u24!(0o333)]);
    assert_eq!(state.end_of_record_writes, 1);
    assert_eq!(state.disconnects, 1);
}

#[test]
fn test_data_chaining_interrupts_once_per_crossing() {
    let (dev, state) = teletype(u3!(1));
    let mut f = Fixture::new(vec![dev]);
    {
        let mut state = state.borrow_mut();
        for ch in [0o1, 0o2, 0o3] {
            state.input.push_back(ReadOutcome::Char(Unsigned24Bit::from(ch as u8)));
        }
    }
    // Input from device 1, 24-bit characters.
    f.connect(u3!(1), 0o1001).expect("connect should succeed");
    f.pot(0o11, (3 << 14) | 0o3776)
        .expect("interlace load should succeed");
    // Chain to frame 5, with the chain interrupt requested.
    f.pot(0o21, 0o45).expect("data chain load should succeed");
    assert!(f.io.channel(u3!(1)).flags().contains(ChannelFlags::CHAIN_ARMED));

    let chain_level = level(27 - 3);
    f.tick();
    assert!(!f.interrupts.is_requested(chain_level));
    f.tick();
    assert!(f.interrupts.is_requested(chain_level));
    f.interrupts.cancel_request(chain_level);
    f.tick();
    assert!(!f.interrupts.is_requested(chain_level));

    assert_eq!(f.fetch(0o3776), u24!(1));
    assert_eq!(f.fetch(0o3777), u24!(2));
    assert_eq!(f.fetch(5 * 2048), u24!(3));
    assert_eq!(f.fetch(0o4000), u24!(0));
    let ch = f.io.channel(u3!(1));
    assert!(!ch.flags().contains(ChannelFlags::CHAIN_ARMED));
    assert!(!ch.flags().contains(ChannelFlags::INTERLACE));
    // Compatible mode stays connected after the word count runs out.
    assert!(ch.is_connected());
}

#[test]
fn test_compatible_output() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    // Output to device 1, four six-bit characters per word.
    f.connect(u3!(0), 0o041).expect("connect should succeed");
    f.io
        .load_output_word(u3!(0), u24!(0o01020304))
        .expect("channel should accept a word");
    assert_eq!(
        f.io.load_output_word(u3!(0), u24!(0o05060710)),
        Err(IoFailure::Retry)
    );
    for _ in 0..4 {
        f.tick();
    }
    assert!(f.io.channel(u3!(0)).flags().contains(ChannelFlags::OUTPUT_WAKE));
    f.io
        .load_output_word(u3!(0), u24!(0o05060710))
        .expect("channel should accept a word");
    assert!(!f.io.channel(u3!(0)).flags().contains(ChannelFlags::OUTPUT_WAKE));
    f.tick();
    assert_eq!(
        state.borrow().written,
        vec![u24!(0o01), u24!(0o02), u24!(0o03), u24!(0o04), u24!(0o05)]
    );
}

#[test]
fn test_busy_device_holds_output() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    f.connect(u3!(0), 0o1041).expect("connect should succeed");
    f.io
        .load_output_word(u3!(0), u24!(0o7))
        .expect("channel should accept a word");
    state.borrow_mut().busy = true;
    f.tick();
    f.tick();
    assert!(state.borrow().written.is_empty());
    state.borrow_mut().busy = false;
    f.tick();
    assert_eq!(state.borrow().written, vec![u24!(0o7)]);
}

#[test]
fn test_terminate_output() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    f.connect(u3!(0), 0o1041).expect("connect should succeed");
    f.io
        .load_output_word(u3!(0), u24!(0o55))
        .expect("channel should accept a word");
    f.io.terminate_output(u3!(0)).expect("TOP should succeed");
    f.tick();
    assert_eq!(state.borrow().written, vec![u24!(0o55)]);
    assert!(!f.io.channel(u3!(0)).is_connected());
    assert!(f
        .io
        .channel(u3!(0))
        .flags()
        .contains(ChannelFlags::END_OF_RECORD));
    assert_eq!(state.borrow().end_of_record_writes, 1);
    assert_eq!(state.borrow().disconnects, 1);
}

#[test]
fn test_terminate_output_with_nothing_pending() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    f.connect(u3!(0), 0o1041).expect("connect should succeed");
    f.io.terminate_output(u3!(0)).expect("TOP should succeed");
    f.tick();
    let ch = f.io.channel(u3!(0));
    assert!(!ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::END_OF_RECORD));
    assert!(!ch.flags().contains(ChannelFlags::ERROR));
    let state = state.borrow();
    assert!(state.written.is_empty());
    assert_eq!(state.end_of_record_writes, 1);
}

#[test]
fn test_record_disconnect_output() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    f.store(0o1000, 0o11);
    f.store(0o1001, 0o22);
    f.connect(u3!(0), 0o1041).expect("connect should succeed");
    // Record-disconnect, with the end-of-record interrupt armed.
    f.buffer_control(u3!(0), 0o11)
        .expect("buffer control should succeed");
    f.pot(0o10, (2 << 14) | 0o1000)
        .expect("interlace load should succeed");
    f.tick();
    assert!(f.io.channel(u3!(0)).is_connected());
    assert_eq!(state.borrow().end_of_record_writes, 0);
    f.tick();
    let ch = f.io.channel(u3!(0));
    assert!(!ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::END_OF_RECORD));
    assert!(!ch.flags().contains(ChannelFlags::INTERRECORD));
    assert!(!ch.flags().contains(ChannelFlags::ERROR));
    assert!(f
        .interrupts
        .is_requested(ChannelInterrupt::EndOfRecord.level(u3!(0))));
    // The zero word count interrupt was not armed.
    assert!(!f
        .interrupts
        .is_requested(ChannelInterrupt::ZeroWordCount.level(u3!(0))));
    let state = state.borrow();
    assert_eq!(state.written, vec![u24!(0o11), u24!(0o22)]);
    assert_eq!(state.end_of_record_writes, 1);
    assert_eq!(state.disconnects, 1);
}

#[test]
fn test_record_function_drops_characters_without_error() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    {
        let mut state = state.borrow_mut();
        state.input.push_back(ReadOutcome::Char(u24!(0o7)));
        state.input.push_back(ReadOutcome::Char(u24!(0o6)));
    }
    f.connect(u3!(0), 0o1001).expect("connect should succeed");
    // Record-proceed.
    f.buffer_control(u3!(0), 0o3)
        .expect("buffer control should succeed");
    f.pot(0o10, (1 << 14) | 0o100)
        .expect("interlace load should succeed");
    f.tick();
    assert_eq!(f.fetch(0o100), u24!(0o7));
    assert!(!f.io.channel(u3!(0)).flags().contains(ChannelFlags::INTERLACE));
    // No word is wanted, so this character is lost.
    f.tick();
    let ch = f.io.channel(u3!(0));
    assert!(state.borrow().input.is_empty());
    assert!(!ch.flags().contains(ChannelFlags::ERROR));
    assert!(ch.is_connected());
    assert_eq!(f.fetch(0o101), u24!(0));
}

#[test]
fn test_refused_connection_ends_record_in_error() {
    let (dev, state) = teletype(u3!(0));
    state.borrow_mut().fail_connect = true;
    let mut f = Fixture::new(vec![dev]);
    f.connect(u3!(0), 0o1041)
        .expect("a refused connection is not an illegal instruction");
    let ch = f.io.channel(u3!(0));
    assert!(!ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::ERROR));
    assert!(ch.flags().contains(ChannelFlags::END_OF_RECORD));
    assert_eq!(f.io.activity_mask(), 0);
    assert_eq!(state.borrow().disconnects, 1);
    assert!(state.borrow().connects.is_empty());
}

#[test]
fn test_failed_control_of_connected_device() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    f.connect(u3!(0), 0o1041).expect("connect should succeed");
    f.buffer_control(u3!(0), 0o10)
        .expect("buffer control should succeed");
    state.borrow_mut().fail_control = true;
    f.control(u3!(0), 0o41)
        .expect("a failed control is not an illegal instruction");
    let ch = f.io.channel(u3!(0));
    assert!(!ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::ERROR));
    assert!(ch.flags().contains(ChannelFlags::END_OF_RECORD));
    assert!(f
        .interrupts
        .is_requested(ChannelInterrupt::EndOfRecord.level(u3!(0))));
    assert_eq!(state.borrow().disconnects, 1);
}

#[test]
fn test_failed_control_of_idle_device() {
    let (dev, state) = teletype(u3!(0));
    state.borrow_mut().fail_control = true;
    let mut f = Fixture::new(vec![dev]);
    f.control(u3!(0), 0o41)
        .expect("a failed control is not an illegal instruction");
    let ch = f.io.channel(u3!(0));
    assert!(!ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::ERROR));
    assert!(!ch.flags().contains(ChannelFlags::END_OF_RECORD));
    assert_eq!(state.borrow().disconnects, 0);
}

#[test]
fn test_failed_signal_test_ends_record_in_error() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    f.connect(u3!(0), 0o1001).expect("connect should succeed");
    {
        let mut state = state.borrow_mut();
        state.signal = true;
        state.fail_signal = true;
    }
    assert_eq!(f.signal_test(u3!(0), 0o1), Ok(false));
    let ch = f.io.channel(u3!(0));
    assert!(!ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::ERROR));
    assert!(ch.flags().contains(ChannelFlags::END_OF_RECORD));
    assert_eq!(state.borrow().disconnects, 1);
}

#[test]
fn test_compatible_input() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    // Input from device 1, two six-bit characters per word.
    f.connect(u3!(0), 0o201).expect("connect should succeed");
    assert_eq!(f.io.input_word(u3!(0)), Err(IoFailure::Retry));
    {
        let mut state = state.borrow_mut();
        for ch in [0o12_u8, 0o34, 0o56] {
            state.input.push_back(ReadOutcome::Char(Unsigned24Bit::from(ch)));
        }
    }
    f.tick();
    assert_eq!(f.io.input_word(u3!(0)), Err(IoFailure::Retry));
    f.tick();
    assert_eq!(f.io.input_word(u3!(0)), Ok(u24!(0o12340000)));
    // Nobody has taken the word, so the next character is lost.
    f.tick();
    assert!(!f.io.channel(u3!(0)).flags().contains(ChannelFlags::ERROR));
    f.io.consume_input_word(u3!(0));
    assert_eq!(f.io.input_word(u3!(0)), Err(IoFailure::Retry));
}

#[test]
fn test_input_end_of_record_flushes_partial_word() {
    let (dev, state) = teletype(u3!(2));
    let mut f = Fixture::new(vec![dev]);
    {
        let mut state = state.borrow_mut();
        state.input.push_back(ReadOutcome::Char(u24!(0o1)));
        state.input.push_back(ReadOutcome::Char(u24!(0o2)));
        state.input.push_back(ReadOutcome::EndOfRecord);
    }
    f.connect(u3!(2), 0o001).expect("connect should succeed");
    f.pot(0o12, (2 << 14) | 0o500)
        .expect("interlace load should succeed");
    f.buffer_control(u3!(2), 0o10)
        .expect("buffer control should succeed");
    for _ in 0..3 {
        f.tick();
    }
    assert_eq!(f.fetch(0o500), u24!(0o01020000));
    assert_eq!(f.fetch(0o501), u24!(0));
    let ch = f.io.channel(u3!(2));
    assert_eq!(ch.word_count(), u15!(1));
    assert!(!ch.is_connected());
    assert!(f
        .interrupts
        .is_requested(ChannelInterrupt::EndOfRecord.level(u3!(2))));
}

#[test]
fn test_record_proceed_waits_for_interlace() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    {
        let mut state = state.borrow_mut();
        state.input.push_back(ReadOutcome::Char(u24!(0o7)));
        state.input.push_back(ReadOutcome::EndOfRecord);
        state.input.push_back(ReadOutcome::Char(u24!(0o6)));
    }
    f.connect(u3!(0), 0o1001).expect("connect should succeed");
    f.buffer_control(u3!(0), 0o3)
        .expect("buffer control should succeed");
    f.pot(0o10, (4 << 14) | 0o100)
        .expect("interlace load should succeed");
    f.tick();
    f.tick();
    let ch = f.io.channel(u3!(0));
    assert!(ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::INTERRECORD));
    // Between records, nothing is read.
    f.tick();
    assert_eq!(state.borrow().input.len(), 1);

    f.pot(0o10, (4 << 14) | 0o200)
        .expect("interlace load should succeed");
    assert!(!f.io.channel(u3!(0)).flags().contains(ChannelFlags::INTERRECORD));
    f.tick();
    assert_eq!(f.fetch(0o100), u24!(0o7));
    assert_eq!(f.fetch(0o200), u24!(0o6));
}

#[test]
fn test_signal_function_rate_error() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    {
        let mut state = state.borrow_mut();
        state.input.push_back(ReadOutcome::Char(u24!(0o7)));
        state.input.push_back(ReadOutcome::Char(u24!(0o6)));
    }
    f.connect(u3!(0), 0o1001).expect("connect should succeed");
    f.buffer_control(u3!(0), 0o4)
        .expect("buffer control should succeed");
    f.pot(0o10, (1 << 14) | 0o100)
        .expect("interlace load should succeed");
    f.tick();
    assert_eq!(f.fetch(0o100), u24!(0o7));
    assert!(!f.io.channel(u3!(0)).flags().contains(ChannelFlags::INTERLACE));
    f.tick();
    assert!(f.io.channel(u3!(0)).flags().contains(ChannelFlags::ERROR));
}

#[test]
fn test_device_error_ends_transfer() {
    let (dev, state) = teletype(u3!(0));
    let mut f = Fixture::new(vec![dev]);
    state.borrow_mut().fail_writes = true;
    f.connect(u3!(0), 0o1041).expect("connect should succeed");
    f.io
        .load_output_word(u3!(0), u24!(0o7))
        .expect("channel should accept a word");
    f.tick();
    let ch = f.io.channel(u3!(0));
    assert!(!ch.is_connected());
    assert!(ch.flags().contains(ChannelFlags::ERROR));
    assert!(ch.flags().contains(ChannelFlags::END_OF_RECORD));
    assert!(f.io.skip_channel_signal(u3!(0), u12!(0o2)));
    assert!(f.io.skip_channel_signal(u3!(0), u12!(0o1)));
    assert!(!f.io.skip_channel_signal(u3!(0), u12!(0o10)));
}

#[test]
fn test_illegal_operations() {
    let (first, _) = teletype(u3!(0));
    let second = TestDevice::new("printer", u3!(0), u5!(2), Directions::Output);
    let mut f = Fixture::new(vec![first, second]);

    assert_eq!(
        f.connect(u3!(0), 0o043),
        Err(IoFailure::InvalidDevice {
            channel: u3!(0),
            unit: u6!(0o43)
        })
    );
    f.connect(u3!(0), 0o041).expect("connect should succeed");
    assert!(matches!(f.connect(u3!(0), 0o042), Err(IoFailure::Illegal(_))));
    // Connecting device 0 disconnects.
    f.connect(u3!(0), 0o000).expect("disconnect should succeed");
    assert!(!f.io.channel(u3!(0)).is_connected());
    f.connect(u3!(0), 0o042).expect("connect should succeed");

    assert!(matches!(
        f.io.buffer_control(u3!(0), u12!(0)),
        Err(IoFailure::Illegal(_))
    ));
    assert!(matches!(
        f.io.terminate_output(u3!(1)),
        Err(IoFailure::Illegal(_))
    ));
    assert!(matches!(
        f.io.load_output_word(u3!(1), u24!(0)),
        Err(IoFailure::Illegal(_))
    ));
    assert!(matches!(f.io.input_word(u3!(1)), Err(IoFailure::Illegal(_))));
    assert!(matches!(
        f.io.parallel_input(&f.ctx, &f.translator, &mut f.events),
        Err(IoFailure::Illegal(_))
    ));
    assert_eq!(f.pot(0o150, 0), Err(IoFailure::UnboundAlert(u9!(0o150))));
    assert_eq!(f.pot(0o43, 0), Err(IoFailure::UnboundAlert(u9!(0o43))));
    // The failed POT consumed its alert.
    assert_eq!(f.io.pending_alert(), None);
}

#[test]
fn test_device_alerts_and_relocation_registers() {
    let dev = TestDevice::new("clock", u3!(0), u5!(3), Directions::Input)
        .with_alerts(vec![u9!(0o120)]);
    let state = dev.state();
    state.borrow_mut().parallel_input_value = u24!(0o1234);
    let mut f = Fixture::new(vec![dev]);

    f.pot(0o120, 0o77).expect("device POT should succeed");
    assert_eq!(state.borrow().parallel_outputs, vec![(u9!(0o120), u24!(0o77))]);
    f.io.set_alert(u9!(0o120));
    assert_eq!(
        f.io.parallel_input(&f.ctx, &f.translator, &mut f.events),
        Ok(u24!(0o1234))
    );

    f.pot(0o41, 0o10111213).expect("RL2 POT should succeed");
    assert_eq!(f.translator.registers().rl2, u24!(0o10111213));
    f.io.set_alert(u9!(0o41));
    assert_eq!(
        f.io.parallel_input(&f.ctx, &f.translator, &mut f.events),
        Ok(u24!(0o10111213))
    );
}

#[test]
fn test_device_service_is_scheduled() {
    let (dev, state) = teletype(u3!(0));
    {
        let mut state = state.borrow_mut();
        state.service_at = Some(Duration::from_millis(5));
        state.service_level = Some(level(3));
    }
    let mut f = Fixture::new(vec![dev]);
    f.io.schedule_devices(&mut f.events);
    assert_eq!(f.events.next_due(), Some(Duration::from_millis(5)));
    let (source, _) = f
        .events
        .pop_due(Duration::from_millis(5))
        .expect("device event should be due");
    let EventSource::Device(id) = source else {
        panic!("expected a device event, got {source:?}");
    };
    f.io
        .service_device(&f.ctx, id, &mut f.interrupts, &mut f.events);
    assert!(f.interrupts.is_requested(level(3)));
    assert_eq!(state.borrow().serviced, 1);
    assert!(f.events.is_empty());
}
