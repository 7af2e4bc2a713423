mod clock;
mod listing;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use cpu::io::DispatchRegistry;
use cpu::{
    AlarmKind, Clock, EngineConfiguration, MemoryConfiguration, MemorySize, PanicOnUnmaskedAlarm,
    ProcessorMode, RtcConfiguration, Sds940, StopReason,
};

use clock::PacedClock;
use listing::parse_listing;

fn parse_octal_address(s: &str) -> Result<Address, String> {
    let n = u32::from_str_radix(s, 8).map_err(|e| format!("'{s}' is not an octal number: {e}"))?;
    Address::try_from(n).map_err(|_| format!("{s} is not a 14-bit address"))
}

fn parse_mode(s: &str) -> Result<ProcessorMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "normal" => Ok(ProcessorMode::Normal),
        "monitor" => Ok(ProcessorMode::Monitor),
        "user" => Ok(ProcessorMode::User),
        _ => Err(format!("unknown processor mode '{s}'")),
    }
}

fn parse_memory_size(s: &str) -> Result<MemorySize, String> {
    let k: u32 = s.parse().map_err(|e| format!("'{s}': {e}"))?;
    MemorySize::from_kilowords(k).map_err(|e| e.to_string())
}

fn parse_alarm_kind(s: &str) -> Result<AlarmKind, String> {
    AlarmKind::try_from(s).map_err(|e| e.to_string())
}

/// 'MAX' means as fast as possible.
fn parse_speed(s: &str) -> Result<SpeedMultiplier, String> {
    if s.eq_ignore_ascii_case("max") {
        Ok(SpeedMultiplier(None))
    } else {
        match s.parse::<f64>() {
            Ok(x) if x > 0.0 => Ok(SpeedMultiplier(Some(x))),
            Ok(_) => Err("the speed multiplier must be positive".to_string()),
            Err(e) => Err(format!("'{s}': {e}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SpeedMultiplier(Option<f64>);

/// Simulate the SDS 940.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Octal core listing ("address word" per line) to deposit
    /// before starting.
    listing: Option<PathBuf>,

    /// Octal address at which to start.
    #[arg(long, default_value = "100", value_parser = parse_octal_address)]
    start: Address,

    /// Processor mode after reset: normal, monitor or user.
    #[arg(long, default_value = "normal", value_parser = parse_mode)]
    mode: ProcessorMode,

    /// Physical memory size in thousands of words (16, 32 or 64).
    #[arg(long, default_value = "64", value_parser = parse_memory_size)]
    memory: MemorySize,

    /// Stop after this many steps.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Run this many times faster than real time ('MAX' for as fast
    /// as possible).
    #[arg(long, default_value = "MAX", value_parser = parse_speed)]
    speed_multiplier: SpeedMultiplier,

    /// Disable the real-time clock.
    #[arg(long)]
    no_rtc: bool,

    /// Carry on after alarms of this kind (may be repeated).
    #[arg(long = "mask", value_parser = parse_alarm_kind)]
    masked_alarms: Vec<AlarmKind>,

    /// Panic when an unmasked alarm occurs (useful under a debugger).
    #[arg(long)]
    panic_on_alarm: bool,
}

fn run_simulator(args: &Args) -> Result<i32, Box<dyn Error>> {
    let mut machine = Sds940::new(
        if args.panic_on_alarm {
            PanicOnUnmaskedAlarm::Yes
        } else {
            PanicOnUnmaskedAlarm::No
        },
        EngineConfiguration {
            reset_mode: args.mode,
            ..EngineConfiguration::default()
        },
        &MemoryConfiguration { size: args.memory },
        RtcConfiguration {
            enabled: !args.no_rtc,
            ..RtcConfiguration::default()
        },
        DispatchRegistry::empty(),
    );
    for kind in &args.masked_alarms {
        machine.set_alarm_masked(*kind, true)?;
        event!(Level::INFO, "{kind} alarms are masked");
    }

    if let Some(path) = &args.listing {
        let text = fs::read_to_string(path)?;
        let words = parse_listing(&text)?;
        event!(
            Level::INFO,
            "depositing {} words from {}",
            words.len(),
            path.display()
        );
        for (addr, value) in words {
            machine.deposit(addr, value);
        }
    }

    let mut clk = PacedClock::new(args.speed_multiplier.0, Duration::from_millis(5));
    machine.start_at(args.start);
    let result = machine.run_until_stop(&mut clk, args.max_steps);
    let regs = machine.control().registers();
    event!(
        Level::INFO,
        "A={:08o} B={:08o} X={:08o} P={:05o} OV={} mode={}",
        regs.a,
        regs.b,
        regs.x,
        regs.p,
        u8::from(regs.ov),
        machine.control().mode()
    );
    match result {
        Ok(StopReason::Halted) => {
            event!(Level::INFO, "halted after {:?} of simulated time", clk.now());
            Ok(0)
        }
        Ok(StopReason::StepLimit) => {
            event!(Level::INFO, "step limit reached");
            Ok(0)
        }
        Err(unmasked) => {
            event!(Level::ERROR, "execution stopped: {}", unmasked);
            Ok(1)
        }
    }
}

fn main() {
    let args = Args::parse();

    // Set RUST_LOG to choose which trace messages get printed; see
    // the tracing_subscriber::EnvFilter documentation.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = match tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
    {
        Ok(layer) => layer,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match run_simulator(&args) {
        Ok(status) => std::process::exit(status),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
