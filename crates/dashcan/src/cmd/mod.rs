use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use dashcan_signal::{SteeringTrigger, TelemetrySink};
use tracing::warn;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod clock;
pub mod decode;
pub mod encode;
pub mod monitor;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Attach to an adapter and print telemetry events.
    Monitor(MonitorArgs),
    /// Decode wire lines from arguments or stdin.
    Decode(DecodeArgs),
    /// Format a packed adapter timestamp as a clock.
    Clock(ClockArgs),
    /// Render a frame in the wire line format.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Clock(args) => clock::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Steering-wheel button policy.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum TriggerArg {
    /// Fire when the button pattern arrives.
    #[default]
    OnEntry,
    /// Fire when the button pattern is left.
    OnExit,
}

impl From<TriggerArg> for SteeringTrigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::OnEntry => SteeringTrigger::OnEntry,
            TriggerArg::OnExit => SteeringTrigger::OnExit,
        }
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Adapter endpoint: tcp:<host[:port]>, unix:<path> or fake.
    #[arg(env = "DASHCAN_ENDPOINT", default_value = "fake")]
    pub endpoint: String,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Fail when the adapter sends nothing for this long.
    #[arg(long, env = "DASHCAN_GUARD_TIMEOUT", default_value = "3s")]
    pub guard_timeout: String,
    /// Give up when the adapter does not answer within this long.
    #[arg(long, default_value = "10s")]
    pub attach_timeout: String,
    /// Idle time between poll cycles.
    #[arg(long, default_value = "100ms")]
    pub poll_interval: String,
    /// When a steering-wheel button counts as pressed.
    #[arg(long, value_enum, default_value_t = TriggerArg::OnEntry)]
    pub steering_trigger: TriggerArg,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Wire lines (`<ID>,<PAYLOAD>`). Read from stdin when omitted.
    pub lines: Vec<String>,
    /// When a steering-wheel button counts as pressed.
    #[arg(long, value_enum, default_value_t = TriggerArg::OnEntry)]
    pub steering_trigger: TriggerArg,
}

#[derive(Args, Debug)]
pub struct ClockArgs {
    /// Packed timestamp, decimal or 0x-prefixed hex.
    pub timestamp: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Identifier in hex.
    pub id: String,
    /// Payload bytes in hex, e.g. 340D or "34 0D".
    #[arg(default_value = "")]
    pub data: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Sink for dispatcher side channels; events are printed by the caller
/// from the dispatch result.
pub(crate) struct LogSink;

impl TelemetrySink for LogSink {
    fn on_error(&mut self, msg: &str) {
        warn!("{msg}");
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
