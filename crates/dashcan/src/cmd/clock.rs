use dashcan_frame::timestamp_to_clock;
use serde::Serialize;

use crate::cmd::ClockArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct ClockOutput {
    timestamp: u32,
    clock: String,
}

pub fn run(args: ClockArgs, format: OutputFormat) -> CliResult<i32> {
    let timestamp = parse_timestamp(&args.timestamp)?;
    let clock = timestamp_to_clock(timestamp);

    print_record(
        &ClockOutput {
            timestamp,
            clock: clock.clone(),
        },
        &[
            ("timestamp", format!("0x{timestamp:08X}")),
            ("clock", clock.clone()),
        ],
        &clock,
        format,
    );
    Ok(SUCCESS)
}

fn parse_timestamp(input: &str) -> CliResult<u32> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("invalid timestamp: {input}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_decimal_and_hex() {
        assert_eq!(parse_timestamp("0x034B2C7B").unwrap(), 0x034B_2C7B);
        assert_eq!(parse_timestamp("1024").unwrap(), 1024);
        assert_eq!(parse_timestamp("0x").unwrap_err().code, USAGE);
        assert!(parse_timestamp("-5").is_err());
    }
}
