use dashcan_frame::{encode_frame, MAX_DATA_SIZE};
use serde::Serialize;

use crate::cmd::EncodeArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput {
    id: u32,
    dlc: usize,
    line: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let id = u32::from_str_radix(args.id.trim().trim_start_matches("0x"), 16)
        .map_err(|_| CliError::new(USAGE, format!("invalid identifier: {}", args.id)))?;
    let data = parse_hex_bytes(&args.data)?;
    let line = encode_frame(id, &data, data.len());

    print_record(
        &EncodeOutput {
            id,
            dlc: data.len(),
            line: line.clone(),
        },
        &[
            ("id", format!("{id:X}")),
            ("dlc", data.len().to_string()),
            ("line", line.clone()),
        ],
        &line,
        format,
    );
    Ok(SUCCESS)
}

fn parse_hex_bytes(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("payload must have an even number of hex digits: {input}"),
        ));
    }
    if digits.len() / 2 > MAX_DATA_SIZE {
        return Err(CliError::new(
            USAGE,
            format!("payload longer than {MAX_DATA_SIZE} bytes: {input}"),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spaced_and_packed_bytes() {
        assert_eq!(parse_hex_bytes("340D").unwrap(), vec![0x34, 0x0D]);
        assert_eq!(parse_hex_bytes("34 0d").unwrap(), vec![0x34, 0x0D]);
        assert!(parse_hex_bytes("").unwrap().is_empty());
    }

    #[test]
    fn rejects_odd_long_and_non_hex_payloads() {
        assert_eq!(parse_hex_bytes("340").unwrap_err().code, USAGE);
        assert!(parse_hex_bytes("000000000000000000").is_err());
        assert!(parse_hex_bytes("zz").is_err());
    }
}
