mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "dashcan", version, about = "CAN bus dashboard telemetry CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level for dashcan (stderr). `DASHCAN_LOG` adds per-target directives.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::TriggerArg;

    #[test]
    fn parses_monitor_subcommand() {
        let cli = Cli::try_parse_from([
            "dashcan",
            "monitor",
            "tcp:192.168.0.10:8888",
            "--count",
            "5",
            "--steering-trigger",
            "on-exit",
        ])
        .expect("monitor args should parse");

        match cli.command {
            Command::Monitor(args) => {
                assert_eq!(args.endpoint, "tcp:192.168.0.10:8888");
                assert_eq!(args.count, Some(5));
                assert!(matches!(args.steering_trigger, TriggerArg::OnExit));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_decode_lines() {
        let cli = Cli::try_parse_from([
            "dashcan",
            "--format",
            "json",
            "decode",
            "AA,00000000340D0000",
            "1D6,C001",
        ])
        .expect("decode args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        match cli.command {
            Command::Decode(args) => assert_eq!(args.lines.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_trigger() {
        let err = Cli::try_parse_from(["dashcan", "decode", "--steering-trigger", "sometimes"])
            .expect_err("unknown trigger should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn parses_encode_without_payload() {
        let cli = Cli::try_parse_from(["dashcan", "encode", "1D6"]).expect("encode should parse");
        match cli.command {
            Command::Encode(args) => assert!(args.data.is_empty()),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
