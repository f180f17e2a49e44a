use std::io::BufRead;

use dashcan_session::Dispatcher;
use dashcan_signal::{DecoderConfig, SignalDecoder};
use tracing::debug;

use crate::cmd::{DecodeArgs, LogSink};
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let lines = if args.lines.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| io_error("read stdin", err))?
    } else {
        args.lines
    };

    let config = DecoderConfig::default().with_steering_trigger(args.steering_trigger.into());
    let mut dispatcher = Dispatcher::with_decoder(SignalDecoder::with_config(config), LogSink);

    let mut total = 0usize;
    let mut rejected = 0usize;
    for line in lines.iter().map(|line| line.trim()).filter(|line| !line.is_empty()) {
        total += 1;
        match dispatcher.dispatch_line(line) {
            Ok(Some(event)) => print_event(&event, line, format),
            Ok(None) => debug!(line, "no change"),
            Err(_) => rejected += 1,
        }
    }

    if rejected > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("rejected {rejected} of {total} lines"),
        ));
    }
    Ok(SUCCESS)
}
