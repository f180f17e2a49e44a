use dashcan_frame::{decode_line, CanFrame};
use dashcan_signal::{SignalDecoder, TelemetryEvent, TelemetrySink};
use tracing::debug;

use crate::error::DispatchError;

/// Runs wire lines or frames through the decoder into a telemetry sink.
///
/// Failures are reported to the sink's error channel and also returned, so
/// callers can count or escalate them.
#[derive(Debug)]
pub struct Dispatcher<S> {
    decoder: SignalDecoder,
    sink: S,
}

impl<S: TelemetrySink> Dispatcher<S> {
    /// Dispatcher over the default BMW rule set.
    pub fn new(sink: S) -> Self {
        Self::with_decoder(SignalDecoder::new(), sink)
    }

    pub fn with_decoder(decoder: SignalDecoder, sink: S) -> Self {
        Self { decoder, sink }
    }

    /// Decode one wire line and dispatch the frame.
    pub fn dispatch_line(&mut self, line: &str) -> Result<Option<TelemetryEvent>, DispatchError> {
        let frame = match decode_line(line) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "rejecting wire line");
                self.sink
                    .on_error(&format!("error when parsing hex: {}", line.trim()));
                return Err(err.into());
            }
        };
        self.dispatch_frame(&frame)
    }

    /// Dispatch an already decoded frame.
    pub fn dispatch_frame(
        &mut self,
        frame: &CanFrame,
    ) -> Result<Option<TelemetryEvent>, DispatchError> {
        let decoded = match self.decoder.decode(frame) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.sink.on_error(&err.to_string());
                return Err(err.into());
            }
        };

        self.sink.on_debug(&decoded.debug_message());
        if let Some(event) = &decoded.event {
            event.deliver(&mut self.sink);
        }
        Ok(decoded.event)
    }

    /// Identifiers the decoder has rules for.
    pub fn ids(&self) -> Vec<u32> {
        self.decoder.ids()
    }

    pub fn decoder(&self) -> &SignalDecoder {
        &self.decoder
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use dashcan_signal::{EventLog, SignalError, SteeringInput};

    use super::*;

    #[test]
    fn events_reach_sink() {
        let mut dispatcher = Dispatcher::new(EventLog::new());
        let event = dispatcher.dispatch_line("AA,00000000340D0000").unwrap();
        assert_eq!(event, Some(TelemetryEvent::RpmChanged { old: -1, new: 845 }));

        dispatcher.dispatch_line("1D6,C001").unwrap();

        let log = dispatcher.into_sink();
        assert_eq!(
            log.events,
            vec![
                TelemetryEvent::RpmChanged { old: -1, new: 845 },
                TelemetryEvent::SteeringInputTriggered {
                    kind: SteeringInput::Phone
                },
            ]
        );
        assert_eq!(log.debug, vec!["debug rpm hex 340D", "debug mfl hex C001"]);
        assert!(log.errors.is_empty());
    }

    #[test]
    fn malformed_line_is_reported_and_returned() {
        let mut dispatcher = Dispatcher::new(EventLog::new());
        let err = dispatcher.dispatch_line("nonsense").unwrap_err();
        assert!(matches!(err, DispatchError::Frame(_)));
        assert_eq!(dispatcher.sink().errors, vec!["error when parsing hex: nonsense"]);
    }

    #[test]
    fn unmapped_and_short_frames_are_reported() {
        let mut dispatcher = Dispatcher::new(EventLog::new());

        let err = dispatcher.dispatch_line("7FF,01").unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Signal(SignalError::UnmappedIdentifier(0x7FF))
        ));

        let err = dispatcher
            .dispatch_frame(&CanFrame::new(0x1D0, &[0x8B]))
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Signal(SignalError::LengthMismatch { .. })
        ));

        let sink = dispatcher.sink();
        assert_eq!(sink.errors.len(), 2);
        assert_eq!(sink.errors[0], "id not mapped 7FF");
        assert!(sink.debug.is_empty());
        assert!(sink.events.is_empty());
    }

    #[test]
    fn borrowed_sink_is_accepted() {
        let mut log = EventLog::new();
        {
            let mut dispatcher = Dispatcher::new(&mut log);
            dispatcher.dispatch_line("1D0,8B00000000000000").unwrap();
        }
        assert_eq!(
            log.events,
            vec![TelemetryEvent::TemperatureChanged { old: -1, new: 91 }]
        );
    }
}
