use serde::Serialize;
use tracing::debug;

/// Sensor group reported by a park-distance frame.
///
/// Adapters seen so far only report one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParkDistanceKind {
    #[default]
    Standard,
}

/// Steering-wheel button recognised by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringInput {
    /// The telephone button (pattern `0xC001`).
    Phone,
}

/// A validated change of one vehicle signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    RpmChanged { old: i32, new: i32 },
    SpeedChanged { old: i32, new: i32 },
    TemperatureChanged { old: i32, new: i32 },
    ParkDistanceChanged {
        kind: ParkDistanceKind,
        sensors: [u8; 4],
    },
    SteeringInputTriggered { kind: SteeringInput },
}

impl TelemetryEvent {
    /// Short name used in logs and table output.
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::RpmChanged { .. } => "rpm",
            TelemetryEvent::SpeedChanged { .. } => "speed",
            TelemetryEvent::TemperatureChanged { .. } => "temperature",
            TelemetryEvent::ParkDistanceChanged { .. } => "park_distance",
            TelemetryEvent::SteeringInputTriggered { .. } => "steering_input",
        }
    }

    /// Hand this event to the matching sink callback.
    pub fn deliver<S: TelemetrySink + ?Sized>(&self, sink: &mut S) {
        match *self {
            TelemetryEvent::RpmChanged { old, new } => sink.on_rpm_changed(old, new),
            TelemetryEvent::SpeedChanged { old, new } => sink.on_speed_changed(old, new),
            TelemetryEvent::TemperatureChanged { old, new } => {
                sink.on_temperature_changed(old, new)
            }
            TelemetryEvent::ParkDistanceChanged { kind, sensors } => {
                sink.on_park_distance_changed(kind, sensors)
            }
            TelemetryEvent::SteeringInputTriggered { kind } => {
                sink.on_steering_input_triggered(kind)
            }
        }
    }
}

/// Receiver of decoded telemetry.
///
/// Every callback has a no-op default so sinks implement only what they
/// display.
pub trait TelemetrySink {
    fn on_rpm_changed(&mut self, _old: i32, _new: i32) {}

    fn on_speed_changed(&mut self, _old: i32, _new: i32) {}

    fn on_temperature_changed(&mut self, _old: i32, _new: i32) {}

    fn on_park_distance_changed(&mut self, _kind: ParkDistanceKind, _sensors: [u8; 4]) {}

    fn on_steering_input_triggered(&mut self, _kind: SteeringInput) {}

    fn on_debug(&mut self, msg: &str) {
        debug!(target: "dashcan::telemetry", "{msg}");
    }

    fn on_error(&mut self, _msg: &str) {}
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for &mut S {
    fn on_rpm_changed(&mut self, old: i32, new: i32) {
        (**self).on_rpm_changed(old, new)
    }

    fn on_speed_changed(&mut self, old: i32, new: i32) {
        (**self).on_speed_changed(old, new)
    }

    fn on_temperature_changed(&mut self, old: i32, new: i32) {
        (**self).on_temperature_changed(old, new)
    }

    fn on_park_distance_changed(&mut self, kind: ParkDistanceKind, sensors: [u8; 4]) {
        (**self).on_park_distance_changed(kind, sensors)
    }

    fn on_steering_input_triggered(&mut self, kind: SteeringInput) {
        (**self).on_steering_input_triggered(kind)
    }

    fn on_debug(&mut self, msg: &str) {
        (**self).on_debug(msg)
    }

    fn on_error(&mut self, msg: &str) {
        (**self).on_error(msg)
    }
}

/// Sink that records everything it receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    pub events: Vec<TelemetryEvent>,
    pub debug: Vec<String>,
    pub errors: Vec<String>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded events, leaving the log empty.
    pub fn drain_events(&mut self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut self.events)
    }
}

impl TelemetrySink for EventLog {
    fn on_rpm_changed(&mut self, old: i32, new: i32) {
        self.events.push(TelemetryEvent::RpmChanged { old, new });
    }

    fn on_speed_changed(&mut self, old: i32, new: i32) {
        self.events.push(TelemetryEvent::SpeedChanged { old, new });
    }

    fn on_temperature_changed(&mut self, old: i32, new: i32) {
        self.events
            .push(TelemetryEvent::TemperatureChanged { old, new });
    }

    fn on_park_distance_changed(&mut self, kind: ParkDistanceKind, sensors: [u8; 4]) {
        self.events
            .push(TelemetryEvent::ParkDistanceChanged { kind, sensors });
    }

    fn on_steering_input_triggered(&mut self, kind: SteeringInput) {
        self.events
            .push(TelemetryEvent::SteeringInputTriggered { kind });
    }

    fn on_debug(&mut self, msg: &str) {
        self.debug.push(msg.to_string());
    }

    fn on_error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_routes_to_matching_callback() {
        let mut log = EventLog::new();
        let events = [
            TelemetryEvent::RpmChanged { old: -1, new: 845 },
            TelemetryEvent::ParkDistanceChanged {
                kind: ParkDistanceKind::Standard,
                sensors: [0x8D, 0x72, 0x5B, 0x5A],
            },
            TelemetryEvent::SteeringInputTriggered {
                kind: SteeringInput::Phone,
            },
        ];
        for event in &events {
            event.deliver(&mut log);
        }
        assert_eq!(log.drain_events(), events.to_vec());
        assert!(log.events.is_empty());
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(TelemetryEvent::SpeedChanged { old: -1, new: 105 }).unwrap();
        assert_eq!(json["event"], "speed_changed");
        assert_eq!(json["old"], -1);
        assert_eq!(json["new"], 105);

        let json = serde_json::to_value(TelemetryEvent::SteeringInputTriggered {
            kind: SteeringInput::Phone,
        })
        .unwrap();
        assert_eq!(json["kind"], "phone");
    }

    #[test]
    fn default_sink_ignores_events() {
        struct Quiet;
        impl TelemetrySink for Quiet {}

        let mut sink = Quiet;
        TelemetryEvent::RpmChanged { old: 1, new: 2 }.deliver(&mut sink);
        sink.on_error("ignored");
    }
}
