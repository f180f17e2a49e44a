use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dashcan_signal::{SteeringInput, TelemetryEvent};
use serde::Serialize;
use serde_json::Value;

pub const EVENT_SCHEMA_ID: &str =
    "https://schemas.sygmi.dev/dashcan/cli/v1/telemetry-event.schema.json";

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One telemetry event as a JSON object: the event fields plus where it
/// came from.
pub fn event_json(event: &TelemetryEvent, source: &str) -> Value {
    let mut value = serde_json::to_value(event).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("schema_id".to_string(), Value::from(EVENT_SCHEMA_ID));
        map.insert("source".to_string(), Value::from(source));
        map.insert("timestamp".to_string(), Value::from(now_unix_seconds()));
    }
    value
}

pub fn print_event(event: &TelemetryEvent, source: &str, format: OutputFormat) {
    let (old, new) = event_values(event);
    match format {
        OutputFormat::Json => println!("{}", event_json(event, source)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "OLD", "NEW", "SOURCE"])
                .add_row(vec![event.name().to_string(), old, new, source.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}: {old} -> {new} ({source})", event.name()),
        OutputFormat::Raw => print_raw(format!("{}\t{new}\n", event.name()).as_bytes()),
    }
}

/// Print a flat record: serialized as-is for JSON, field rows otherwise.
pub fn print_record<T: Serialize>(
    record: &T,
    rows: &[(&str, String)],
    raw: &str,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in rows {
                table.add_row(vec![field.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = rows
                .iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
        OutputFormat::Raw => print_raw(format!("{raw}\n").as_bytes()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn event_values(event: &TelemetryEvent) -> (String, String) {
    match event {
        TelemetryEvent::RpmChanged { old, new }
        | TelemetryEvent::SpeedChanged { old, new }
        | TelemetryEvent::TemperatureChanged { old, new } => (old.to_string(), new.to_string()),
        TelemetryEvent::ParkDistanceChanged { sensors, .. } => (
            "-".to_string(),
            sensors
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        TelemetryEvent::SteeringInputTriggered { kind } => {
            let name = match kind {
                SteeringInput::Phone => "phone",
            };
            ("-".to_string(), name.to_string())
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use dashcan_signal::ParkDistanceKind;

    use super::*;

    #[test]
    fn event_json_keeps_tag_and_fields() {
        let value = event_json(&TelemetryEvent::RpmChanged { old: -1, new: 845 }, "FAKEDEVICE");
        assert_eq!(value["event"], "rpm_changed");
        assert_eq!(value["old"], -1);
        assert_eq!(value["new"], 845);
        assert_eq!(value["source"], "FAKEDEVICE");
        assert_eq!(value["schema_id"], EVENT_SCHEMA_ID);
    }

    #[test]
    fn park_distance_values_are_hex_bytes() {
        let event = TelemetryEvent::ParkDistanceChanged {
            kind: ParkDistanceKind::Standard,
            sensors: [0x8D, 0x72, 0x5B, 0x5A],
        };
        assert_eq!(event_values(&event).1, "8D 72 5B 5A");
    }
}
