use dashcan_frame::CanFrame;
use tracing::{debug, trace};

use crate::config::{DecoderConfig, SteeringTrigger};
use crate::error::{Result, SignalError};
use crate::events::{ParkDistanceKind, SteeringInput, TelemetryEvent};
use crate::registry::RuleTable;
use crate::rule::{SignalKind, SignalRule};

/// Steering-wheel pattern of the telephone button.
pub const MFL_PHONE_PATTERN: i64 = 0xC001;

/// Result of running one frame through its rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub id: u32,
    pub kind: SignalKind,
    /// Extracted field before calibration.
    pub raw: u64,
    /// Calibrated value, whether or not it was in range.
    pub value: i64,
    /// The change event, if the value changed and validated.
    pub event: Option<TelemetryEvent>,
}

impl Decoded {
    /// Trace line for the raw extracted field.
    pub fn debug_message(&self) -> String {
        format!("debug {} hex {:X}", self.kind, self.raw)
    }
}

/// Stateful per-identifier decoder.
///
/// Holds the last value of every signal, so it must be driven by a single
/// consumer.
#[derive(Debug, Clone)]
pub struct SignalDecoder {
    table: RuleTable,
    config: DecoderConfig,
}

impl Default for SignalDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalDecoder {
    /// Decoder over the BMW dashboard rule set with default config.
    pub fn new() -> Self {
        Self::with_table(RuleTable::bmw(), DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self::with_table(RuleTable::bmw(), config)
    }

    pub fn with_table(table: RuleTable, config: DecoderConfig) -> Self {
        Self { table, config }
    }

    /// Identifiers this decoder has rules for.
    pub fn ids(&self) -> Vec<u32> {
        self.table.ids()
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Forget all stored values.
    pub fn reset(&mut self) {
        self.table.reset();
    }

    /// Decode one frame.
    ///
    /// The stored value of the rule is replaced whenever the decoded value
    /// differs from it, even if range validation then suppresses the event.
    pub fn decode(&mut self, frame: &CanFrame) -> Result<Decoded> {
        let trigger = self.config.steering_trigger;
        let rule = self
            .table
            .get_mut(frame.id)
            .ok_or(SignalError::UnmappedIdentifier(frame.id))?;

        let actual = frame.payload().len();
        if actual != rule.len {
            return Err(SignalError::LengthMismatch {
                signal: rule.kind,
                expected: rule.len,
                actual,
            });
        }

        let word = frame.payload_word();
        let raw = rule.extract(word);
        let value = rule.calibrate(raw);
        trace!(id = frame.id, signal = %rule.kind, raw, value, "decoded signal");

        let event = apply_change(rule, value, word, trigger);
        Ok(Decoded {
            id: frame.id,
            kind: rule.kind,
            raw,
            value,
            event,
        })
    }
}

fn apply_change(
    rule: &mut SignalRule,
    value: i64,
    word: u64,
    trigger: SteeringTrigger,
) -> Option<TelemetryEvent> {
    let old = rule.last;
    if value == old {
        return None;
    }
    rule.last = value;

    // Calibrated values come from 8- and 16-bit fields.
    let (old32, new32) = (old as i32, value as i32);
    match rule.kind {
        SignalKind::EngineRpm => rule
            .in_range(value)
            .then_some(TelemetryEvent::RpmChanged { old: old32, new: new32 }),
        SignalKind::VehicleSpeed => rule
            .in_range(value)
            .then_some(TelemetryEvent::SpeedChanged { old: old32, new: new32 }),
        SignalKind::EngineTemperature => rule
            .in_range(value)
            .then_some(TelemetryEvent::TemperatureChanged { old: old32, new: new32 }),
        SignalKind::ParkDistance => Some(TelemetryEvent::ParkDistanceChanged {
            kind: ParkDistanceKind::Standard,
            sensors: [
                (word >> 56) as u8,
                (word >> 48) as u8,
                (word >> 40) as u8,
                (word >> 32) as u8,
            ],
        }),
        SignalKind::SteeringWheel => {
            let pressed = match trigger {
                SteeringTrigger::OnEntry => value == MFL_PHONE_PATTERN,
                SteeringTrigger::OnExit => old == MFL_PHONE_PATTERN,
            };
            if pressed {
                Some(TelemetryEvent::SteeringInputTriggered {
                    kind: SteeringInput::Phone,
                })
            } else {
                debug!(old, new = value, "mfl input skipped");
                None
            }
        }
    }
}
