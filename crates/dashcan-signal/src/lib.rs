//! Vehicle signal decoding for polled CAN frames.
//!
//! A [`SignalDecoder`] looks each frame up by identifier in a [`RuleTable`],
//! extracts and calibrates the raw field, and emits a [`TelemetryEvent`] only
//! when the value changed and lies inside the signal's valid range.
//!
//! Rules are plain data; there is no per-signal trait object.

pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod registry;
pub mod rule;

pub use config::{DecoderConfig, SteeringTrigger};
pub use decoder::{Decoded, SignalDecoder, MFL_PHONE_PATTERN};
pub use error::{Result, SignalError};
pub use events::{EventLog, ParkDistanceKind, SteeringInput, TelemetryEvent, TelemetrySink};
pub use registry::RuleTable;
pub use rule::{
    SignalKind, SignalRule, ENGINE_RPM_ID, ENGINE_TEMPERATURE_ID, PARK_DISTANCE_ID, STEERING_WHEEL_ID,
    VEHICLE_SPEED_ID,
};
