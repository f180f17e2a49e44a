//! CAN bus telemetry for car dashboards.
//!
//! dashcan polls a CAN adapter for frames in a line-oriented hex format,
//! decodes them into vehicle signals (RPM, speed, coolant temperature,
//! park distance, steering-wheel buttons) and hands changes to a sink.
//!
//! # Crate Structure
//!
//! - [`transport`]: Device links (TCP, Unix sockets, fake device)
//! - [`frame`]: Wire codec and the polling hand-off channel
//! - [`signal`]: Per-identifier signal decoding
//! - [`session`]: Watchdog, dispatcher and session loop (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use dashcan_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dashcan_frame::*;
}

/// Re-export signal types.
pub mod signal {
    pub use dashcan_signal::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use dashcan_session::*;
}
