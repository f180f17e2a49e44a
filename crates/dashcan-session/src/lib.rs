//! Session management for CAN dashboards.
//!
//! This is the layer applications drive: connect to an adapter endpoint,
//! supervise it with a liveness [`Watchdog`], and feed every polled frame
//! through a [`Dispatcher`] into a telemetry sink.

pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod watchdog;

pub use config::{SessionConfig, DEFAULT_ATTACH_TIMEOUT, DEFAULT_GUARD_TIMEOUT, MIN_SCAN_PERIOD};
pub use connector::{connect, Endpoint};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result, SessionError};
pub use session::{Session, SessionHandle, SessionObserver, Step};
pub use watchdog::{LivenessObserver, Watchdog};
