//! Byte source/sink boundary for CAN adapters.
//!
//! The acquisition pipeline only needs two capabilities from a device:
//! write a poll command, and read whatever response lines are ready.
//! [`DeviceStream`] provides both over:
//! - TCP sockets (Wi-Fi adapters)
//! - Unix domain sockets (serial bridges, local simulators)
//! - an in-memory [`FakeDevice`] that answers polls with canned traffic
//!
//! Discovery, pairing and link setup live outside this crate; it starts
//! from an already reachable endpoint.

pub mod error;
pub mod fake;
pub mod socket;
pub mod traits;

pub use error::{Result, TransportError};
pub use fake::{FakeDevice, FAKE_DEVICE_NAME};
pub use socket::{connect_tcp, DEFAULT_DEVICE_PORT};
#[cfg(unix)]
pub use socket::connect_unix;
pub use traits::DeviceStream;
