use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use dashcan_transport::{connect_tcp, DeviceStream, FakeDevice, TransportError, FAKE_DEVICE_NAME};

/// Where to reach a CAN adapter.
///
/// Textual forms: `tcp:<host[:port]>`, `unix:<path>` and `fake`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
    Fake,
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("fake") {
            return Ok(Endpoint::Fake);
        }
        match text.split_once(':') {
            Some(("tcp", address)) if !address.is_empty() => Ok(Endpoint::Tcp(address.to_string())),
            Some(("unix", path)) if !path.is_empty() => Ok(Endpoint::Unix(PathBuf::from(path))),
            _ => Err(TransportError::Unsupported(format!(
                "unrecognized endpoint {text:?} (expected tcp:<host[:port]>, unix:<path> or fake)"
            ))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(address) => write!(f, "tcp:{address}"),
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Fake => f.write_str("fake"),
        }
    }
}

/// Open a device link and return it with the adapter's label.
pub fn connect(endpoint: &Endpoint) -> dashcan_transport::Result<(DeviceStream, String)> {
    match endpoint {
        Endpoint::Tcp(address) => Ok((connect_tcp(address)?, endpoint.to_string())),
        #[cfg(unix)]
        Endpoint::Unix(path) => Ok((dashcan_transport::connect_unix(path)?, endpoint.to_string())),
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(TransportError::Unsupported(
            "unix domain sockets are not available on this platform".to_string(),
        )),
        Endpoint::Fake => Ok((
            DeviceStream::from_fake(FakeDevice::new()),
            FAKE_DEVICE_NAME.to_string(),
        )),
    }
}
