use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::Result;
use crate::fake::FakeDevice;

/// A connected CAN adapter link implementing Read + Write.
///
/// This is the only I/O type the acquisition pipeline consumes. Reads carry
/// response lines from the adapter, writes carry poll commands to it.
pub struct DeviceStream {
    inner: DeviceStreamInner,
}

enum DeviceStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Fake(FakeDevice),
}

impl Read for DeviceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.read(buf),
            DeviceStreamInner::Fake(device) => device.read(buf),
        }
    }
}

impl Write for DeviceStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.write(buf),
            DeviceStreamInner::Fake(device) => device.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.flush(),
            DeviceStreamInner::Fake(device) => device.flush(),
        }
    }
}

impl DeviceStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: DeviceStreamInner::Tcp(stream),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: DeviceStreamInner::Unix(stream),
        }
    }

    /// Wrap an in-memory fake device.
    pub fn from_fake(device: FakeDevice) -> Self {
        Self {
            inner: DeviceStreamInner::Fake(device),
        }
    }

    /// Switch the stream to non-blocking mode.
    ///
    /// The poller relies on reads reporting `WouldBlock` when no response is
    /// pending. The fake device is always non-blocking.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => {
                stream.set_nonblocking(nonblocking).map_err(Into::into)
            }
            DeviceStreamInner::Fake(_) => Ok(()),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            DeviceStreamInner::Fake(_) => Ok(()),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
            DeviceStreamInner::Fake(_) => Ok(()),
        }
    }

    /// Try to clone this stream so reads and writes can be owned separately.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            DeviceStreamInner::Fake(device) => Ok(Self::from_fake(device.clone())),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            DeviceStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            DeviceStreamInner::Unix(_) => "unix-domain-socket",
            DeviceStreamInner::Fake(_) => "fake",
        }
    }

    /// Close both directions of the link.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .map_err(Into::into),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .map_err(Into::into),
            DeviceStreamInner::Fake(device) => {
                device.disconnect();
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
