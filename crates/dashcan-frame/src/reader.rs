use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use dashcan_transport::DeviceStream;

use crate::error::{FrameError, Result};

/// Longest response line accepted by default: id, separator, 16 digits and
/// generous slack for adapter noise.
pub const DEFAULT_MAX_LINE_LEN: usize = 64;

const READ_CHUNK_SIZE: usize = 256;

/// Read timeout applied to device links. Bounds how long one readiness
/// check can wait when the device has nothing to say.
pub const DEVICE_READ_TIMEOUT: Duration = Duration::from_millis(5);

/// Reads newline-terminated response lines from a device without blocking.
///
/// The inner stream is expected to be non-blocking (or to have a short read
/// timeout): a read that reports `WouldBlock` or `TimedOut` means "nothing
/// ready yet", not an error. Partial lines stay buffered across calls.
pub struct LineReader<T> {
    inner: T,
    buf: BytesMut,
    max_line_len: usize,
}

impl<T: Read> LineReader<T> {
    /// Create a new line reader with the default line limit.
    pub fn new(inner: T) -> Self {
        Self::with_max_line_len(inner, DEFAULT_MAX_LINE_LEN)
    }

    /// Create a new line reader with an explicit line limit.
    pub fn with_max_line_len(inner: T, max_line_len: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max_line_len,
        }
    }

    /// Check whether a complete line can be taken without blocking.
    ///
    /// Pulls whatever bytes the device has ready into the buffer first.
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn line_ready(&mut self) -> Result<bool> {
        loop {
            if self.buf.contains(&b'\n') {
                return Ok(true);
            }
            if self.buf.len() > self.max_line_len {
                let size = self.buf.len();
                self.buf.clear();
                return Err(FrameError::LineTooLong {
                    size,
                    max: self.max_line_len,
                });
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(false)
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Take the next complete line if one is ready.
    ///
    /// The line terminator and any `\r` are stripped.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        if !self.line_ready()? {
            return Ok(None);
        }
        let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let raw = self.buf.split_to(pos);
        self.buf.advance(1);
        if raw.len() > self.max_line_len {
            return Err(FrameError::LineTooLong {
                size: raw.len(),
                max: self.max_line_len,
            });
        }
        let line = String::from_utf8_lossy(&raw);
        Ok(Some(line.trim_end_matches('\r').to_string()))
    }

    /// Bytes buffered but not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl LineReader<DeviceStream> {
    /// Create a line reader for a device link using a short read timeout.
    ///
    /// The link is left in blocking mode, since the writer shares the socket.
    pub fn for_device(inner: DeviceStream, max_line_len: usize) -> Result<Self> {
        inner
            .set_read_timeout(Some(DEVICE_READ_TIMEOUT))
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_max_line_len(inner, max_line_len))
    }
}

pub(crate) fn transport_to_frame_error(err: dashcan_transport::TransportError) -> FrameError {
    match err {
        dashcan_transport::TransportError::Io(io) => FrameError::Io(io),
        dashcan_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        dashcan_transport::TransportError::Shutdown => FrameError::ConnectionClosed,
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
