use std::io::{self, ErrorKind, Write};
use std::time::{Duration, Instant};

use dashcan_transport::DeviceStream;

use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Pause between attempts while the stream cannot take more bytes.
const STALL_BACKOFF: Duration = Duration::from_millis(1);

/// Writes firmware commands to any `Write` stream.
///
/// A stream that keeps reporting `WouldBlock` or `TimedOut` is stalled. With a
/// stall timeout set, a command that makes no progress for that long fails
/// with `FrameError::Io(TimedOut)`.
pub struct CommandWriter<T> {
    inner: T,
    stall_timeout: Option<Duration>,
}

impl<T: Write> CommandWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            stall_timeout: None,
        }
    }

    /// Bound how long a single command may stall. `None` waits indefinitely.
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Write a complete command and flush it (blocking).
    ///
    /// Interrupted writes are retried. Stalled writes are retried until the
    /// stall timeout runs out.
    pub fn send_command(&mut self, command: &[u8]) -> Result<()> {
        self.send_command_until(command, || false)
    }

    /// Like [`send_command`](Self::send_command), but gives up with
    /// `FrameError::Io(Interrupted)` once `abort` returns true.
    ///
    /// `abort` is only consulted while the stream is stalled.
    pub fn send_command_until(
        &mut self,
        command: &[u8],
        abort: impl Fn() -> bool,
    ) -> Result<()> {
        let mut stall = Stall::new(self.stall_timeout);
        let mut offset = 0usize;
        while offset < command.len() {
            match self.inner.write(&command[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    offset += n;
                    stall.progress();
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stalled(&err) => stall.wait(&abort)?,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stalled(&err) => stall.wait(&abort)?,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        let stall = Stall::new(self.stall_timeout);
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stalled(&err) => stall.wait(&|| false)?,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl CommandWriter<DeviceStream> {
    /// Create a blocking command writer for a device link.
    ///
    /// `write_timeout` is applied to the socket and also bounds how long one
    /// command may stall.
    pub fn for_device(inner: DeviceStream, write_timeout: Option<Duration>) -> Result<Self> {
        inner
            .set_nonblocking(false)
            .map_err(transport_to_frame_error)?;
        inner
            .set_write_timeout(write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::new(inner).with_stall_timeout(write_timeout))
    }
}

fn is_stalled(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Tracks how long a write has gone without progress.
struct Stall {
    timeout: Option<Duration>,
    since: Instant,
}

impl Stall {
    fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            since: Instant::now(),
        }
    }

    fn progress(&mut self) {
        self.since = Instant::now();
    }

    fn wait(&self, abort: &dyn Fn() -> bool) -> Result<()> {
        if abort() {
            return Err(FrameError::Io(io::Error::new(
                ErrorKind::Interrupted,
                "command write abandoned",
            )));
        }
        if let Some(timeout) = self.timeout {
            if self.since.elapsed() >= timeout {
                return Err(FrameError::Io(io::Error::new(
                    ErrorKind::TimedOut,
                    format!("device accepted no bytes for {timeout:?}"),
                )));
            }
        }
        std::thread::sleep(STALL_BACKOFF);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dashcan_transport::FakeDevice;

    use super::*;

    #[test]
    fn writes_whole_command() {
        let mut writer = CommandWriter::new(Vec::new());
        writer.send_command(b"C02\r").unwrap();
        assert_eq!(writer.into_inner(), b"C02\r");
    }

    #[test]
    fn retries_short_and_interrupted_writes() {
        let mut writer = CommandWriter::new(Stuttering {
            written: Vec::new(),
            calls: 0,
        });
        writer.send_command(b"C02\r").unwrap();
        assert_eq!(writer.get_ref().written, b"C02\r");
    }

    #[test]
    fn zero_write_is_connection_closed() {
        let mut writer = CommandWriter::new(ZeroWriter);
        let err = writer.send_command(b"C02\r").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn broken_link_is_io_error() {
        let device = FakeDevice::new();
        device.disconnect();
        let mut writer = CommandWriter::new(device);
        let err = writer.send_command(b"C02\r").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn poll_reaches_fake_device() {
        let device = FakeDevice::new();
        let mut writer =
            CommandWriter::for_device(DeviceStream::from_fake(device.clone()), None).unwrap();
        writer.send_command(b"C02\r").unwrap();
        assert_eq!(device.polls(), 1);
    }

    #[test]
    fn stalled_stream_times_out() {
        let mut writer = CommandWriter::new(Stalled::default())
            .with_stall_timeout(Some(Duration::from_millis(50)));
        let start = Instant::now();
        let err = writer.send_command(b"C02\r").unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::TimedOut));
        assert!(err.is_transport());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stalled_stream_gives_up_on_abort() {
        let mut writer = CommandWriter::new(Stalled::default());
        let attempts = std::cell::Cell::new(0);
        let err = writer
            .send_command_until(b"C02\r", || {
                attempts.set(attempts.get() + 1);
                attempts.get() > 3
            })
            .unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::Interrupted));
        assert!(writer.get_ref().attempts >= 4);
    }

    #[test]
    fn slow_progress_is_not_a_stall() {
        // Every other call stalls, but bytes keep moving.
        let mut writer = CommandWriter::new(Stalled {
            attempts: 0,
            accept_every: Some(2),
            written: Vec::new(),
        })
        .with_stall_timeout(Some(Duration::from_millis(500)));
        writer.send_command(b"C02\r").unwrap();
        assert_eq!(writer.get_ref().written, b"C02\r");
    }

    #[cfg(unix)]
    #[test]
    fn full_socket_buffer_times_out() {
        use std::os::unix::net::UnixStream;

        // The far end never reads, so the kernel buffer fills and stays full.
        let (near, _far) = UnixStream::pair().unwrap();
        near.set_write_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let mut writer =
            CommandWriter::new(near).with_stall_timeout(Some(Duration::from_millis(100)));

        let command = vec![b'C'; 8 * 1024 * 1024];
        let start = Instant::now();
        let err = writer.send_command(&command).unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    /// Reports `WouldBlock`, optionally taking one byte every `accept_every` calls.
    #[derive(Default)]
    struct Stalled {
        attempts: usize,
        accept_every: Option<usize>,
        written: Vec<u8>,
    }

    impl Write for Stalled {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            match self.accept_every {
                Some(every) if self.attempts % every == 0 => {
                    self.written.push(buf[0]);
                    Ok(1)
                }
                _ => Err(std::io::Error::from(ErrorKind::WouldBlock)),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Accepts one byte per call and interrupts every other call.
    struct Stuttering {
        written: Vec<u8>,
        calls: usize,
    }

    impl Write for Stuttering {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.written.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
