use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Buf, BytesMut};
use tracing::trace;

/// Product label reported by the fake adapter.
pub const FAKE_DEVICE_NAME: &str = "FAKEDEVICE";

/// Poll command the fake adapter answers, without the trailing `\r`.
const READ_FRAMES_COMMAND: &[u8] = b"C02";

/// Canned frames sent on every poll: speed, RPM, engine temperature, PDC.
const CANNED_LINES: [&str; 4] = [
    "1B4,20C4000000000000",
    "AA,00000000340D0000",
    "1D0,8B00000000000000",
    "1C2,8D725B5AFFFFFFFF",
];

/// Steering-wheel frames cycle their low nibble through `0..MFL_CYCLE`.
const MFL_CYCLE: u8 = 15;

/// In-memory CAN adapter that answers each `C02\r` poll with a burst of
/// canned frames in the line wire format.
///
/// Reads never block: with nothing pending they fail with `WouldBlock`, the
/// same way a non-blocking socket does. Clones share one device.
#[derive(Clone, Default)]
pub struct FakeDevice {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    command: BytesMut,
    pending: BytesMut,
    mfl_counter: u8,
    polls: usize,
    silent: bool,
    disconnected: bool,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop answering polls (the bus went quiet) without closing the link.
    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    /// Drop the link: further reads and writes fail with `BrokenPipe`.
    pub fn disconnect(&self) {
        let mut state = self.lock();
        state.disconnected = true;
        state.pending.clear();
    }

    /// Queue one raw response line as if the adapter had sent it.
    pub fn inject_line(&self, line: &str) {
        let mut state = self.lock();
        state.pending.extend_from_slice(line.as_bytes());
        state.pending.extend_from_slice(b"\n");
    }

    /// Number of poll commands received so far.
    pub fn polls(&self) -> usize {
        self.lock().polls
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        // A panic while holding the lock leaves plain byte buffers behind,
        // which are still safe to use.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FakeState {
    fn handle_command(&mut self, command: &[u8]) {
        if command != READ_FRAMES_COMMAND {
            trace!(command = %String::from_utf8_lossy(command), "fake device ignoring command");
            return;
        }
        self.polls += 1;
        if self.silent {
            return;
        }
        for line in CANNED_LINES {
            self.pending.extend_from_slice(line.as_bytes());
            self.pending.extend_from_slice(b"\n");
        }
        let mfl = format!("1D6,C00{:X}\n", self.mfl_counter);
        self.pending.extend_from_slice(mfl.as_bytes());
        self.mfl_counter = (self.mfl_counter + 1) % MFL_CYCLE;
    }
}

impl Read for FakeDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.lock();
        if state.disconnected {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        if state.pending.is_empty() {
            return Err(std::io::Error::from(ErrorKind::WouldBlock));
        }
        let n = state.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&state.pending[..n]);
        state.pending.advance(n);
        Ok(n)
    }
}

impl Write for FakeDevice {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.lock();
        if state.disconnected {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        state.command.extend_from_slice(buf);
        while let Some(pos) = state.command.iter().position(|b| *b == b'\r') {
            let command = state.command.split_to(pos + 1);
            state.handle_command(&command[..pos]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.lock().disconnected {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        Ok(())
    }
}

impl std::fmt::Debug for FakeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FakeDevice")
            .field("pending", &state.pending.len())
            .field("polls", &state.polls)
            .field("silent", &state.silent)
            .field("disconnected", &state.disconnected)
            .finish()
    }
}
