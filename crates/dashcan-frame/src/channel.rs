//! Polling hand-off channel between a device link and one consumer.
//!
//! The poller thread writes [`POLL_COMMAND`], drains up to the filter slot
//! budget of ready response lines, decodes them, and queues the frames. The
//! consumer blocks in [`FrameChannel::pop_blocking`] until a frame arrives or
//! the channel stops.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use dashcan_transport::DeviceStream;
use tracing::{debug, trace, warn};

use crate::codec::{decode_line, CanFrame};
use crate::error::{FrameError, Result};
use crate::reader::{LineReader, DEFAULT_MAX_LINE_LEN};
use crate::writer::CommandWriter;

/// Firmware command that asks the adapter for buffered frames.
pub const POLL_COMMAND: &[u8] = b"C02\r";

/// Idle time between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An accept-filter registration `(id_min, id_max)`.
///
/// Admission is done by the adapter firmware; on this side the range only
/// contributes slots to the per-cycle read budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRange {
    pub id_min: u32,
    pub id_max: u32,
}

impl FilterRange {
    pub fn new(id_min: u32, id_max: u32) -> Self {
        Self { id_min, id_max }
    }

    /// A range admitting exactly one identifier.
    pub fn single(id: u32) -> Self {
        Self::new(id, id)
    }

    /// Read slots this range adds to the poll budget.
    ///
    /// `max(id_max - id_min, 0)`, plus one when the range is a single id.
    pub fn slot_count(&self) -> usize {
        let span = self.id_max.saturating_sub(self.id_min) as usize;
        if self.id_max == self.id_min {
            span + 1
        } else {
            span
        }
    }
}

/// Configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Command written at the start of every cycle. Default: `C02\r`.
    pub poll_command: Vec<u8>,
    /// Idle time between cycles. Default: 100 ms.
    pub poll_interval: Duration,
    /// Longest response line accepted. Default: 64 bytes.
    pub max_line_len: usize,
    /// Write timeout applied to device streams. A poll command that makes
    /// no progress for this long fails the link with `Io(TimedOut)`.
    pub write_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            poll_command: POLL_COMMAND.to_vec(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            write_timeout: Some(Duration::from_secs(1)),
        }
    }
}

impl ChannelConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_command(mut self, command: impl Into<Vec<u8>>) -> Self {
        self.poll_command = command.into();
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Receives the fatal error that terminated a polling loop.
///
/// Called at most once per loop, from the poller thread.
pub trait LinkObserver: Send + Sync {
    fn on_link_failure(&self, err: &FrameError);
}

impl<F> LinkObserver for F
where
    F: Fn(&FrameError) + Send + Sync,
{
    fn on_link_failure(&self, err: &FrameError) {
        self(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollerState {
    /// No poller attached; frames arrive through `push`.
    Detached,
    Running,
    Exited,
}

struct QueueState {
    frames: VecDeque<CanFrame>,
    stopped: bool,
    poller: PollerState,
}

struct Shared {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    halt: Condvar,
    budget: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, frame: CanFrame) {
        let mut state = self.lock();
        state.frames.push_back(frame);
        drop(state);
        self.not_empty.notify_one();
    }

    /// Sleep for one poll interval; returns true if stopped meanwhile.
    fn idle(&self, interval: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .halt
            .wait_timeout_while(state, interval, |s| !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);
        state.stopped
    }

    fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    fn mark_poller_exited(&self) {
        self.lock().poller = PollerState::Exited;
        self.not_empty.notify_all();
    }
}

/// Bounded producer/consumer hand-off of decoded frames.
pub struct FrameChannel {
    shared: Arc<Shared>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameChannel {
    /// Create a channel with no poller; frames are queued with [`push`](Self::push).
    pub fn new() -> Self {
        Self::with_state(PollerState::Detached)
    }

    fn with_state(poller: PollerState) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    frames: VecDeque::new(),
                    stopped: false,
                    poller,
                }),
                not_empty: Condvar::new(),
                halt: Condvar::new(),
                budget: AtomicUsize::new(0),
            }),
            poller: Mutex::new(None),
        }
    }

    /// Start a polling loop over a reader/writer pair.
    pub fn spawn<R, W>(
        reader: LineReader<R>,
        writer: CommandWriter<W>,
        config: ChannelConfig,
        observer: Option<Arc<dyn LinkObserver>>,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let channel = Self::with_state(PollerState::Running);
        let shared = Arc::clone(&channel.shared);
        let handle = std::thread::Builder::new()
            .name("dashcan-poll".to_string())
            .spawn(move || poll_loop(shared, reader, writer, config, observer))?;
        *channel.lock_poller() = Some(handle);
        Ok(channel)
    }

    /// Start a polling loop over a connected device link.
    pub fn open(
        stream: DeviceStream,
        config: ChannelConfig,
        observer: Option<Arc<dyn LinkObserver>>,
    ) -> Result<Self> {
        let reader_stream = stream
            .try_clone()
            .map_err(crate::reader::transport_to_frame_error)?;
        let reader = LineReader::for_device(reader_stream, config.max_line_len)?;
        let writer = CommandWriter::for_device(stream, config.write_timeout)?;
        debug!(transport = reader.get_ref().transport_name(), "opening frame channel");
        Self::spawn(reader, writer, config, observer)
    }

    /// Add a range's slots to the per-cycle read budget.
    ///
    /// Always succeeds. Registrations accumulate and are not deduplicated.
    pub fn register_filter(&self, id_min: u32, id_max: u32) -> bool {
        let range = FilterRange::new(id_min, id_max);
        let slots = range.slot_count();
        let budget = self.shared.budget.fetch_add(slots, Ordering::Relaxed) + slots;
        debug!(id_min, id_max, slots, budget, "registered accept filter");
        true
    }

    /// Current per-cycle read budget.
    pub fn budget(&self) -> usize {
        self.shared.budget.load(Ordering::Relaxed)
    }

    /// Queue a frame and wake one waiter.
    pub fn push(&self, frame: CanFrame) {
        self.shared.push(frame);
    }

    /// Decode a wire line and queue the frame.
    pub fn push_line(&self, line: &str) -> Result<()> {
        let frame = decode_line(line)?;
        self.push(frame);
        Ok(())
    }

    /// Pop the oldest frame, waiting once for a push if the queue is empty.
    ///
    /// Returns `None` if the queue is still empty after waking, or at once
    /// when the channel is stopped (or its poller has died) and drained.
    pub fn pop_blocking(&self) -> Option<CanFrame> {
        let mut state = self.shared.lock();
        if state.frames.is_empty() {
            if state.stopped || state.poller == PollerState::Exited {
                return None;
            }
            state = self
                .shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.frames.pop_front()
    }

    /// Like [`pop_blocking`](Self::pop_blocking), giving up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<CanFrame> {
        let mut state = self.shared.lock();
        if state.frames.is_empty() {
            if state.stopped || state.poller == PollerState::Exited {
                return None;
            }
            let (guard, _) = self
                .shared
                .not_empty
                .wait_timeout(state, timeout)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        state.frames.pop_front()
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.shared.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// True while a polling loop is attached and alive.
    pub fn is_polling(&self) -> bool {
        self.shared.lock().poller == PollerState::Running
    }

    /// Wake every waiter and terminate the polling loop.
    ///
    /// Idempotent. Joins the poller unless called from the poller itself
    /// (e.g. from a [`LinkObserver`]). Queued frames remain poppable.
    pub fn stop(&self) {
        {
            let mut state = self.shared.lock();
            if !state.stopped {
                debug!(queued = state.frames.len(), "stopping frame channel");
            }
            state.stopped = true;
        }
        self.shared.not_empty.notify_all();
        self.shared.halt.notify_all();

        let handle = self.lock_poller().take();
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("poll thread panicked");
            }
        }
    }

    fn lock_poller(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FrameChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FrameChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("FrameChannel")
            .field("queued", &state.frames.len())
            .field("stopped", &state.stopped)
            .field("poller", &state.poller)
            .field("budget", &self.shared.budget.load(Ordering::Relaxed))
            .finish()
    }
}

fn poll_loop<R: Read, W: Write>(
    shared: Arc<Shared>,
    mut reader: LineReader<R>,
    mut writer: CommandWriter<W>,
    config: ChannelConfig,
    observer: Option<Arc<dyn LinkObserver>>,
) {
    debug!(interval = ?config.poll_interval, "poll loop started");

    let outcome = loop {
        if shared.is_stopped() {
            break Ok(());
        }
        match poll_cycle(&shared, &mut reader, &mut writer, &config) {
            Ok(()) => {}
            // A write abandoned by stop() is not a link failure.
            Err(_) if shared.is_stopped() => break Ok(()),
            Err(err) => break Err(err),
        }
        if shared.idle(config.poll_interval) {
            break Ok(());
        }
    };

    shared.mark_poller_exited();

    match outcome {
        Ok(()) => debug!("poll loop stopped"),
        Err(err) => {
            warn!(error = %err, "device link failed, poll loop terminated");
            if let Some(observer) = observer {
                observer.on_link_failure(&err);
            }
        }
    }
}

/// One poll: write the command, then drain up to the budget of ready lines.
fn poll_cycle<R: Read, W: Write>(
    shared: &Shared,
    reader: &mut LineReader<R>,
    writer: &mut CommandWriter<W>,
    config: &ChannelConfig,
) -> Result<()> {
    writer.send_command_until(&config.poll_command, || shared.is_stopped())?;

    let budget = shared.budget.load(Ordering::Relaxed);
    for _ in 0..budget {
        let line = match reader.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) if err.is_transport() => return Err(err),
            Err(err) => {
                debug!(error = %err, "dropping response line");
                continue;
            }
        };
        match decode_line(&line) {
            Ok(frame) => {
                trace!(%line, "rx frame");
                shared.push(frame);
            }
            Err(err) => debug!(error = %err, "dropping undecodable line"),
        }
    }
    Ok(())
}
