//! Tokio rendition of [`FrameChannel`](crate::FrameChannel).
//!
//! Same cycle, same budget rule: a spawned task writes the poll command,
//! takes up to `budget` lines that are already buffered, queues the decoded
//! frames and sleeps for the poll interval. Consumers await [`pop`].
//!
//! [`pop`]: AsyncFrameChannel::pop

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::channel::{ChannelConfig, FilterRange, LinkObserver};
use crate::codec::{decode_line, CanFrame};
use crate::error::{FrameError, Result};

struct Shared {
    frames: Mutex<VecDeque<CanFrame>>,
    notify: Notify,
    budget: AtomicUsize,
    exited: AtomicBool,
    cancel: CancellationToken,
}

impl Shared {
    fn frames(&self) -> MutexGuard<'_, VecDeque<CanFrame>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, frame: CanFrame) {
        self.frames().push_back(frame);
        self.notify.notify_one();
    }
}

/// Async frame hand-off backed by a tokio polling task.
pub struct AsyncFrameChannel {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncFrameChannel {
    /// Spawn the polling task over an async byte stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S>(
        stream: S,
        config: ChannelConfig,
        observer: Option<Arc<dyn LinkObserver>>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let shared = Arc::new(Shared {
            frames: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            budget: AtomicUsize::new(0),
            exited: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });

        let task = tokio::spawn(poll_task(Arc::clone(&shared), stream, config, observer));
        Self {
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    /// Add a range's slots to the per-cycle read budget.
    pub fn register_filter(&self, id_min: u32, id_max: u32) -> bool {
        let slots = FilterRange::new(id_min, id_max).slot_count();
        self.shared.budget.fetch_add(slots, Ordering::Relaxed);
        true
    }

    pub fn budget(&self) -> usize {
        self.shared.budget.load(Ordering::Relaxed)
    }

    /// Queue a frame and wake one waiter.
    pub fn push(&self, frame: CanFrame) {
        self.shared.push(frame);
    }

    /// Pop the oldest frame, waiting once for a push if the queue is empty.
    ///
    /// Resolves to `None` once stopped (or after the poller died) and drained.
    pub async fn pop(&self) -> Option<CanFrame> {
        if let Some(frame) = self.shared.frames().pop_front() {
            return Some(frame);
        }
        if self.is_stopped() || self.shared.exited.load(Ordering::Acquire) {
            return None;
        }
        tokio::select! {
            _ = self.shared.notify.notified() => {}
            _ = self.shared.cancel.cancelled() => {}
        }
        self.shared.frames().pop_front()
    }

    pub fn len(&self) -> usize {
        self.shared.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// False once the polling task has ended, by stop or link failure.
    pub fn is_polling(&self) -> bool {
        !self.shared.exited.load(Ordering::Acquire)
    }

    /// Cancel the polling task and wake every waiter. Idempotent.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
        self.shared.notify.notify_waiters();
    }

    /// Stop and wait for the polling task to finish.
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "poll task ended abnormally");
            }
        }
    }
}

impl Drop for AsyncFrameChannel {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

async fn poll_task<S>(
    shared: Arc<Shared>,
    stream: S,
    config: ChannelConfig,
    observer: Option<Arc<dyn LinkObserver>>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = FramedRead::new(
        read_half,
        LinesCodec::new_with_max_length(config.max_line_len),
    );

    debug!(interval = ?config.poll_interval, "async poll task started");

    let outcome: Result<()> = loop {
        if shared.cancel.is_cancelled() {
            break Ok(());
        }
        let write = write_command(&mut write_half, &config.poll_command, config.write_timeout);
        tokio::select! {
            _ = shared.cancel.cancelled() => break Ok(()),
            written = write => {
                if let Err(err) = written {
                    break Err(err);
                }
            }
        }

        let budget = shared.budget.load(Ordering::Relaxed);
        let mut fatal = None;
        for _ in 0..budget {
            // Only lines already buffered or readable without waiting count.
            let Some(next) = lines.next().now_or_never() else {
                break;
            };
            match next {
                None => {
                    fatal = Some(FrameError::ConnectionClosed);
                    break;
                }
                Some(Ok(line)) => match decode_line(&line) {
                    Ok(frame) => {
                        trace!(%line, "rx frame");
                        shared.push(frame);
                    }
                    Err(err) => debug!(error = %err, "dropping undecodable line"),
                },
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    debug!(max = config.max_line_len, "dropping overlong line");
                }
                Some(Err(LinesCodecError::Io(err))) => {
                    fatal = Some(FrameError::Io(err));
                    break;
                }
            }
        }
        if let Some(err) = fatal {
            break Err(err);
        }

        tokio::select! {
            _ = shared.cancel.cancelled() => break Ok(()),
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    };

    shared.exited.store(true, Ordering::Release);
    shared.notify.notify_waiters();

    match outcome {
        Ok(()) => debug!("async poll task stopped"),
        Err(err) => {
            warn!(error = %err, "device link failed, poll task terminated");
            if let Some(observer) = observer {
                observer.on_link_failure(&err);
            }
        }
    }
}

/// Write and flush one command, failing with `Io(TimedOut)` past `timeout`.
async fn write_command<W>(
    writer: &mut W,
    command: &[u8],
    timeout: Option<Duration>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let write = async {
        writer.write_all(command).await?;
        writer.flush().await?;
        Ok::<_, FrameError>(())
    };
    let Some(limit) = timeout else {
        return write.await;
    };
    match tokio::time::timeout(limit, write).await {
        Ok(written) => written,
        Err(_) => Err(FrameError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("poll command not written within {limit:?}"),
        ))),
    }
}
