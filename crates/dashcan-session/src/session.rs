use std::sync::Arc;

use dashcan_frame::{encode_frame, CanFrame, FrameChannel, FrameError, LinkObserver};
use dashcan_signal::{TelemetryEvent, TelemetrySink};
use dashcan_transport::DeviceStream;
use tracing::{debug, info, trace};

use crate::config::SessionConfig;
use crate::connector::{connect, Endpoint};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Result, SessionError};
use crate::watchdog::{LivenessObserver, Watchdog};

/// Controller lifecycle notifications.
///
/// Calls may come from the consumer, the poll thread or the watchdog thread.
pub trait SessionObserver: Send + Sync {
    fn on_connected(&self, _label: &str) {}

    fn on_disconnected(&self) {}

    /// The adapter delivered no frame within the guard timeout.
    fn on_timeout(&self) {}

    fn on_error(&self, _msg: &str) {}
}

/// Outcome of one consumer iteration.
#[derive(Debug)]
pub enum Step {
    /// A frame went through the dispatcher.
    Dispatched(std::result::Result<Option<TelemetryEvent>, DispatchError>),
    /// An RTR or zero-length frame was dropped.
    Skipped(CanFrame),
    /// No frame arrived within the pop timeout.
    Idle,
    /// The channel stopped; the session is detached.
    Stopped,
}

/// Cloneable stop switch for a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    channel: Arc<FrameChannel>,
}

impl SessionHandle {
    /// Stop polling; the session detaches on its next step.
    pub fn stop(&self) {
        self.channel.stop();
    }
}

/// An attached adapter: its polling channel, liveness watchdog and observer.
pub struct Session {
    channel: Arc<FrameChannel>,
    watchdog: Watchdog,
    link: DeviceStream,
    observer: Arc<dyn SessionObserver>,
    config: SessionConfig,
    label: String,
    attached: bool,
    frames: u64,
}

impl Session {
    /// Connect to an endpoint and attach, registering one filter per id.
    pub fn connect(
        endpoint: &Endpoint,
        ids: &[u32],
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        let watchdog = attach_watchdog(&config, &observer)?;
        let (stream, label) = match connect(endpoint) {
            Ok(connected) => connected,
            Err(err) => {
                watchdog.disarm();
                observer.on_error("Problem when connecting to device !");
                return Err(SessionError::AttachFailed(format!("{endpoint}: {err}")));
            }
        };
        Self::start(stream, label, ids, config, observer, watchdog)
    }

    /// Attach to an already connected device link.
    pub fn attach(
        stream: DeviceStream,
        label: impl Into<String>,
        ids: &[u32],
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        let watchdog = attach_watchdog(&config, &observer)?;
        Self::start(stream, label.into(), ids, config, observer, watchdog)
    }

    fn start(
        stream: DeviceStream,
        label: String,
        ids: &[u32],
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
        watchdog: Watchdog,
    ) -> Result<Self> {
        let link = stream.try_clone()?;
        let link_observer: Arc<dyn LinkObserver> = Arc::new(LinkForwarder(Arc::clone(&observer)));
        let channel = match FrameChannel::open(stream, config.channel.clone(), Some(link_observer)) {
            Ok(channel) => Arc::new(channel),
            Err(err) => {
                watchdog.disarm();
                observer.on_error("Problem when connecting to device !");
                return Err(SessionError::AttachFailed(err.to_string()));
            }
        };

        watchdog.feed(config.guard_timeout);
        info!(%label, "controller attached");
        observer.on_connected(&label);

        for id in ids {
            debug!("accepting filter for id {id:X}");
            channel.register_filter(*id, *id);
        }

        Ok(Self {
            channel,
            watchdog,
            link,
            observer,
            config,
            label,
            attached: true,
            frames: 0,
        })
    }

    /// Wait for one frame and dispatch it.
    ///
    /// The watchdog is fed with the guard timeout whenever a frame arrives,
    /// so a quiet adapter trips it. Returns [`SessionError::Stopped`] once
    /// the session has detached.
    pub fn step<S: TelemetrySink>(&mut self, dispatcher: &mut Dispatcher<S>) -> Result<Step> {
        if !self.attached {
            return Err(SessionError::Stopped);
        }

        let Some(frame) = self.channel.pop_timeout(self.config.pop_timeout) else {
            if self.channel.is_stopped() || !self.channel.is_polling() {
                self.detach();
                return Ok(Step::Stopped);
            }
            return Ok(Step::Idle);
        };

        self.watchdog.feed(self.config.guard_timeout);
        self.frames += 1;

        if !should_dispatch(&frame) {
            trace!(id = frame.id, info = frame.info, "skipping frame");
            return Ok(Step::Skipped(frame));
        }

        let line = encode_frame(frame.id, &frame.data, frame.dlc());
        let result = dispatcher.dispatch_line(&line);
        std::thread::sleep(self.config.scan_period);
        Ok(Step::Dispatched(result))
    }

    /// Step until the session stops.
    pub fn run<S: TelemetrySink>(&mut self, dispatcher: &mut Dispatcher<S>) -> Result<()> {
        loop {
            if let Step::Stopped = self.step(dispatcher)? {
                return Ok(());
            }
        }
    }

    /// Detach: stop polling, disarm the watchdog and close the link.
    pub fn stop(&mut self) {
        self.detach();
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            channel: Arc::clone(&self.channel),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Frames popped so far, including skipped ones.
    pub fn frames_received(&self) -> u64 {
        self.frames
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A dispatcher feeding `sink`, decoding with this session's decoder config.
    pub fn dispatcher<S: TelemetrySink>(&self, sink: S) -> Dispatcher<S> {
        Dispatcher::with_decoder(self.config.signal_decoder(), sink)
    }

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        self.watchdog.disarm();
        self.channel.stop();
        if let Err(err) = self.link.shutdown() {
            debug!(error = %err, "link shutdown failed");
        }
        info!(label = %self.label, frames = self.frames, "controller detached");
        self.observer.on_disconnected();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("label", &self.label)
            .field("attached", &self.attached)
            .field("frames", &self.frames)
            .field("channel", &self.channel)
            .field("watchdog", &self.watchdog)
            .finish()
    }
}

/// RTR frames carry no data, and a zero-length frame should never arrive.
fn should_dispatch(frame: &CanFrame) -> bool {
    !frame.is_rtr() && frame.dlc() != 0
}

fn attach_watchdog(config: &SessionConfig, observer: &Arc<dyn SessionObserver>) -> Result<Watchdog> {
    let forward = Arc::clone(observer);
    let liveness: Arc<dyn LivenessObserver> = Arc::new(move || {
        info!("controller timeout");
        forward.on_timeout();
    });
    let watchdog = Watchdog::new(config.attach_timeout, Some(liveness))?;
    watchdog.arm(config.attach_timeout);
    Ok(watchdog)
}

struct LinkForwarder(Arc<dyn SessionObserver>);

impl LinkObserver for LinkForwarder {
    fn on_link_failure(&self, err: &FrameError) {
        self.0.on_error(&format!("Device exception occured: {err}"));
    }
}
