use std::time::Duration;

/// Errors returned when a single line or frame cannot be dispatched.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The wire text was not a frame.
    #[error(transparent)]
    Frame(#[from] dashcan_frame::FrameError),

    /// The frame had no rule or the wrong length for its rule.
    #[error(transparent)]
    Signal(#[from] dashcan_signal::SignalError),
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] dashcan_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] dashcan_frame::FrameError),

    /// Dispatch error.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Could not start a session thread.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The device could not be attached.
    #[error("problem when connecting to device: {0}")]
    AttachFailed(String),

    /// The device went quiet for longer than the guard timeout.
    #[error("no frames for {0:?}")]
    LivenessTimeout(Duration),

    /// The session was already stopped.
    #[error("session stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SessionError>;
