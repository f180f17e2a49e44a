/// Errors that can occur while decoding lines or moving them over the link.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The wire text could not be parsed into a frame.
    #[error("malformed frame {line:?}: {reason}")]
    MalformedFrame { line: String, reason: &'static str },

    /// An I/O error occurred while polling the device.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device closed the link.
    #[error("connection closed")]
    ConnectionClosed,

    /// A response line grew past the configured limit without a newline.
    #[error("line too long ({size} bytes, max {max})")]
    LineTooLong { size: usize, max: usize },
}

impl FrameError {
    /// True for failures of the link itself rather than of one line's text.
    pub fn is_transport(&self) -> bool {
        matches!(self, FrameError::Io(_) | FrameError::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
