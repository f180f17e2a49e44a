/// Errors that can occur while reaching or talking to a CAN adapter.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the device stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint kind is not available on this platform.
    #[error("unsupported endpoint: {0}")]
    Unsupported(String),

    /// The device link has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
