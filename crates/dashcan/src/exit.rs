use std::fmt;
use std::io;

use dashcan_frame::FrameError;
use dashcan_session::{DispatchError, SessionError};
use dashcan_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotFound
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::Unsupported(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::MalformedFrame { .. } | FrameError::LineTooLong { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn dispatch_error(context: &str, err: DispatchError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Dispatch(err) => dispatch_error(context, err),
        SessionError::Io(source) => CliError::new(INTERNAL, format!("{context}: {source}")),
        SessionError::AttachFailed(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        SessionError::LivenessTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::Stopped => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn session_errors_map_to_exit_codes() {
        let timeout = session_error("monitor", SessionError::LivenessTimeout(Duration::from_secs(3)));
        assert_eq!(timeout.code, TIMEOUT);

        let attach = session_error("monitor", SessionError::AttachFailed("tcp:x".to_string()));
        assert_eq!(attach.code, TRANSPORT_ERROR);

        let unsupported = session_error(
            "monitor",
            SessionError::Transport(TransportError::Unsupported("serial".to_string())),
        );
        assert_eq!(unsupported.code, USAGE);
    }

    #[test]
    fn malformed_line_is_data_invalid() {
        let err = frame_error(
            "decode",
            FrameError::MalformedFrame {
                line: "zz".to_string(),
                reason: "missing ',' separator",
            },
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode: malformed frame"));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let err = io_error("connect", io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
