use crate::rule::SignalKind;

/// Errors raised while decoding a frame into a signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// No rule is registered for the frame identifier.
    #[error("id not mapped {0:X}")]
    UnmappedIdentifier(u32),

    /// The frame payload length does not match the rule.
    #[error("len for {signal} id do not match, should be {expected} but received {actual}")]
    LengthMismatch {
        signal: SignalKind,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, SignalError>;
