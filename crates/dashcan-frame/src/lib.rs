//! CAN frame wire codec and the polling hand-off channel.
//!
//! Adapters speak a line-oriented hex format, one frame per line:
//! - the identifier in hex with no prefix and no fixed width
//! - a `,` separator
//! - the payload as two hex digits per byte, up to 8 bytes
//!
//! [`FrameChannel`] owns the polling loop that requests those lines from a
//! device, decodes them, and queues the frames for a blocking consumer.

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_channel;

pub use channel::{
    ChannelConfig, FilterRange, FrameChannel, LinkObserver, DEFAULT_POLL_INTERVAL, POLL_COMMAND,
};
pub use codec::{
    decode_line, encode_frame, timestamp_to_clock, CanFrame, FRAME_DLC, FRAME_EXT, FRAME_NORET,
    FRAME_RTR, FRAME_STD, MAX_DATA_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::{LineReader, DEFAULT_MAX_LINE_LEN, DEVICE_READ_TIMEOUT};
pub use writer::CommandWriter;

#[cfg(feature = "async")]
pub use async_channel::AsyncFrameChannel;
