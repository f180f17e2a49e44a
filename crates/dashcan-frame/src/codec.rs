use std::fmt::Write as _;

use crate::error::{FrameError, Result};

/// Maximum number of payload bytes in a classic CAN frame.
pub const MAX_DATA_SIZE: usize = 8;

/// Info flag: no retransmission.
pub const FRAME_NORET: u8 = 0x80;
/// Info flag: extended (29-bit) frame format.
pub const FRAME_EXT: u8 = 0x20;
/// Info flag: standard (11-bit) frame format.
pub const FRAME_STD: u8 = 0x00;
/// Info flag: remote transmission request.
pub const FRAME_RTR: u8 = 0x10;
/// Info mask: data length code.
pub const FRAME_DLC: u8 = 0x0F;

/// Maximum payload width on the wire: two hex digits per byte.
const MAX_PAYLOAD_DIGITS: usize = MAX_DATA_SIZE * 2;

/// One CAN bus message.
///
/// Only the first [`dlc`](Self::dlc) bytes of `data` are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanFrame {
    /// Frame identifier (11- or 29-bit, width not validated).
    pub id: u32,
    /// Flag bits plus the data length code in the low nibble.
    pub info: u8,
    /// Payload storage; bytes past the DLC are undefined.
    pub data: [u8; MAX_DATA_SIZE],
    /// Transport-supplied timestamp, see [`timestamp_to_clock`].
    pub timestamp: u32,
}

impl CanFrame {
    /// Build a standard-format frame from a payload of up to 8 bytes.
    pub fn new(id: u32, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_DATA_SIZE);
        let mut data = [0u8; MAX_DATA_SIZE];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id,
            info: FRAME_STD | len as u8,
            data,
            timestamp: 0,
        }
    }

    /// Data length code from the info byte.
    pub fn dlc(&self) -> usize {
        (self.info & FRAME_DLC) as usize
    }

    /// The meaningful payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc().min(MAX_DATA_SIZE)]
    }

    /// The payload folded big-endian into one integer, right-aligned.
    ///
    /// This is the value the wire payload represents as a single base-16
    /// number, which is what signal extraction shifts and masks.
    pub fn payload_word(&self) -> u64 {
        self.payload()
            .iter()
            .fold(0u64, |word, byte| (word << 8) | u64::from(*byte))
    }

    pub fn is_rtr(&self) -> bool {
        self.info & FRAME_RTR == FRAME_RTR
    }

    pub fn is_extended(&self) -> bool {
        self.info & FRAME_EXT == FRAME_EXT
    }

    pub fn no_retransmit(&self) -> bool {
        self.info & FRAME_NORET == FRAME_NORET
    }

    /// Render this frame in the line wire format.
    pub fn to_line(&self) -> String {
        encode_frame(self.id, &self.data, self.dlc())
    }
}

/// Decode one wire line (`<ID_HEX>,<PAYLOAD_HEX>`) into a frame.
///
/// The payload is read as one unsigned base-16 integer. Its logical length
/// is the digit count divided by two; the frame keeps the low `len` bytes of
/// the integer, so leading `00` bytes are preserved by position rather than
/// by the digits themselves. An odd leftover high nibble falls outside the
/// frame.
///
/// Whitespace around either field is ignored. A line with more than two
/// fields is malformed: the payload field must be pure hex.
pub fn decode_line(line: &str) -> Result<CanFrame> {
    let text = line.trim();
    let (id_hex, payload_hex) = text
        .split_once(',')
        .ok_or_else(|| malformed(line, "missing ',' separator"))?;

    let id = parse_hex_u32(id_hex).ok_or_else(|| malformed(line, "invalid identifier"))?;

    let payload_hex = payload_hex.trim();
    if payload_hex.is_empty() {
        return Err(malformed(line, "empty payload"));
    }
    if payload_hex.len() > MAX_PAYLOAD_DIGITS {
        return Err(malformed(line, "payload longer than 8 bytes"));
    }
    if !payload_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed(line, "payload is not hexadecimal"));
    }
    let value =
        u64::from_str_radix(payload_hex, 16).map_err(|_| malformed(line, "invalid payload"))?;

    let len = payload_hex.len() / 2;
    let be = value.to_be_bytes();
    let mut data = [0u8; MAX_DATA_SIZE];
    data[..len].copy_from_slice(&be[MAX_DATA_SIZE - len..]);

    Ok(CanFrame {
        id,
        info: FRAME_STD | len as u8,
        data,
        timestamp: 0,
    })
}

/// Render an identifier and the first `len` payload bytes as a wire line.
///
/// The identifier is unpadded uppercase hex; each byte is two uppercase
/// hex digits with no separators.
pub fn encode_frame(id: u32, data: &[u8], len: usize) -> String {
    let len = len.min(data.len());
    let mut out = String::with_capacity(9 + len * 2);
    let _ = write!(out, "{id:X},");
    for byte in &data[..len] {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Format a packed adapter timestamp as `HH:MM:SS.mmm`.
///
/// Fields: hours bits 22-26, minutes 16-21, seconds 10-15, millis 0-9.
/// Values are not range-checked, a malformed clock shows as-is. Every field
/// keeps its fixed width, so a 4-digit millisecond value is cut to its
/// leading three digits.
pub fn timestamp_to_clock(timestamp: u32) -> String {
    let hours = (timestamp >> 22) & 0x1F;
    let minutes = (timestamp >> 16) & 0x3F;
    let seconds = (timestamp >> 10) & 0x3F;
    let millis = format!("{:03}", timestamp & 0x3FF);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{}", &millis[..3])
}

fn parse_hex_u32(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(text, 16).ok()
}

fn malformed(line: &str, reason: &'static str) -> FrameError {
    FrameError::MalformedFrame {
        line: line.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rpm_line() {
        let frame = decode_line("AA,00000000340D0000").unwrap();
        assert_eq!(frame.id, 0xAA);
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.payload(), &[0, 0, 0, 0, 0x34, 0x0D, 0, 0]);
        assert_eq!(frame.payload_word(), 0x0000_0000_340D_0000);
        assert!(!frame.is_rtr());
        assert!(!frame.is_extended());
    }

    #[test]
    fn test_decode_then_encode_reproduces_line() {
        for line in [
            "1B4,20C4000000000000",
            "1D0,8B00000000000000",
            "1C2,8D725B5AFFFFFFFF",
            "1D6,C001",
            "18FEF100,FF",
        ] {
            let frame = decode_line(line).unwrap();
            assert_eq!(encode_frame(frame.id, &frame.data, frame.dlc()), line);
            assert_eq!(frame.to_line(), line);
        }
    }

    #[test]
    fn test_leading_zero_bytes_keep_their_position() {
        let frame = decode_line("1D6,0000C001").unwrap();
        assert_eq!(frame.dlc(), 4);
        assert_eq!(frame.payload(), &[0x00, 0x00, 0xC0, 0x01]);
        assert_eq!(frame.payload_word(), 0xC001);
    }

    #[test]
    fn test_odd_digit_count_truncates_length() {
        let frame = decode_line("1D6,1C001").unwrap();
        assert_eq!(frame.dlc(), 2);
        assert_eq!(frame.payload(), &[0xC0, 0x01]);
    }

    #[test]
    fn test_trailing_carriage_return_ignored() {
        let frame = decode_line("AA,0102\r").unwrap();
        assert_eq!(frame.payload(), &[0x01, 0x02]);
    }

    #[test]
    fn test_decode_rejects_malformed_lines() {
        for line in [
            "",
            "AA",
            "AA,",
            ",0102",
            "XYZ,0102",
            "AA,01G2",
            "1FFFFFFFF,01",
            "AA,000000000000000000",
            "0xAA,01",
        ] {
            let result = decode_line(line);
            assert!(
                matches!(result, Err(FrameError::MalformedFrame { .. })),
                "{line:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_field_whitespace_tolerated_extra_fields_rejected() {
        let frame = decode_line(" AA , 0102 ").unwrap();
        assert_eq!(frame.id, 0xAA);
        assert_eq!(frame.payload(), &[0x01, 0x02]);

        for line in ["AA,01,02", "AA,0102,", "AA,01,,"] {
            match decode_line(line) {
                Err(FrameError::MalformedFrame { reason, .. }) => {
                    assert_eq!(reason, "payload is not hexadecimal", "{line:?}")
                }
                other => panic!("{line:?} decoded as {other:?}"),
            }
        }
    }

    #[test]
    fn test_encode_uppercase_unpadded_id() {
        let data = [0xab, 0x01, 0xff, 0x00];
        assert_eq!(encode_frame(0x1b4, &data, 3), "1B4,AB01FF");
        assert_eq!(encode_frame(0x5, &data, 0), "5,");
        // Length past the buffer is clamped.
        assert_eq!(encode_frame(0x5, &data, 9), "5,AB01FF00");
    }

    #[test]
    fn test_timestamp_to_clock() {
        let ts = (13 << 22) | (45 << 16) | (7 << 10) | 89;
        assert_eq!(timestamp_to_clock(ts), "13:45:07.089");
        assert_eq!(timestamp_to_clock(0), "00:00:00.000");
    }

    #[test]
    fn test_timestamp_out_of_range_fields_not_checked() {
        let ts = (31 << 22) | (63 << 16) | (63 << 10) | 1023;
        assert_eq!(timestamp_to_clock(ts), "31:63:63.102");
    }

    #[test]
    fn test_frame_flags_and_dlc_bounds() {
        let mut frame = CanFrame::new(0x123, &[1, 2, 3]);
        assert_eq!(frame.dlc(), 3);
        frame.info |= FRAME_RTR | FRAME_EXT | FRAME_NORET;
        assert!(frame.is_rtr());
        assert!(frame.is_extended());
        assert!(frame.no_retransmit());
        assert_eq!(frame.payload(), &[1, 2, 3]);

        // DLC values above 8 never read past the buffer.
        frame.info = FRAME_STD | 0x0F;
        assert_eq!(frame.payload().len(), MAX_DATA_SIZE);
    }
}
