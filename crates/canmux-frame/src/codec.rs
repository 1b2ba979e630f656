use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::frame::{CanFrame, MAX_DLC};

/// Capture record: magic (2) + flags (1) + dlc (1) + id (4) + data (8) + timestamp (8).
pub const RECORD_SIZE: usize = 24;

/// Magic bytes: "CM" (0x43 0x4D).
pub const MAGIC: [u8; 2] = [0x43, 0x4D];

const FLAG_EXTENDED: u8 = 0x01;
const FLAG_REMOTE: u8 = 0x02;

/// Encode a frame into the capture wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬───────┬─────┬──────────┬──────────┬──────────────┐
/// │ Magic (2) │ Flags │ DLC │ Id       │ Data     │ Timestamp µs │
/// │ 0x43 0x4D │ (1B)  │(1B) │ (4B LE)  │ (8B)     │ (8B LE)      │
/// │ "CM"      │       │     │          │          │              │
/// └───────────┴───────┴─────┴──────────┴──────────┴──────────────┘
/// ```
pub fn encode_frame(frame: &CanFrame, dst: &mut BytesMut) {
    let mut flags = 0u8;
    if frame.is_extended() {
        flags |= FLAG_EXTENDED;
    }
    if frame.is_remote() {
        flags |= FLAG_REMOTE;
    }

    dst.reserve(RECORD_SIZE);
    dst.put_slice(&MAGIC);
    dst.put_u8(flags);
    dst.put_u8(frame.dlc());
    dst.put_u32_le(frame.id());
    dst.put_slice(frame.data());
    dst.put_u64_le(frame.timestamp_us());
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete record yet.
/// On success, consumes the record bytes from the buffer. The DLC is passed
/// through unvalidated.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<CanFrame>> {
    if src.len() >= MAGIC.len() && src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }
    if src.len() < RECORD_SIZE {
        return Ok(None);
    }

    src.advance(MAGIC.len());
    let flags = src.get_u8();
    let dlc = src.get_u8();
    let id = src.get_u32_le();
    let mut data = [0u8; MAX_DLC];
    src.copy_to_slice(&mut data);
    let timestamp_us = src.get_u64_le();

    Ok(Some(CanFrame::from_raw_parts(
        id,
        flags & FLAG_EXTENDED != 0,
        flags & FLAG_REMOTE != 0,
        dlc,
        data,
        timestamp_us,
    )))
}
