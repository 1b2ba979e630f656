use std::fmt;

use embedded_can::{ExtendedId, Id, StandardId};

use crate::error::{FrameError, Result};

/// Largest data length code of a classic CAN frame.
pub const MAX_DLC: usize = 8;

/// Largest 11-bit identifier.
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Largest 29-bit identifier.
pub const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

/// Payload offset of the rolling counter in auto-support frames.
pub const COUNTER_OFFSET: usize = 6;

/// Payload offset of the CRC8 in auto-support frames.
pub const CRC_OFFSET: usize = 7;

// SOF + id + RTR + control + CRC + ACK + EOF + interframe space.
const STANDARD_OVERHEAD_BITS: u32 = 47;
// Same as above plus SRR, IDE and the 18-bit identifier extension.
const EXTENDED_OVERHEAD_BITS: u32 = 67;

/// A classic CAN frame.
///
/// Frames are plain values: once read from a transport they are copied into
/// every interested queue and never mutated in place. The builder methods
/// (`with_*`) return modified copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CanFrame {
    id: u32,
    extended: bool,
    remote: bool,
    dlc: u8,
    data: [u8; MAX_DLC],
    timestamp_us: u64,
}

impl CanFrame {
    /// Create a data frame from up to eight payload bytes.
    pub fn new(id: u32, extended: bool, payload: &[u8]) -> Result<Self> {
        check_id(id, extended)?;
        if payload.len() > MAX_DLC {
            return Err(FrameError::InvalidDlc {
                dlc: payload.len(),
                max: MAX_DLC,
            });
        }

        let mut data = [0u8; MAX_DLC];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id,
            extended,
            remote: false,
            dlc: payload.len() as u8,
            data,
            timestamp_us: 0,
        })
    }

    /// Create a remote transmission request.
    pub fn new_remote(id: u32, extended: bool, dlc: u8) -> Result<Self> {
        check_id(id, extended)?;
        if dlc as usize > MAX_DLC {
            return Err(FrameError::InvalidDlc {
                dlc: dlc as usize,
                max: MAX_DLC,
            });
        }

        Ok(Self {
            id,
            extended,
            remote: true,
            dlc,
            data: [0; MAX_DLC],
            timestamp_us: 0,
        })
    }

    /// Assemble a frame exactly as a transport delivered it.
    ///
    /// No validation happens here; a DLC above 8 survives so that consumers
    /// can detect and drop the malformed frame themselves.
    pub fn from_raw_parts(
        id: u32,
        extended: bool,
        remote: bool,
        dlc: u8,
        data: [u8; MAX_DLC],
        timestamp_us: u64,
    ) -> Self {
        Self {
            id,
            extended,
            remote,
            dlc,
            data,
            timestamp_us,
        }
    }

    /// Raw identifier.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// True for 29-bit identifiers.
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// True for remote transmission requests.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Data length code as received. May exceed 8 for malformed frames.
    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// All eight data bytes, including the ones beyond the DLC.
    pub fn data(&self) -> &[u8; MAX_DLC] {
        &self.data
    }

    /// The valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..(self.dlc as usize).min(MAX_DLC)]
    }

    /// Receive timestamp in microseconds since session start (0 = unavailable).
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// Copy with replaced data bytes. DLC and flags are kept.
    pub fn with_data(mut self, data: [u8; MAX_DLC]) -> Self {
        self.data = data;
        self
    }

    /// Copy with a replaced receive timestamp.
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// Copy with a replaced identifier. Flags are kept.
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    /// False when the DLC exceeds the classic CAN maximum.
    pub fn is_well_formed(&self) -> bool {
        self.dlc as usize <= MAX_DLC
    }

    /// Compare identifier, flags, DLC and data, never the timestamp.
    ///
    /// With `ignore_safety_bytes` the counter and CRC bytes are skipped, so
    /// a configured frame still matches after auto-support rewrote them.
    pub fn same_content(&self, other: &CanFrame, ignore_safety_bytes: bool) -> bool {
        if self.id != other.id
            || self.extended != other.extended
            || self.remote != other.remote
            || self.dlc != other.dlc
        {
            return false;
        }

        if ignore_safety_bytes {
            self.data[..COUNTER_OFFSET] == other.data[..COUNTER_OFFSET]
        } else {
            self.data == other.data
        }
    }

    /// Nominal number of bits this frame occupies on the bus.
    pub fn bit_length(&self) -> u32 {
        let overhead = if self.extended {
            EXTENDED_OVERHEAD_BITS
        } else {
            STANDARD_OVERHEAD_BITS
        };
        if self.remote {
            overhead
        } else {
            overhead + 8 * (self.dlc as u32).min(MAX_DLC as u32)
        }
    }
}

fn check_id(id: u32, extended: bool) -> Result<()> {
    let max = if extended {
        EXTENDED_ID_MAX
    } else {
        STANDARD_ID_MAX
    };
    if id > max {
        return Err(FrameError::InvalidId { id, extended });
    }
    Ok(())
}

fn split_id(id: Id) -> (u32, bool) {
    match id {
        Id::Standard(id) => (u32::from(id.as_raw()), false),
        Id::Extended(id) => (id.as_raw(), true),
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let (raw, extended) = split_id(id.into());
        CanFrame::new(raw, extended, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        let dlc = u8::try_from(dlc).ok()?;
        let (raw, extended) = split_id(id.into());
        CanFrame::new_remote(raw, extended, dlc).ok()
    }

    fn is_extended(&self) -> bool {
        self.extended
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        if self.extended {
            Id::Extended(ExtendedId::new(self.id & EXTENDED_ID_MAX).unwrap_or(ExtendedId::ZERO))
        } else {
            Id::Standard(
                StandardId::new((self.id & STANDARD_ID_MAX) as u16).unwrap_or(StandardId::ZERO),
            )
        }
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}

/// candump-style rendering: `123#DEADBEEF`, `1ABCDEF0#R2`.
impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "{:08X}#", self.id)?;
        } else {
            write!(f, "{:03X}#", self.id)?;
        }
        if self.remote {
            return write!(f, "R{}", self.dlc);
        }
        for byte in self.payload() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_copies_payload_and_sets_dlc() {
        let frame = CanFrame::new(0x123, false, &[1, 2, 3]).unwrap();
        assert_eq!(frame.id(), 0x123);
        assert_eq!(frame.dlc(), 3);
        assert_eq!(frame.payload(), &[1, 2, 3]);
        assert_eq!(frame.data(), &[1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(frame.timestamp_us(), 0);
        assert!(!frame.is_remote());
    }

    #[test]
    fn new_rejects_long_payload() {
        let err = CanFrame::new(0x1, false, &[0; 9]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidDlc { dlc: 9, max: 8 }));
    }

    #[test]
    fn new_rejects_out_of_range_ids() {
        assert!(matches!(
            CanFrame::new(0x800, false, &[]),
            Err(FrameError::InvalidId { id: 0x800, extended: false })
        ));
        assert!(CanFrame::new(0x800, true, &[]).is_ok());
        assert!(CanFrame::new(0x2000_0000, true, &[]).is_err());
    }

    #[test]
    fn raw_parts_keep_malformed_dlc() {
        let frame = CanFrame::from_raw_parts(0x10, false, false, 12, [0xAA; 8], 5);
        assert!(!frame.is_well_formed());
        assert_eq!(frame.dlc(), 12);
        assert_eq!(frame.payload().len(), 8);
    }

    #[test]
    fn same_content_ignores_timestamp_and_optionally_safety_bytes() {
        let a = CanFrame::new(0x100, false, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let b = a.with_timestamp(99);
        assert!(a.same_content(&b, false));

        let c = a.with_data([1, 2, 3, 4, 5, 6, 0xEE, 0xFF]);
        assert!(!a.same_content(&c, false));
        assert!(a.same_content(&c, true));

        let d = a.with_data([9, 2, 3, 4, 5, 6, 7, 8]);
        assert!(!a.same_content(&d, true));
    }

    #[test]
    fn bit_length_by_format() {
        let std8 = CanFrame::new(0x1, false, &[0; 8]).unwrap();
        let ext0 = CanFrame::new(0x1, true, &[]).unwrap();
        let rtr = CanFrame::new_remote(0x1, false, 8).unwrap();
        assert_eq!(std8.bit_length(), 47 + 64);
        assert_eq!(ext0.bit_length(), 67);
        assert_eq!(rtr.bit_length(), 47);
    }

    #[test]
    fn embedded_can_interop() {
        use embedded_can::Frame as _;

        let id = StandardId::new(0x321).unwrap();
        let frame = <CanFrame as embedded_can::Frame>::new(id, &[0xAB]).unwrap();
        assert_eq!(frame.id(), 0x321);
        assert!(!frame.is_extended());
        assert_eq!(embedded_can::Frame::id(&frame), Id::Standard(id));
        assert_eq!(embedded_can::Frame::data(&frame), &[0xAB]);

        let ext = ExtendedId::new(0x18FF_0001).unwrap();
        let remote = <CanFrame as embedded_can::Frame>::new_remote(ext, 4).unwrap();
        assert!(remote.is_remote_frame());
        assert_eq!(embedded_can::Frame::dlc(&remote), 4);
        assert!(<CanFrame as embedded_can::Frame>::new_remote(ext, 9).is_none());
    }

    #[test]
    fn display_matches_candump() {
        let frame = CanFrame::new(0x123, false, &[0xDE, 0xAD]).unwrap();
        assert_eq!(frame.to_string(), "123#DEAD");
        let remote = CanFrame::new_remote(0x1ABC_DEF0, true, 2).unwrap();
        assert_eq!(remote.to_string(), "1ABCDEF0#R2");
    }
}
