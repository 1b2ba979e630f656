/// Errors that can occur while building, encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The capture record header contains an invalid magic number.
    #[error("invalid record magic (expected 0x434D \"CM\")")]
    InvalidMagic,

    /// The data length code exceeds the classic CAN maximum.
    #[error("invalid data length code {dlc} (max {max})")]
    InvalidDlc { dlc: usize, max: usize },

    /// The identifier does not fit the requested identifier format.
    #[error("identifier {id:#x} out of range for {} frame", id_kind(.extended))]
    InvalidId { id: u32, extended: bool },

    /// An I/O error occurred while reading or writing records.
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended cleanly on a record boundary.
    #[error("end of capture stream")]
    EndOfStream,

    /// The stream ended in the middle of a record.
    #[error("capture truncated ({0} trailing bytes)")]
    Truncated(usize),
}

fn id_kind(extended: &bool) -> &'static str {
    if *extended {
        "extended"
    } else {
        "standard"
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
