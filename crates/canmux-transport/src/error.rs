/// Errors that can occur in CAN transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A capture record could not be decoded.
    #[error("capture error: {0}")]
    Frame(#[from] canmux_frame::FrameError),

    /// The channel refused the frame.
    #[error("send rejected: {0}")]
    SendRejected(String),

    /// The transport does not transmit.
    #[error("transport is read-only")]
    ReadOnly,

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
