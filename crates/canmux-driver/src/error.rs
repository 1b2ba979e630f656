/// Errors that can occur in driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Client registration or queue access failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] canmux_dispatch::DispatchError),

    /// The transport rejected a transmission.
    #[error("transport failure: {0}")]
    Transport(#[from] canmux_transport::TransportError),

    /// A configured frame could not be built.
    #[error("frame error: {0}")]
    Frame(#[from] canmux_frame::FrameError),

    /// Invalid driver configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;
