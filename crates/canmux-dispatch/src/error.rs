use crate::registry::ClientHandle;

/// Errors returned by queue and dispatcher operations.
///
/// Every variant is recoverable; none of them leaves a queue or the client
/// table in a partially updated state.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The handle was never issued or has been removed.
    #[error("client handle {0} not registered")]
    NotFound(ClientHandle),

    /// The queue is empty.
    #[error("queue empty")]
    WouldBlock,

    /// Dispatch-then-read produced nothing for this client.
    #[error("no new message")]
    NoNewMessage,

    /// The queue bound (or the handle space) is exhausted.
    #[error("capacity exhausted")]
    Overflow,

    /// Memory could not be reserved while enqueuing.
    #[error("allocation failed while enqueuing")]
    ResourceExhaustion,

    /// The transport failed while reading.
    #[error("transport error: {0}")]
    Transport(#[from] canmux_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
