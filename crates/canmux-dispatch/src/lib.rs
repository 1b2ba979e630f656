//! Single-reader, multi-consumer CAN frame dispatch.
//!
//! One [`Dispatcher`] owns the read side of a transport. Each registered
//! client gets its own [`Filter`](canmux_frame::Filter) and bounded
//! [`RxQueue`]; every frame read from the transport is copied into the queue
//! of every client whose filter accepts it.
//!
//! Reading from the transport and fanning out to the queues happen under one
//! lock, so two threads draining the same transport can never reorder frames
//! inside any client's queue.

pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result};
pub use queue::{QueueStatus, RxQueue, DEFAULT_QUEUE_SIZE};
pub use registry::{ClientHandle, ClientRegistry};
