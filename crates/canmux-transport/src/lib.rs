//! CAN transport abstraction.
//!
//! Provides the read-one/send-one contract the dispatch engine is built on,
//! plus two in-process implementations:
//! - [`VirtualChannel`]: injectable receive queue with optional loopback
//! - [`ReplayTransport`]: read-only playback of a capture stream
//!
//! Hardware bindings (vendor drivers, SocketCAN, tunnels) live outside this
//! workspace and plug in by implementing [`CanTransport`].

pub mod error;
pub mod replay;
pub mod traits;
pub mod virtual_channel;

pub use error::{Result, TransportError};
pub use replay::ReplayTransport;
pub use traits::CanTransport;
pub use virtual_channel::VirtualChannel;
