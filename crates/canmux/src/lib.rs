//! CAN frame dispatch and fan-out.
//!
//! canmux reads frames from one CAN transport and distributes them to any
//! number of filtered, bounded client queues, with a communication driver on
//! top for cyclic transmission, safety-protocol augmentation and bus load
//! statistics.
//!
//! # Crate Structure
//!
//! - [`frame`]: CAN frame model, acceptance filters and the capture record codec
//! - [`transport`]: transport abstraction plus virtual and replay transports
//! - [`dispatch`]: the shared dispatcher and its client queues
//! - [`driver`]: the communication driver (behind the `driver` feature)

/// Re-export frame types.
pub mod frame {
    pub use canmux_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use canmux_transport::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use canmux_dispatch::*;
}

/// Re-export driver types (requires `driver` feature).
#[cfg(feature = "driver")]
pub mod driver {
    pub use canmux_driver::*;
}
