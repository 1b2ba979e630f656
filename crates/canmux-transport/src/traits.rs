use std::sync::Arc;

use canmux_frame::CanFrame;

use crate::error::Result;

/// A CAN channel that can be polled one frame at a time.
///
/// Implementations own the physical or virtual channel and its whole
/// lifecycle (initialisation, bitrate, reset). Both calls must return
/// immediately: `read_one_frame` yields `Ok(None)` when nothing is pending
/// instead of blocking.
pub trait CanTransport: Send + Sync {
    /// Take the next received frame, if any.
    fn read_one_frame(&self) -> Result<Option<CanFrame>>;

    /// Put one frame on the bus.
    fn send_one_frame(&self, frame: &CanFrame) -> Result<()>;

    /// Short label used in log events.
    fn name(&self) -> &str {
        "can"
    }
}

impl<T: CanTransport + ?Sized> CanTransport for Arc<T> {
    fn read_one_frame(&self) -> Result<Option<CanFrame>> {
        (**self).read_one_frame()
    }

    fn send_one_frame(&self, frame: &CanFrame) -> Result<()> {
        (**self).send_one_frame(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: CanTransport + ?Sized> CanTransport for &T {
    fn read_one_frame(&self) -> Result<Option<CanFrame>> {
        (**self).read_one_frame()
    }

    fn send_one_frame(&self, frame: &CanFrame) -> Result<()> {
        (**self).send_one_frame(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
