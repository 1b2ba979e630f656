//! In-process CAN channel.
//!
//! A virtual channel is not attached to any hardware. Received frames are
//! injected by the owner, transmitted frames are recorded and, with loopback
//! enabled, echoed back into the receive queue the way a controller in
//! self-reception mode would.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use canmux_frame::CanFrame;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::CanTransport;

#[derive(Debug, Default)]
struct ChannelState {
    rx: VecDeque<CanFrame>,
    sent: Vec<CanFrame>,
}

/// Injectable in-memory transport.
#[derive(Debug)]
pub struct VirtualChannel {
    name: String,
    state: Mutex<ChannelState>,
    loopback: AtomicBool,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

impl Default for VirtualChannel {
    fn default() -> Self {
        Self::new("virtual")
    }
}

impl VirtualChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ChannelState::default()),
            loopback: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Echo every successfully sent frame into the receive queue.
    pub fn with_loopback(self, enabled: bool) -> Self {
        self.loopback.store(enabled, Ordering::SeqCst);
        self
    }

    /// Queue a frame as if it had been received from the bus.
    pub fn inject(&self, frame: CanFrame) {
        self.lock().rx.push_back(frame);
    }

    /// Queue several frames in order.
    pub fn inject_all(&self, frames: impl IntoIterator<Item = CanFrame>) {
        self.lock().rx.extend(frames);
    }

    /// Number of frames waiting to be read.
    pub fn pending_rx(&self) -> usize {
        self.lock().rx.len()
    }

    /// Copy of every frame sent so far.
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.lock().sent.clone()
    }

    /// Drain the record of sent frames.
    pub fn take_sent(&self) -> Vec<CanFrame> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Make every following send fail with `SendRejected`.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Close the channel. All later calls fail with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl CanTransport for VirtualChannel {
    fn read_one_frame(&self) -> Result<Option<CanFrame>> {
        self.check_open()?;
        Ok(self.lock().rx.pop_front())
    }

    fn send_one_frame(&self, frame: &CanFrame) -> Result<()> {
        self.check_open()?;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendRejected(format!(
                "{}: sends disabled",
                self.name
            )));
        }

        trace!(channel = %self.name, %frame, "virtual send");
        let mut state = self.lock();
        state.sent.push(*frame);
        if self.loopback.load(Ordering::SeqCst) {
            state.rx.push_back(*frame);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
