use std::collections::VecDeque;

use canmux_frame::CanFrame;

use crate::error::{DispatchError, Result};

/// Default bound of a client queue.
pub const DEFAULT_QUEUE_SIZE: usize = 1000;

/// Latched outcome of the queue's push operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueStatus {
    #[default]
    Ok,
    /// At least one frame was dropped because the queue was full.
    Overflow,
    /// At least one frame was dropped because memory could not be reserved.
    ResourceExhaustion,
}

/// Bounded FIFO of received frames.
///
/// A full queue drops the incoming frame; existing entries are never evicted.
/// Push failures latch into the status until [`RxQueue::take_status`] reads
/// and clears it, so a consumer that polls occasionally still learns that it
/// lost frames.
#[derive(Debug)]
pub struct RxQueue {
    frames: VecDeque<CanFrame>,
    max_size: usize,
    status: QueueStatus,
}

impl Default for RxQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}

impl RxQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            max_size,
            status: QueueStatus::Ok,
        }
    }

    /// Append a frame at the tail.
    pub fn push(&mut self, frame: CanFrame) -> Result<()> {
        if self.frames.len() >= self.max_size {
            self.status = QueueStatus::Overflow;
            return Err(DispatchError::Overflow);
        }
        if self.frames.try_reserve(1).is_err() {
            self.status = QueueStatus::ResourceExhaustion;
            return Err(DispatchError::ResourceExhaustion);
        }

        self.frames.push_back(frame);
        Ok(())
    }

    /// Remove and return the oldest frame.
    pub fn pop(&mut self) -> Result<CanFrame> {
        self.frames.pop_front().ok_or(DispatchError::WouldBlock)
    }

    /// Change the bound. Entries beyond the new bound (the newest ones) are
    /// dropped.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.frames.truncate(max_size);
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Return the latched status and reset it to `Ok`.
    pub fn take_status(&mut self) -> QueueStatus {
        std::mem::take(&mut self.status)
    }
}
