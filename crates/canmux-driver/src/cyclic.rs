use canmux_frame::CanFrame;

use crate::autosupport::AutoSupportProtocol;

/// A frame transmitted repeatedly until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclicMessageConfig {
    pub frame: CanFrame,
    pub interval_ms: u64,
    /// Session time (ms) at which the frame is sent next.
    pub next_due_ms: u64,
    /// Enabled auto-support protocol, if any.
    pub auto_support: Option<AutoSupportProtocol>,
}

impl CyclicMessageConfig {
    /// Intervals below 1 ms are raised to 1 ms.
    pub fn new(frame: CanFrame, interval_ms: u64, next_due_ms: u64) -> Self {
        Self {
            frame,
            interval_ms: interval_ms.max(1),
            next_due_ms,
            auto_support: None,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.next_due_ms <= now_ms
    }

    /// Schedule the next transmission relative to the actual send time.
    ///
    /// Lateness is not compensated: a message sent late stays late.
    pub fn reschedule(&mut self, sent_at_ms: u64) {
        self.next_due_ms = sent_at_ms.saturating_add(self.interval_ms);
    }

    /// True if `frame` designates this entry. Counter/CRC entries ignore the
    /// counter and CRC bytes.
    pub fn matches(&self, frame: &CanFrame) -> bool {
        let ignore_safety_bytes = self.auto_support == Some(AutoSupportProtocol::CounterCrc);
        self.frame.same_content(frame, ignore_safety_bytes)
    }
}
