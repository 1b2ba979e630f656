use canmux_frame::CanFrame;

/// Estimates the share of bus capacity used by observed frames.
///
/// Bits accumulate until at least one window has elapsed; the next poll then
/// turns them into a percentage of what the configured bitrate could carry
/// over the actual elapsed time, and starts a new window.
#[derive(Debug, Clone)]
pub struct BusLoadEstimator {
    bitrate_kbps: u32,
    window_us: u64,
    window_start_us: u64,
    accumulated_bits: u64,
}

impl BusLoadEstimator {
    pub fn new(bitrate_kbps: u32, window_ms: u64, now_us: u64) -> Self {
        Self {
            bitrate_kbps,
            window_us: window_ms.saturating_mul(1000),
            window_start_us: now_us,
            accumulated_bits: 0,
        }
    }

    pub fn record(&mut self, frame: &CanFrame) {
        self.add_bits(u64::from(frame.bit_length()));
    }

    pub fn add_bits(&mut self, bits: u64) {
        self.accumulated_bits = self.accumulated_bits.saturating_add(bits);
    }

    pub fn accumulated_bits(&self) -> u64 {
        self.accumulated_bits
    }

    pub fn set_bitrate(&mut self, bitrate_kbps: u32) {
        self.bitrate_kbps = bitrate_kbps;
    }

    /// Load in percent once the window has elapsed, `None` before that.
    pub fn poll(&mut self, now_us: u64) -> Option<u8> {
        let elapsed_us = now_us.saturating_sub(self.window_start_us);
        if elapsed_us < self.window_us {
            return None;
        }

        let load = load_percent(self.accumulated_bits, self.bitrate_kbps, elapsed_us);
        self.reset(now_us);
        Some(load)
    }

    /// Drop accumulated bits and start a new window at `now_us`.
    pub fn reset(&mut self, now_us: u64) {
        self.accumulated_bits = 0;
        self.window_start_us = now_us;
    }
}

/// `bits` as a percentage of `bitrate_kbps * 1024 * elapsed / 8`, clamped to 100.
fn load_percent(bits: u64, bitrate_kbps: u32, elapsed_us: u64) -> u8 {
    let max_bits = u128::from(bitrate_kbps) * 1024 * u128::from(elapsed_us) / 8_000_000;
    if max_bits == 0 {
        return 0;
    }
    let percent = (u128::from(bits) * 100 / max_bits).min(100);
    percent as u8
}
