//! Frame logger collaborators.
//!
//! A [`ComDriver`](crate::ComDriver) forwards lifecycle changes, every
//! received or transmitted frame, and periodic statistics to each of its
//! loggers.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canmux_frame::{CanFrame, FrameWriter};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

/// Receiver of driver traffic and statistics.
pub trait FrameLogger: Send {
    fn start(&mut self) {}
    fn stop(&mut self) {}
    fn pause(&mut self) {}
    fn resume(&mut self) {}

    /// A frame seen on the bus; `transmitted` marks frames this driver sent.
    fn handle_frame(&mut self, frame: &CanFrame, transmitted: bool);

    fn update_bus_load(&mut self, _percent: u8) {}
    fn update_tx_counter(&mut self, _count: u32) {}
    fn update_tx_errors(&mut self, _count: u32) {}
}

/// Emits every frame and statistic change as a `tracing` event.
#[derive(Debug, Default)]
pub struct TracingLogger {
    bus_load: u8,
    tx_errors: u32,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameLogger for TracingLogger {
    fn start(&mut self) {
        info!("logging started");
    }

    fn stop(&mut self) {
        info!("logging stopped");
    }

    fn pause(&mut self) {
        info!("logging paused");
    }

    fn resume(&mut self) {
        info!("logging resumed");
    }

    fn handle_frame(&mut self, frame: &CanFrame, transmitted: bool) {
        let direction = if transmitted { "tx" } else { "rx" };
        debug!(direction, %frame, timestamp_us = frame.timestamp_us(), "frame");
    }

    fn update_bus_load(&mut self, percent: u8) {
        if percent != self.bus_load {
            debug!(percent, "bus load");
            self.bus_load = percent;
        }
    }

    fn update_tx_counter(&mut self, count: u32) {
        trace!(count, "tx counter");
    }

    fn update_tx_errors(&mut self, count: u32) {
        if count > self.tx_errors {
            warn!(count, "tx errors");
        }
        self.tx_errors = count;
    }
}

/// Writes frames to a capture stream while started.
///
/// Write failures are logged and counted; they never reach the driver.
pub struct CaptureLogger<W: Write> {
    writer: FrameWriter<W>,
    active: bool,
    write_errors: u64,
}

impl<W: Write> CaptureLogger<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: FrameWriter::new(inner),
            active: false,
            write_errors: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.writer.frames_written()
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn flush(&mut self) {
        if let Err(err) = self.writer.flush() {
            warn!(%err, "capture flush failed");
            self.write_errors += 1;
        }
    }
}

impl<W: Write + Send> FrameLogger for CaptureLogger<W> {
    fn start(&mut self) {
        self.active = true;
    }

    fn stop(&mut self) {
        self.active = false;
        self.flush();
    }

    fn pause(&mut self) {
        self.active = false;
        self.flush();
    }

    fn resume(&mut self) {
        self.active = true;
    }

    fn handle_frame(&mut self, frame: &CanFrame, _transmitted: bool) {
        if !self.active {
            return;
        }
        if let Err(err) = self.writer.write_frame(frame) {
            warn!(%err, %frame, "capture write failed");
            self.write_errors += 1;
        }
    }
}

impl<W: Write> std::fmt::Debug for CaptureLogger<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLogger")
            .field("active", &self.active)
            .field("frames_written", &self.writer.frames_written())
            .field("write_errors", &self.write_errors)
            .finish()
    }
}

/// Point-in-time view of the statistics a [`StatsLogger`] collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub running: bool,
    pub rx_frames: u64,
    pub tx_frames: u64,
    pub bus_load: u8,
    pub tx_counter: u32,
    pub tx_errors: u32,
}

/// Collects statistics into a snapshot shared with other threads.
///
/// Clones share the same snapshot: hand one clone to the driver and keep
/// another to read from.
#[derive(Debug, Clone, Default)]
pub struct StatsLogger {
    stats: Arc<Mutex<StatsSnapshot>>,
}

impl StatsLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameLogger for StatsLogger {
    fn start(&mut self) {
        *self.lock() = StatsSnapshot {
            running: true,
            ..StatsSnapshot::default()
        };
    }

    fn stop(&mut self) {
        self.lock().running = false;
    }

    fn pause(&mut self) {
        self.lock().running = false;
    }

    fn resume(&mut self) {
        self.lock().running = true;
    }

    fn handle_frame(&mut self, _frame: &CanFrame, transmitted: bool) {
        let mut stats = self.lock();
        if transmitted {
            stats.tx_frames += 1;
        } else {
            stats.rx_frames += 1;
        }
    }

    fn update_bus_load(&mut self, percent: u8) {
        self.lock().bus_load = percent;
    }

    fn update_tx_counter(&mut self, count: u32) {
        self.lock().tx_counter = count;
    }

    fn update_tx_errors(&mut self, count: u32) {
        self.lock().tx_errors = count;
    }
}
