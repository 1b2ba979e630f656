use std::collections::VecDeque;
use std::sync::Arc;

use canmux_dispatch::{ClientHandle, DispatchError, Dispatcher, QueueStatus};
use canmux_frame::{CanFrame, COUNTER_OFFSET, CRC_OFFSET, EXTENDED_ID_MAX, STANDARD_ID_MAX};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::autosupport::{AutoSupportEngine, AutoSupportProtocol};
use crate::bus_load::BusLoadEstimator;
use crate::clock::{Clock, MonotonicClock};
use crate::config::DriverConfig;
use crate::cyclic::CyclicMessageConfig;
use crate::error::Result;
use crate::logger::FrameLogger;

/// Logging session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingState {
    #[default]
    Stopped,
    Started,
    Paused,
}

/// Communication driver on top of a shared [`Dispatcher`].
///
/// The driver owns one dispatch client. Each call to
/// [`distribute_messages`](Self::distribute_messages) transmits what is due,
/// pulls new traffic through the dispatcher, hands received frames to the
/// loggers and pushes statistics. Nothing runs in the background: the caller
/// drives the poll loop.
///
/// `ComDriver` is not synchronized. Wrap it in a
/// [`SharedComDriver`](crate::SharedComDriver) to call it from several
/// threads.
pub struct ComDriver {
    dispatcher: Arc<Dispatcher>,
    handle: ClientHandle,
    clock: Arc<dyn Clock>,
    auto_support: AutoSupportEngine,
    one_shot: VecDeque<CanFrame>,
    cyclic: Vec<CyclicMessageConfig>,
    loggers: Vec<Box<dyn FrameLogger>>,
    bus_load: BusLoadEstimator,
    tx_counter: u32,
    tx_errors: u32,
    state: LoggingState,
}

impl ComDriver {
    /// Create a driver timed by a [`MonotonicClock`] started now.
    pub fn new(dispatcher: Arc<Dispatcher>, config: &DriverConfig) -> Result<Self> {
        Self::with_clock(dispatcher, config, Arc::new(MonotonicClock::new()))
    }

    /// Create a driver and register its receive client with `dispatcher`.
    ///
    /// Cyclic messages listed in `config` are not scheduled until
    /// [`apply_config`](Self::apply_config) is called.
    pub fn with_clock(
        dispatcher: Arc<Dispatcher>,
        config: &DriverConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let handle = dispatcher.register_client(None, config.rx_queue_size)?;
        let bus_load =
            BusLoadEstimator::new(config.bitrate_kbps, config.load_window_ms, clock.now_us());
        debug!(
            transport = dispatcher.transport().name(),
            client = %handle,
            bitrate_kbps = config.bitrate_kbps,
            "driver created"
        );

        Ok(Self {
            dispatcher,
            handle,
            clock,
            auto_support: AutoSupportEngine::new(),
            one_shot: VecDeque::new(),
            cyclic: Vec::new(),
            loggers: Vec::new(),
            bus_load,
            tx_counter: 0,
            tx_errors: 0,
            state: LoggingState::Stopped,
        })
    }

    /// Schedule every cyclic message listed in `config`.
    pub fn apply_config(&mut self, config: &DriverConfig) -> Result<()> {
        config.validate()?;
        self.bus_load.set_bitrate(config.bitrate_kbps);
        for spec in &config.cyclic {
            let frame = spec.to_frame()?;
            let protocol = spec.auto_support.unwrap_or(AutoSupportProtocol::Plain);
            self.add_cyclic_can_message(
                frame,
                spec.interval_ms,
                spec.auto_support.is_some(),
                protocol,
            );
        }
        Ok(())
    }

    pub fn add_logger(&mut self, logger: Box<dyn FrameLogger>) {
        self.loggers.push(logger);
    }

    /// Begin a session: counters and the load window restart.
    pub fn start_logging(&mut self) {
        self.tx_counter = 0;
        self.tx_errors = 0;
        self.bus_load.reset(self.clock.now_us());
        self.state = LoggingState::Started;
        info!(client = %self.handle, "logging started");
        for logger in &mut self.loggers {
            logger.start();
        }
    }

    pub fn pause_logging(&mut self) {
        if self.state != LoggingState::Started {
            return;
        }
        self.state = LoggingState::Paused;
        for logger in &mut self.loggers {
            logger.pause();
        }
    }

    pub fn continue_logging(&mut self) {
        if self.state != LoggingState::Paused {
            return;
        }
        self.state = LoggingState::Started;
        for logger in &mut self.loggers {
            logger.resume();
        }
    }

    /// End the session. Counter sequences restart and loggers see zeroed
    /// statistics.
    pub fn stop_logging(&mut self) {
        self.auto_support.reset_counters();
        self.state = LoggingState::Stopped;
        info!(client = %self.handle, tx = self.tx_counter, tx_errors = self.tx_errors, "logging stopped");
        for logger in &mut self.loggers {
            logger.stop();
            logger.update_bus_load(0);
            logger.update_tx_counter(0);
            logger.update_tx_errors(0);
        }
    }

    /// Run one poll cycle. Returns the number of received frames forwarded
    /// to the loggers.
    pub fn distribute_messages(&mut self) -> usize {
        self.transmit_pending();
        self.dispatcher.dispatch_incoming();
        let forwarded = self.drain_received();
        self.push_statistics();
        forwarded
    }

    /// Queue a frame for transmission on the next poll cycle.
    pub fn send_can_message_queued(&mut self, frame: CanFrame) {
        self.one_shot.push_back(frame);
    }

    /// Augment and transmit a frame immediately.
    ///
    /// Counter/CRC ids get their counter and CRC bytes rewritten; ids
    /// configured for inverted duplication are followed by the inverted copy
    /// at `id + 1`. Every transmitted frame is mirrored to the loggers.
    pub fn send_can_message_direct(&mut self, frame: CanFrame) -> Result<()> {
        let id = frame.id();
        let mut data = *frame.data();
        data[COUNTER_OFFSET] = self.auto_support.next_counter(id, data[COUNTER_OFFSET]);
        data[CRC_OFFSET] =
            self.auto_support
                .compute_crc(id, &data[..COUNTER_OFFSET], data[CRC_OFFSET]);
        let frame = frame.with_data(data);

        self.transmit(&frame)?;

        if self.auto_support.should_duplicate_inverted(id) {
            let duplicate_id = id.wrapping_add(1);
            let id_max = if frame.is_extended() {
                EXTENDED_ID_MAX
            } else {
                STANDARD_ID_MAX
            };
            if duplicate_id > id_max {
                warn!(
                    id = format_args!("{id:#x}"),
                    duplicate_id = format_args!("{duplicate_id:#x}"),
                    extended = frame.is_extended(),
                    "inverted duplicate id out of range"
                );
            }
            let duplicate = frame
                .with_id(duplicate_id)
                .with_data(AutoSupportEngine::invert_payload(&data));
            self.transmit(&duplicate)?;
        }
        Ok(())
    }

    /// Add a message to the cyclic schedule. It is due immediately.
    ///
    /// An interval of 0 is treated as 1 ms.
    pub fn add_cyclic_can_message(
        &mut self,
        frame: CanFrame,
        interval_ms: u64,
        auto_support_enabled: bool,
        protocol: AutoSupportProtocol,
    ) {
        self.auto_support
            .configure(frame.id(), auto_support_enabled, protocol);

        let mut entry = CyclicMessageConfig::new(frame, interval_ms, self.clock.now_ms());
        entry.auto_support = auto_support_enabled.then_some(protocol);
        debug!(%frame, interval_ms, auto_support = ?entry.auto_support, "cyclic message added");
        self.cyclic.push(entry);
    }

    /// Remove the first cyclic entry matching `frame`.
    ///
    /// The id's counter restarts only once no other entry uses that id.
    /// Returns false if nothing matched.
    pub fn remove_cyclic_can_message(&mut self, frame: &CanFrame) -> bool {
        let Some(index) = self.cyclic.iter().position(|entry| entry.matches(frame)) else {
            return false;
        };
        let entry = self.cyclic.remove(index);
        let id = entry.frame.id();
        if !self.cyclic.iter().any(|other| other.frame.id() == id) {
            self.auto_support.reset_counter(id);
        }
        debug!(frame = %entry.frame, "cyclic message removed");
        true
    }

    pub fn remove_all_cyclic_can_messages(&mut self) {
        for entry in self.cyclic.drain(..) {
            self.auto_support.reset_counter(entry.frame.id());
        }
    }

    /// Drop everything waiting in this driver's receive queue.
    pub fn clear_rx_messages(&self) -> Result<()> {
        self.dispatcher.clear_queue(self.handle)?;
        Ok(())
    }

    /// Configure auto-support for frames sent directly by id.
    pub fn configure_auto_support(&mut self, id: u32, enabled: bool, protocol: AutoSupportProtocol) {
        self.auto_support.configure(id, enabled, protocol);
    }

    /// Forget every auto-support configuration and counter.
    pub fn clear_auto_support(&mut self) {
        self.auto_support.clear_all();
    }

    pub fn set_bitrate(&mut self, bitrate_kbps: u32) {
        self.bus_load.set_bitrate(bitrate_kbps);
    }

    pub fn state(&self) -> LoggingState {
        self.state
    }

    pub fn tx_counter(&self) -> u32 {
        self.tx_counter
    }

    pub fn tx_error_counter(&self) -> u32 {
        self.tx_errors
    }

    pub fn cyclic_count(&self) -> usize {
        self.cyclic.len()
    }

    pub fn cyclic_messages(&self) -> &[CyclicMessageConfig] {
        &self.cyclic
    }

    /// One-shot frames waiting for the next poll cycle.
    pub fn pending_count(&self) -> usize {
        self.one_shot.len()
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn auto_support(&self) -> &AutoSupportEngine {
        &self.auto_support
    }

    fn transmit_pending(&mut self) {
        while let Some(frame) = self.one_shot.pop_front() {
            if let Err(err) = self.send_can_message_direct(frame) {
                debug!(%frame, %err, "queued send failed");
            }
        }

        let now_ms = self.clock.now_ms();
        for index in 0..self.cyclic.len() {
            if !self.cyclic[index].is_due(now_ms) {
                continue;
            }
            let frame = self.cyclic[index].frame;
            if let Err(err) = self.send_can_message_direct(frame) {
                debug!(%frame, %err, "cyclic send failed");
            }
            let sent_at = self.clock.now_ms();
            self.cyclic[index].reschedule(sent_at);
        }
    }

    fn transmit(&mut self, frame: &CanFrame) -> Result<()> {
        if let Err(err) = self.dispatcher.transport().send_one_frame(frame) {
            self.tx_errors = self.tx_errors.saturating_add(1);
            return Err(err.into());
        }
        self.tx_counter = self.tx_counter.saturating_add(1);

        let echoed = frame.with_timestamp(self.clock.now_us());
        for logger in &mut self.loggers {
            logger.handle_frame(&echoed, true);
        }
        Ok(())
    }

    fn drain_received(&mut self) -> usize {
        let mut forwarded = 0usize;
        loop {
            match self.dispatcher.read_from_queue(self.handle) {
                Ok(frame) => {
                    if !frame.is_well_formed() {
                        warn!(id = frame.id(), dlc = frame.dlc(), "discarding malformed frame");
                        continue;
                    }
                    for logger in &mut self.loggers {
                        logger.handle_frame(&frame, false);
                    }
                    self.bus_load.record(&frame);
                    forwarded += 1;
                }
                Err(DispatchError::WouldBlock) => break,
                Err(err) => {
                    warn!(client = %self.handle, %err, "driver queue unavailable");
                    return forwarded;
                }
            }
        }

        match self.dispatcher.queue_status(self.handle) {
            Ok(QueueStatus::Ok) | Err(_) => {}
            Ok(status) => warn!(client = %self.handle, ?status, "receive queue dropped frames"),
        }
        forwarded
    }

    fn push_statistics(&mut self) {
        let started = self.state == LoggingState::Started;

        if let Some(load) = self.bus_load.poll(self.clock.now_us()) {
            let load = if started { load } else { 0 };
            for logger in &mut self.loggers {
                logger.update_bus_load(load);
            }
        }

        let (tx_counter, tx_errors) = if started {
            (self.tx_counter, self.tx_errors)
        } else {
            (0, 0)
        };
        for logger in &mut self.loggers {
            logger.update_tx_counter(tx_counter);
            logger.update_tx_errors(tx_errors);
        }
    }
}

impl Drop for ComDriver {
    fn drop(&mut self) {
        if let Err(err) = self.dispatcher.remove_client(self.handle) {
            debug!(client = %self.handle, %err, "driver client already gone");
        }
    }
}

impl std::fmt::Debug for ComDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComDriver")
            .field("client", &self.handle)
            .field("state", &self.state)
            .field("cyclic", &self.cyclic.len())
            .field("pending", &self.one_shot.len())
            .field("loggers", &self.loggers.len())
            .field("tx_counter", &self.tx_counter)
            .field("tx_errors", &self.tx_errors)
            .finish()
    }
}
