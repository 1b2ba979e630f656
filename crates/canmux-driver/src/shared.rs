use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canmux_frame::CanFrame;

use crate::autosupport::AutoSupportProtocol;
use crate::config::DriverConfig;
use crate::driver::{ComDriver, LoggingState};
use crate::error::Result;
use crate::logger::FrameLogger;

/// [`ComDriver`] behind one coarse lock.
///
/// Every entry point takes the lock for its whole duration, so concurrent
/// callers are serialized in the order they acquire it. Clones share the same
/// driver.
#[derive(Debug, Clone)]
pub struct SharedComDriver {
    inner: Arc<Mutex<ComDriver>>,
}

impl SharedComDriver {
    pub fn new(driver: ComDriver) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    /// Run `f` with exclusive access to the driver.
    pub fn with_driver<T>(&self, f: impl FnOnce(&mut ComDriver) -> T) -> T {
        f(&mut self.lock())
    }

    pub fn apply_config(&self, config: &DriverConfig) -> Result<()> {
        self.lock().apply_config(config)
    }

    pub fn add_logger(&self, logger: Box<dyn FrameLogger>) {
        self.lock().add_logger(logger);
    }

    pub fn start_logging(&self) {
        self.lock().start_logging();
    }

    pub fn pause_logging(&self) {
        self.lock().pause_logging();
    }

    pub fn continue_logging(&self) {
        self.lock().continue_logging();
    }

    pub fn stop_logging(&self) {
        self.lock().stop_logging();
    }

    pub fn distribute_messages(&self) -> usize {
        self.lock().distribute_messages()
    }

    pub fn send_can_message_queued(&self, frame: CanFrame) {
        self.lock().send_can_message_queued(frame);
    }

    pub fn send_can_message_direct(&self, frame: CanFrame) -> Result<()> {
        self.lock().send_can_message_direct(frame)
    }

    pub fn add_cyclic_can_message(
        &self,
        frame: CanFrame,
        interval_ms: u64,
        auto_support_enabled: bool,
        protocol: AutoSupportProtocol,
    ) {
        self.lock()
            .add_cyclic_can_message(frame, interval_ms, auto_support_enabled, protocol);
    }

    pub fn remove_cyclic_can_message(&self, frame: &CanFrame) -> bool {
        self.lock().remove_cyclic_can_message(frame)
    }

    pub fn remove_all_cyclic_can_messages(&self) {
        self.lock().remove_all_cyclic_can_messages();
    }

    pub fn clear_rx_messages(&self) -> Result<()> {
        self.lock().clear_rx_messages()
    }

    pub fn configure_auto_support(&self, id: u32, enabled: bool, protocol: AutoSupportProtocol) {
        self.lock().configure_auto_support(id, enabled, protocol);
    }

    pub fn clear_auto_support(&self) {
        self.lock().clear_auto_support();
    }

    pub fn set_bitrate(&self, bitrate_kbps: u32) {
        self.lock().set_bitrate(bitrate_kbps);
    }

    pub fn state(&self) -> LoggingState {
        self.lock().state()
    }

    pub fn tx_counter(&self) -> u32 {
        self.lock().tx_counter()
    }

    pub fn tx_error_counter(&self) -> u32 {
        self.lock().tx_error_counter()
    }

    pub fn cyclic_count(&self) -> usize {
        self.lock().cyclic_count()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending_count()
    }

    fn lock(&self) -> MutexGuard<'_, ComDriver> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<ComDriver> for SharedComDriver {
    fn from(driver: ComDriver) -> Self {
        Self::new(driver)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use canmux_dispatch::Dispatcher;
    use canmux_transport::VirtualChannel;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CyclicMessageSpec;

    fn shared() -> (Arc<VirtualChannel>, SharedComDriver) {
        let channel = Arc::new(VirtualChannel::new("vcan-shared"));
        let dispatcher = Arc::new(Dispatcher::new(channel.clone()));
        let driver = ComDriver::with_clock(
            dispatcher,
            &DriverConfig::default(),
            Arc::new(ManualClock::new()),
        )
        .unwrap();
        (channel, SharedComDriver::new(driver))
    }

    #[test]
    fn concurrent_callers_are_serialized() {
        let (channel, driver) = shared();
        driver.configure_auto_support(0x100, true, AutoSupportProtocol::CounterCrc);
        driver.start_logging();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let driver = driver.clone();
                thread::spawn(move || {
                    for _ in 0..64 {
                        let frame = CanFrame::new(0x100, false, &[0; 8]).unwrap();
                        driver.send_can_message_direct(frame).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(driver.tx_counter(), 256);
        let counters: Vec<u8> = channel.take_sent().iter().map(|f| f.data()[6]).collect();
        let expected: Vec<u8> = (0..256u32).map(|n| n as u8).collect();
        assert_eq!(counters, expected);
    }

    #[test]
    fn queued_sends_from_threads_all_go_out() {
        let (channel, driver) = shared();
        let workers: Vec<_> = (0..4u32)
            .map(|worker| {
                let driver = driver.clone();
                thread::spawn(move || {
                    for n in 0..10u32 {
                        let id = worker * 0x10 + n;
                        driver.send_can_message_queued(CanFrame::new(id, false, &[]).unwrap());
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(driver.pending_count(), 40);
        driver.distribute_messages();
        assert_eq!(channel.sent_frames().len(), 40);
        assert_eq!(driver.pending_count(), 0);
    }

    #[test]
    fn with_driver_exposes_full_api() {
        let (_channel, driver) = shared();
        let handle = driver.with_driver(|inner| inner.handle());
        assert_eq!(handle.raw(), 0);
        assert_eq!(driver.state(), LoggingState::Stopped);
    }

    #[test]
    fn configuration_entry_points_are_forwarded() {
        let (channel, driver) = shared();
        let config = DriverConfig {
            cyclic: vec![CyclicMessageSpec {
                id: 0x120,
                extended: false,
                remote: false,
                data: vec![0; 8],
                interval_ms: 100,
                auto_support: Some(AutoSupportProtocol::CounterCrc),
            }],
            ..DriverConfig::default()
        };
        driver.apply_config(&config).unwrap();
        driver.set_bitrate(250);
        assert_eq!(driver.cyclic_count(), 1);

        driver.distribute_messages();
        assert_eq!(channel.take_sent()[0].data()[7], 0xD7);

        driver.clear_auto_support();
        assert!(driver.with_driver(|inner| inner.auto_support().protocol(0x120).is_none()));
    }
}
