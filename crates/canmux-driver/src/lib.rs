//! CAN communication driver.
//!
//! [`ComDriver`] sits on top of a shared [`Dispatcher`](canmux_dispatch::Dispatcher):
//! it transmits one-shot and cyclic messages (with optional counter/CRC or
//! inverted-duplicate augmentation), receives through its own dispatch
//! client, and reports traffic and statistics to pluggable loggers.

pub mod autosupport;
pub mod bus_load;
pub mod clock;
pub mod config;
pub mod cyclic;
pub mod driver;
pub mod error;
pub mod logger;
pub mod shared;

pub use autosupport::{auto_support_crc, crc8, AutoSupportEngine, AutoSupportProtocol, CRC8_SEED, CRC8_TABLE};
pub use bus_load::BusLoadEstimator;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{CyclicMessageSpec, DriverConfig};
pub use cyclic::CyclicMessageConfig;
pub use driver::{ComDriver, LoggingState};
pub use error::{DriverError, Result};
pub use logger::{CaptureLogger, FrameLogger, StatsLogger, StatsSnapshot, TracingLogger};
pub use shared::SharedComDriver;
