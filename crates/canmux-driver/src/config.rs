use std::fs;
use std::path::Path;

use canmux_dispatch::DEFAULT_QUEUE_SIZE;
use canmux_frame::{CanFrame, MAX_DLC};
use serde::{Deserialize, Serialize};

use crate::autosupport::AutoSupportProtocol;
use crate::error::{DriverError, Result};

/// Driver settings, loadable from JSON.
///
/// Every field is optional in the JSON form; missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Nominal bus bitrate in kbit/s, used for the load estimate.
    pub bitrate_kbps: u32,
    /// Bound of the driver's own receive queue.
    pub rx_queue_size: usize,
    /// Minimum bus load measurement window.
    pub load_window_ms: u64,
    /// Messages registered for cyclic transmission by `apply_config`.
    pub cyclic: Vec<CyclicMessageSpec>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            bitrate_kbps: 500,
            rx_queue_size: DEFAULT_QUEUE_SIZE,
            load_window_ms: 1000,
            cyclic: Vec::new(),
        }
    }
}

/// One cyclic message as written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CyclicMessageSpec {
    pub id: u32,
    #[serde(default)]
    pub extended: bool,
    #[serde(default)]
    pub remote: bool,
    /// Payload bytes; for remote frames only the length is used.
    #[serde(default)]
    pub data: Vec<u8>,
    pub interval_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_support: Option<AutoSupportProtocol>,
}

impl CyclicMessageSpec {
    pub fn to_frame(&self) -> Result<CanFrame> {
        let frame = if self.remote {
            let dlc = u8::try_from(self.data.len()).unwrap_or(u8::MAX);
            CanFrame::new_remote(self.id, self.extended, dlc)?
        } else {
            CanFrame::new(self.id, self.extended, &self.data)?
        };
        Ok(frame)
    }
}

impl DriverConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bitrate_kbps == 0 {
            return Err(DriverError::Config("bitrate_kbps must be > 0".to_string()));
        }
        if self.rx_queue_size == 0 {
            return Err(DriverError::Config("rx_queue_size must be > 0".to_string()));
        }
        for (index, spec) in self.cyclic.iter().enumerate() {
            if spec.data.len() > MAX_DLC {
                return Err(DriverError::Config(format!(
                    "cyclic[{index}]: {} data bytes (max {MAX_DLC})",
                    spec.data.len()
                )));
            }
            if spec.interval_ms == 0 {
                return Err(DriverError::Config(format!(
                    "cyclic[{index}]: interval_ms must be > 0"
                )));
            }
            spec.to_frame()?;
        }
        Ok(())
    }
}
