//! Counter/CRC augmentation for safety-protocol messages.
//!
//! Messages configured for [`AutoSupportProtocol::CounterCrc`] carry a rolling
//! counter in payload byte 6 and a CRC8 over bytes 0..6 in byte 7. Messages
//! configured for [`AutoSupportProtocol::InvertedDuplicate`] are followed on
//! the bus by a copy at `id + 1` with every payload bit inverted. Any other id
//! passes through untouched.

use std::collections::HashMap;

use canmux_frame::MAX_DLC;
use serde::{Deserialize, Serialize};

/// Initial value of the CRC8 register.
pub const CRC8_SEED: u8 = 0xEC;

/// Generator polynomial (SAE J1850, MSB-first).
pub const CRC8_POLY: u8 = 0x1D;

/// Lookup table for [`CRC8_POLY`].
pub static CRC8_TABLE: [u8; 256] = build_table(CRC8_POLY);

const fn build_table(poly: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Table-driven CRC8 without final XOR.
pub fn crc8(seed: u8, table: &[u8; 256], bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(seed, |crc, &byte| table[usize::from(crc ^ byte)])
}

/// CRC8 as carried in byte 7 of counter/CRC messages.
pub fn auto_support_crc(bytes: &[u8]) -> u8 {
    crc8(CRC8_SEED, &CRC8_TABLE, bytes)
}

/// Safety sub-protocol a message id is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSupportProtocol {
    /// Rolling counter in byte 6, CRC8 in byte 7.
    CounterCrc,
    /// Inverted copy sent at `id + 1`.
    InvertedDuplicate,
    /// Configured, but neither augmentation applies.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IdConfig {
    enabled: bool,
    protocol: AutoSupportProtocol,
}

/// Per-message-id auto-support state.
///
/// Lookups never create entries: an id that was never configured is a
/// transparent passthrough and leaves no trace in the engine.
#[derive(Debug, Default, Clone)]
pub struct AutoSupportEngine {
    config: HashMap<u32, IdConfig>,
    counters: HashMap<u32, u8>,
}

impl AutoSupportEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or update the protocol of `id`. The counter is kept.
    pub fn configure(&mut self, id: u32, enabled: bool, protocol: AutoSupportProtocol) {
        self.config.insert(id, IdConfig { enabled, protocol });
    }

    pub fn protocol(&self, id: u32) -> Option<AutoSupportProtocol> {
        self.config
            .get(&id)
            .filter(|config| config.enabled)
            .map(|config| config.protocol)
    }

    /// True if `id` is enabled for the counter/CRC protocol.
    pub fn is_counter_crc(&self, id: u32) -> bool {
        self.protocol(id) == Some(AutoSupportProtocol::CounterCrc)
    }

    /// Counter byte for the next transmission of `id`.
    ///
    /// For counter/CRC ids this returns the stored counter (starting at 0)
    /// and advances it, wrapping 255 to 0. Other ids get `current` back.
    pub fn next_counter(&mut self, id: u32, current: u8) -> u8 {
        if !self.is_counter_crc(id) {
            return current;
        }
        let counter = self.counters.entry(id).or_insert(0);
        let value = *counter;
        *counter = counter.wrapping_add(1);
        value
    }

    /// CRC byte for `id` over `covered`, or `current` for other ids.
    pub fn compute_crc(&self, id: u32, covered: &[u8], current: u8) -> u8 {
        if self.is_counter_crc(id) {
            auto_support_crc(covered)
        } else {
            current
        }
    }

    pub fn should_duplicate_inverted(&self, id: u32) -> bool {
        self.protocol(id) == Some(AutoSupportProtocol::InvertedDuplicate)
    }

    /// Bitwise NOT of every payload byte.
    pub fn invert_payload(src: &[u8; MAX_DLC]) -> [u8; MAX_DLC] {
        src.map(|byte| !byte)
    }

    /// Restart the counter sequence of a counter/CRC id.
    pub fn reset_counter(&mut self, id: u32) {
        if self.is_counter_crc(id) {
            self.counters.remove(&id);
        }
    }

    /// Restart every counter sequence, keeping the configuration.
    pub fn reset_counters(&mut self) {
        self.counters.clear();
    }

    /// Forget every configuration and counter.
    pub fn clear_all(&mut self) {
        self.config.clear();
        self.counters.clear();
    }

    /// Number of ids with a live counter.
    pub fn active_counters(&self) -> usize {
        self.counters.len()
    }
}
