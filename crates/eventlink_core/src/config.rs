//! Event log configuration.

use crate::error::{CoreError, CoreResult};
use crate::event::RECORD_HEADER_LEN;
use crate::ring::ITEM_SIZE_LEN;
use serde::{Deserialize, Serialize};

/// Configuration for opening an event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Size in bytes of one stored event block (7 header bytes + payload).
    pub block_size: usize,

    /// Number of events the ring buffer holds before evicting the oldest.
    pub max_events: usize,

    /// Event IDs roll over to 0 when they reach this value.
    pub max_event_id: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            block_size: 18,
            max_events: 1000,
            max_event_id: 0xFFFE,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event block size.
    #[must_use]
    pub const fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the number of events the buffer holds.
    #[must_use]
    pub const fn max_events(mut self, count: usize) -> Self {
        self.max_events = count;
        self
    }

    /// Sets the event ID rollover value.
    #[must_use]
    pub const fn max_event_id(mut self, id: u32) -> Self {
        self.max_event_id = id;
        self
    }

    /// Ring buffer capacity in bytes: one length-prefixed block per event.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        (self.max_events * (self.block_size + ITEM_SIZE_LEN as usize)) as u64
    }

    /// Checks that the values describe a usable log.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the block cannot hold the
    /// record header, the buffer holds no events, or IDs do not fit the
    /// 2-byte ID field.
    pub fn validate(&self) -> CoreResult<()> {
        if self.block_size < RECORD_HEADER_LEN {
            return Err(CoreError::invalid_config(format!(
                "block size {} is smaller than the {RECORD_HEADER_LEN}-byte record header",
                self.block_size
            )));
        }
        if self.max_events == 0 {
            return Err(CoreError::invalid_config("max_events must be at least 1"));
        }
        if self.max_event_id == 0 || self.max_event_id > 0x1_0000 {
            return Err(CoreError::invalid_config(format!(
                "max_event_id {} does not fit a 2-byte event ID",
                self.max_event_id
            )));
        }
        Ok(())
    }
}
