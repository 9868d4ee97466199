//! # EventLink Core
//!
//! Durable storage for device events.
//!
//! This crate provides:
//! - [`RingBuffer`] - a circular byte store with crash-recoverable cursors
//! - [`EventLog`] - fixed-size event records with monotonic IDs on top of it
//! - [`Clock`] - the time source collaborator used to stamp events
//!
//! ## Key Invariants
//!
//! - Items are returned oldest first; only eviction ever skips an item
//! - `read == write` if and only if the buffer is empty
//! - Cursors are flushed before a mutating call returns, so recovery after
//!   power loss sees exactly the last flushed state
//! - Every stored event record is exactly `block_size` bytes long

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
pub mod event;
pub mod ring;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LogConfig;
pub use error::{CoreError, CoreResult};
pub use event::{Command, EventLog, EventRecord, LogStatus, PullOutcome, RECORD_HEADER_LEN};
pub use ring::{
    HeaderStore, RingBuffer, RingStats, DATA_START, HEADER_COPY_LEN, HEADER_LEN, ITEM_SIZE_LEN,
};
