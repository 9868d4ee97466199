//! Fixed-size event records on top of the ring buffer.
//!
//! ## Block Format
//!
//! ```text
//! | id (2) | command (1) | timestamp (4) | data (block_size - 7, zero padded) |
//! ```
//!
//! All integers are little-endian. Every stored block is exactly
//! `block_size` bytes; longer data is truncated.

mod log;
mod record;

pub use log::{EventLog, LogStatus, PullOutcome};
pub use record::{Command, EventRecord, RECORD_HEADER_LEN};
