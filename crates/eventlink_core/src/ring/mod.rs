//! Durable circular byte buffer.
//!
//! The ring buffer is the foundation of EventLink's durability guarantees.
//! Every item is flushed to the storage region, together with the cursors
//! describing it, before `put` returns.
//!
//! ## Region Layout
//!
//! ```text
//! | header copy A (48) | header copy B (48) | data (capacity + 1) |
//!
//! header copy:
//! | read (8) | write (8) | sequence (8) | ack (8) | generation (8) | crc32 (4) | pad (4) |
//! ```
//!
//! The header values are little-endian `u64`. Inline, every update goes to
//! the copy holding the older generation, so the newest valid copy is always
//! a fully flushed header. With a [`eventlink_storage::FieldStore`] the four
//! values are stored as fields instead; the header bytes are reserved in the
//! region either way so positions do not change.
//!
//! ## Slot Format
//!
//! ```text
//! | length (4) | payload (length) |
//! ```
//!
//! Slots form a continuous byte stream modulo the data region length: a slot
//! that reaches the end of the region continues at the data start.
//!
//! ## Recovery Policy
//!
//! - The valid header copy with the highest generation is used
//! - A stored cursor of 0 means "never written" and maps to the data start
//! - A write cursor outside the data region is rebuilt by walking the slots
//!   from the read cursor; a read cursor outside it empties the buffer at
//!   the write cursor
//! - Walking from read to write, the first slot with a zero, oversized or
//!   overrunning length ends the data; the write cursor is pulled back to it
//!
//! ## Invariants
//!
//! - One byte of the data region always stays free, so `read == write`
//!   means empty
//! - Eviction only ever drops the oldest item
//! - Cursors are persisted after the bytes they describe

mod buffer;
mod header;

pub use buffer::{RingBuffer, RingStats};
pub use header::{Header, HeaderStore, DATA_START, HEADER_COPY_LEN, HEADER_LEN, ITEM_SIZE_LEN};
