//! # EventLink Testkit
//!
//! Test utilities for EventLink.
//!
//! This crate provides:
//! - A storage backend that simulates power loss mid-write
//! - A reference model of the ring buffer
//! - Property-based test generators using proptest
//! - Fixtures for memory- and file-backed event logs
//!
//! ## Usage
//!
//! ```rust
//! use eventlink_testkit::prelude::*;
//! use eventlink_core::{HeaderStore, RingBuffer};
//! use eventlink_storage::InMemoryBackend;
//!
//! let storage = InMemoryBackend::new();
//! let backend = CrashableBackend::new(storage.clone());
//! let switch = backend.switch();
//! let mut ring = RingBuffer::open(backend, 64, HeaderStore::inline()).unwrap();
//!
//! switch.crash_after(3);
//! assert!(ring.put(b"lost").is_err());
//! assert!(switch.has_crashed());
//!
//! // "reboot" over the same bytes
//! let ring = RingBuffer::open(storage, 64, HeaderStore::inline()).unwrap();
//! assert!(ring.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use model::*;
