//! # EventLink Storage
//!
//! Storage region trait and implementations for EventLink.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! event ring buffer. Backends are **opaque byte regions** - they do not
//! interpret the data they store.
//!
//! ## Design Principles
//!
//! - Backends are fixed-offset byte regions (read, write, flush)
//! - No knowledge of ring cursors, slots or event records
//! - Must be `Send + Sync` for concurrent access
//! - The ring buffer owns all format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! Header values can alternatively live in a [`FieldStore`], a small durable
//! key-value store such as the non-volatile storage of a microcontroller.
//!
//! ## Example
//!
//! ```rust
//! use eventlink_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.write_at(4, b"hello").unwrap();
//! assert_eq!(backend.size().unwrap(), 9);
//! assert_eq!(&backend.read_at(4, 5).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod fields;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use fields::{FieldStore, InMemoryFieldStore};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
