//! Durable key-value fields for header values.
//!
//! Microcontrollers usually offer a tiny non-volatile key-value store next to
//! their flash file system. Writing the ring header there avoids rewriting the
//! head of the data file on every cursor move.

use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A durable store of named integer fields.
pub trait FieldStore: Send + Sync {
    /// Reads the value stored under `key`, or `None` if it was never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    fn read_field(&self, key: &str) -> StorageResult<Option<u64>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be written.
    fn write_field(&mut self, key: &str, value: u64) -> StorageResult<()>;

    /// Makes all previous writes durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    fn commit(&mut self) -> StorageResult<()>;
}

/// An in-memory field store.
///
/// Clones share the same fields, so tests can reopen a ring over the
/// "same" non-volatile memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFieldStore {
    fields: Arc<RwLock<BTreeMap<String, u64>>>,
}

impl InMemoryFieldStore {
    /// Creates an empty field store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all stored fields.
    #[must_use]
    pub fn fields(&self) -> BTreeMap<String, u64> {
        self.fields.read().clone()
    }
}

impl FieldStore for InMemoryFieldStore {
    fn read_field(&self, key: &str) -> StorageResult<Option<u64>> {
        Ok(self.fields.read().get(key).copied())
    }

    fn write_field(&mut self, key: &str, value: u64) -> StorageResult<()> {
        self.fields.write().insert(key.to_string(), value);
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_reads_none() {
        let store = InMemoryFieldStore::new();
        assert_eq!(store.read_field("ev0").unwrap(), None);
    }

    #[test]
    fn write_then_read() {
        let mut store = InMemoryFieldStore::new();
        store.write_field("ev8", 54).unwrap();
        store.commit().unwrap();
        assert_eq!(store.read_field("ev8").unwrap(), Some(54));
        assert_eq!(store.fields().len(), 1);
    }

    #[test]
    fn clones_share_fields() {
        let store = InMemoryFieldStore::new();
        let mut other = store.clone();
        other.write_field("ev16", 7).unwrap();
        assert_eq!(store.read_field("ev16").unwrap(), Some(7));
    }
}
