//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory storage region.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Crash simulations (see [`InMemoryBackend::snapshot`])
/// - Ephemeral event logs that don't need persistence
///
/// Clones share the same underlying bytes, so a test can keep a handle to
/// the region after moving a clone into a ring buffer and "reboot" by
/// opening a new ring over it.
///
/// # Example
///
/// ```rust
/// use eventlink_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// backend.write_at(0, b"test data").unwrap();
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites a single byte. Test helper for corruption scenarios.
    pub fn poke(&self, offset: usize, value: u8) {
        let mut data = self.data.write();
        if offset < data.len() {
            data[offset] = value;
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn write_at(&mut self, offset: u64, new_data: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        let start = offset as usize;
        let end = start + new_data.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(new_data);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        // In-memory backend has no pending writes
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn set_len(&mut self, new_size: u64) -> StorageResult<()> {
        self.data.write().resize(new_size as usize, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.snapshot().is_empty());
    }

    #[test]
    fn memory_write_extends_with_zeros() {
        let mut backend = InMemoryBackend::new();
        backend.write_at(3, b"xy").unwrap();
        assert_eq!(backend.snapshot(), vec![0, 0, 0, b'x', b'y']);
    }

    #[test]
    fn memory_read_at_returns_correct_data() {
        let mut backend = InMemoryBackend::new();
        backend.write_at(0, b"hello world").unwrap();

        assert_eq!(&backend.read_at(0, 5).unwrap(), b"hello");
        assert_eq!(&backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn memory_read_at_extending_past_end_fails() {
        let mut backend = InMemoryBackend::new();
        backend.write_at(0, b"hello").unwrap();

        let result = backend.read_at(3, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_clones_share_bytes() {
        let backend = InMemoryBackend::new();
        let mut writer = backend.clone();
        writer.write_at(0, b"shared").unwrap();
        assert_eq!(&backend.read_at(0, 6).unwrap(), b"shared");
    }

    #[test]
    fn memory_with_data_and_poke() {
        let backend = InMemoryBackend::with_data(b"preloaded".to_vec());
        backend.poke(0, b'P');
        assert_eq!(&backend.read_at(0, 9).unwrap(), b"Preloaded");
        // out of range pokes are ignored
        backend.poke(100, 1);
        assert_eq!(backend.size().unwrap(), 9);
    }

    #[test]
    fn memory_set_len() {
        let mut backend = InMemoryBackend::new();
        backend.write_at(0, b"hello").unwrap();
        backend.set_len(8).unwrap();
        assert_eq!(backend.read_at(5, 3).unwrap(), vec![0, 0, 0]);
        backend.set_len(2).unwrap();
        assert_eq!(backend.snapshot(), b"he".to_vec());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn last_write_wins(
                writes in proptest::collection::vec((0u64..64, proptest::collection::vec(any::<u8>(), 1..16)), 1..20)
            ) {
                let mut backend = InMemoryBackend::new();
                let mut model: Vec<u8> = Vec::new();
                for (offset, bytes) in &writes {
                    backend.write_at(*offset, bytes).unwrap();
                    let end = *offset as usize + bytes.len();
                    if end > model.len() {
                        model.resize(end, 0);
                    }
                    model[*offset as usize..end].copy_from_slice(bytes);
                }
                prop_assert_eq!(backend.snapshot(), model);
            }
        }
    }
}
