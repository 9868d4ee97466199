//! Power-loss simulation.
//!
//! [`CrashableBackend`] wraps a real backend and stops writing once a byte
//! budget is used up, leaving the last write torn at the budget boundary.
//! Everything written before the crash stays in the wrapped backend, so a
//! test can reopen a ring over it and check what recovery makes of it.

use eventlink_storage::{StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared crash controls for a [`CrashableBackend`].
///
/// The backend is usually moved into a ring buffer, so tests arm it through
/// this handle.
#[derive(Debug)]
pub struct CrashSwitch {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_flush: AtomicBool,
}

impl Default for CrashSwitch {
    fn default() -> Self {
        Self {
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_flush: AtomicBool::new(false),
        }
    }
}

impl CrashSwitch {
    /// Crashes once `bytes` more bytes have been written.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Sets whether the next flush crashes.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Clears the crash state; the backend accepts writes again.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_flush.store(false, Ordering::SeqCst);
    }

    /// Returns whether the backend has crashed.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Total bytes written through the backend.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::SeqCst)
    }

    fn crash(&self, what: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("simulated crash during {what}"),
        ))
    }
}

/// A storage backend wrapper that can simulate crashes.
///
/// After a crash every write, flush and resize fails until the switch is
/// reset. Reads keep working.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    switch: Arc<CrashSwitch>,
}

impl CrashableBackend {
    /// Creates a new crashable backend wrapping an inner backend.
    pub fn new(inner: impl StorageBackend + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            switch: Arc::new(CrashSwitch::default()),
        }
    }

    /// Returns the crash controls.
    pub fn switch(&self) -> Arc<CrashSwitch> {
        Arc::clone(&self.switch)
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        if self.switch.has_crashed() {
            return Err(self.switch.crash("write"));
        }
        let current = self
            .switch
            .bytes_written
            .fetch_add(data.len(), Ordering::SeqCst);
        let threshold = self.switch.crash_after_bytes.load(Ordering::SeqCst);

        if current >= threshold {
            return Err(self.switch.crash("write"));
        }

        // Check if this write will cross the crash threshold
        if current + data.len() > threshold {
            let partial_len = threshold - current;
            if partial_len > 0 {
                self.inner.write_at(offset, &data[..partial_len])?;
            }
            return Err(self.switch.crash("partial write"));
        }

        self.inner.write_at(offset, data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.switch.has_crashed() || self.switch.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.switch.crash("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.switch.has_crashed() || self.switch.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.switch.crash("sync"));
        }
        self.inner.sync()
    }

    fn set_len(&mut self, new_size: u64) -> StorageResult<()> {
        if self.switch.has_crashed() {
            return Err(self.switch.crash("resize"));
        }
        self.inner.set_len(new_size)
    }
}

impl std::fmt::Debug for CrashableBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashableBackend")
            .field("switch", &self.switch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventlink_storage::InMemoryBackend;

    #[test]
    fn passes_writes_through_until_armed() {
        let storage = InMemoryBackend::new();
        let mut backend = CrashableBackend::new(storage.clone());
        backend.write_at(0, b"hello").unwrap();
        backend.flush().unwrap();
        assert_eq!(storage.snapshot(), b"hello".to_vec());
        assert_eq!(backend.switch().bytes_written(), 5);
    }

    #[test]
    fn torn_write_at_threshold() {
        let storage = InMemoryBackend::new();
        let mut backend = CrashableBackend::new(storage.clone());
        let switch = backend.switch();
        backend.write_at(0, b"abc").unwrap();

        switch.crash_after(2);
        assert!(backend.write_at(3, b"defg").is_err());
        assert!(switch.has_crashed());
        assert_eq!(storage.snapshot(), b"abcde".to_vec());

        // powered off
        assert!(backend.write_at(0, b"x").is_err());
        assert!(backend.flush().is_err());
        assert_eq!(storage.snapshot(), b"abcde".to_vec());

        switch.reset();
        backend.write_at(0, b"x").unwrap();
        assert_eq!(storage.snapshot(), b"xbcde".to_vec());
    }

    #[test]
    fn failing_flush() {
        let mut backend = CrashableBackend::new(InMemoryBackend::new());
        let switch = backend.switch();
        switch.set_fail_on_flush(true);
        backend.write_at(0, b"data").unwrap();
        assert!(backend.flush().is_err());
        assert!(backend.sync().is_err());
        assert!(switch.has_crashed());
    }
}
