//! Ready-made logs for tests.

use eventlink_core::{Clock, EventLog, HeaderStore, LogConfig, ManualClock};
use eventlink_storage::{FileBackend, InMemoryBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Start time of fixture clocks.
pub const FIXTURE_TIME: u32 = 1_700_000_000;

/// An event log over shared in-memory storage.
///
/// Reopening over [`MemoryLog::storage`] simulates a reboot.
#[derive(Debug)]
pub struct MemoryLog {
    /// The open log.
    pub log: Arc<EventLog>,
    /// The bytes under the log.
    pub storage: InMemoryBackend,
    /// The clock stamping events.
    pub clock: Arc<ManualClock>,
}

impl MemoryLog {
    /// Opens a fresh log.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    #[must_use]
    pub fn open(config: LogConfig) -> Self {
        let storage = InMemoryBackend::new();
        let clock = Arc::new(ManualClock::new(FIXTURE_TIME));
        let log = open_memory_log(&storage, config, &clock);
        Self {
            log,
            storage,
            clock,
        }
    }

    /// Drops the log and opens a new one over the same storage.
    ///
    /// # Panics
    ///
    /// Panics if the stored region cannot be opened.
    #[must_use]
    pub fn reopen(self) -> Self {
        let config = self.log.config().clone();
        drop(self.log);
        let log = open_memory_log(&self.storage, config, &self.clock);
        Self { log, ..self }
    }
}

fn open_memory_log(
    storage: &InMemoryBackend,
    config: LogConfig,
    clock: &Arc<ManualClock>,
) -> Arc<EventLog> {
    let clock: Arc<dyn Clock> = clock.clone();
    Arc::new(
        EventLog::open(storage.clone(), HeaderStore::inline(), config, clock)
            .expect("open in-memory event log"),
    )
}

/// A temporary directory holding an event file.
#[derive(Debug)]
pub struct TempEventFile {
    dir: TempDir,
    path: PathBuf,
}

impl TempEventFile {
    /// Creates a temporary directory; the event file itself does not exist yet.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("events.bin");
        Self { dir, path }
    }

    /// Path of the event file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the event file.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Opens an event log over the file.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be opened.
    #[must_use]
    pub fn open_log(&self, config: LogConfig, clock: Arc<ManualClock>) -> EventLog {
        let backend = FileBackend::open(&self.path).expect("open event file");
        EventLog::open(backend, HeaderStore::inline(), config, clock).expect("open event log")
    }
}

impl Default for TempEventFile {
    fn default() -> Self {
        Self::new()
    }
}
