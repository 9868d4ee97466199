//! The event log.

use super::record::{Command, EventRecord};
use crate::clock::Clock;
use crate::config::LogConfig;
use crate::error::{CoreError, CoreResult};
use crate::ring::{HeaderStore, RingBuffer, RingStats};
use eventlink_storage::StorageBackend;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Event ID bookkeeping, guarded by the ID lock.
#[derive(Debug)]
struct IdState {
    /// Last assigned ID, `None` before the first event.
    current: Option<u16>,
    /// Last ID confirmed delivered.
    ack: u16,
}

/// Point-in-time summary of an event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogStatus {
    /// Position of the oldest stored event.
    pub read_position: u64,
    /// Position the next event will be written to.
    pub write_position: u64,
    /// Usable ring bytes.
    pub capacity: u64,
    /// Bytes occupied by stored events.
    pub used_bytes: u64,
    /// Bytes free before the next event evicts.
    pub free_bytes: u64,
    /// Number of stored events.
    pub event_count: usize,
    /// Last assigned event ID.
    pub current_id: Option<u16>,
    /// Last delivered event ID.
    pub ack_id: u16,
    /// Ring activity since open.
    pub stats: RingStats,
}

/// What [`EventLog::pull_next_event_at`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// The expected event was removed.
    Pulled(EventRecord),
    /// The oldest event is no longer the expected one; nothing was removed.
    Moved,
    /// The oldest event cannot be decoded; nothing was removed.
    Unreadable,
}

/// A durable, bounded log of fixed-size events.
///
/// Producers call [`EventLog::add_event`]; a single consumer drains the log
/// with [`EventLog::peek_next_event`] and, once the event is delivered,
/// [`EventLog::pull_next_event`].
///
/// Locks are always taken in the order ID lock, then buffer lock.
///
/// # Example
///
/// ```rust
/// use eventlink_core::{Command, EventLog, HeaderStore, LogConfig, ManualClock};
/// use eventlink_storage::InMemoryBackend;
/// use std::sync::Arc;
///
/// let log = EventLog::open(
///     InMemoryBackend::new(),
///     HeaderStore::inline(),
///     LogConfig::default(),
///     Arc::new(ManualClock::new(1_700_000_000)),
/// )
/// .unwrap();
///
/// let id = log.add_event(Command::TagDetected, Some(&[0xDE, 0xAD, 0xBE, 0xEF])).unwrap();
/// assert_eq!(id, 0);
/// let event = log.peek_next_event().unwrap().unwrap();
/// assert_eq!(event.id, 0);
/// assert_eq!(log.pull_next_event().unwrap(), Some(event));
/// assert!(!log.has_events());
/// ```
pub struct EventLog {
    config: LogConfig,
    clock: Arc<dyn Clock>,
    ids: Mutex<IdState>,
    ring: Mutex<RingBuffer>,
}

impl EventLog {
    /// Opens the log over `backend`, recovering the last event ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the ring buffer
    /// cannot be opened.
    pub fn open(
        backend: impl StorageBackend + 'static,
        header: HeaderStore,
        config: LogConfig,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let ring = RingBuffer::open(backend, config.capacity(), header)?;
        info!(
            capacity = ring.capacity(),
            max_events = config.max_events,
            read = ring.read_position(),
            write = ring.write_position(),
            "event log opened"
        );

        let ids = recover_ids(&ring, &config)?;
        info!(current_id = ?ids.current, ack_id = ids.ack, "event IDs recovered");

        Ok(Self {
            config,
            clock,
            ids: Mutex::new(ids),
            ring: Mutex::new(ring),
        })
    }

    /// The configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Appends an event and returns its ID.
    ///
    /// The ID is persisted before the event is written. Data longer than the
    /// block allows is truncated.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID or the event cannot be persisted.
    pub fn add_event(&self, command: impl Into<u8>, data: Option<&[u8]>) -> CoreResult<u16> {
        let command = command.into();
        let mut ids = self.ids.lock();
        let mut ring = self.ring.lock();

        let id = self.next_id(ids.current);
        ring.store_seq_ack(u64::from(id), u64::from(ids.ack))?;
        ids.current = Some(id);

        let record = EventRecord::new(id, command, self.clock.now(), data.unwrap_or_default());
        let evicted = ring.put(&record.encode(self.config.block_size))?;
        if evicted > 0 {
            debug!(id, evicted, "log full, oldest events evicted");
        }
        debug!(id, command, "event added");
        Ok(id)
    }

    /// Logs that the device clock was changed away from `old_time`.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be persisted.
    pub fn record_time_change(&self, old_time: u32) -> CoreResult<u16> {
        self.add_event(Command::TimeChanged, Some(&old_time.to_le_bytes()))
    }

    /// Returns true if undelivered events are stored.
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.ring.lock().is_empty()
    }

    /// Returns the oldest event without removing it.
    ///
    /// Returns `Ok(None)` if the log is empty or the stored block has the
    /// wrong size.
    ///
    /// # Errors
    ///
    /// Returns an error if the block cannot be read.
    pub fn peek_next_event(&self) -> CoreResult<Option<EventRecord>> {
        self.head(&self.ring.lock())
    }

    /// Removes and returns the oldest event, recording it as delivered.
    ///
    /// A block of the wrong size is left in place and `Ok(None)` returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the block cannot be read or the removal cannot be
    /// persisted.
    pub fn pull_next_event(&self) -> CoreResult<Option<EventRecord>> {
        let mut ids = self.ids.lock();
        let mut ring = self.ring.lock();

        let Some(record) = self.head(&ring)? else {
            return Ok(None);
        };
        self.remove_head(&mut ids, &mut ring, record).map(Some)
    }

    /// Removes the oldest event only if it is still event `id` stored at
    /// `position`.
    ///
    /// The check and the removal happen under both locks, so an event
    /// evicted by a concurrent producer can never be pulled in place of the
    /// one that was sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the block cannot be read or the removal cannot be
    /// persisted.
    pub fn pull_next_event_at(&self, position: u64, id: u16) -> CoreResult<PullOutcome> {
        let mut ids = self.ids.lock();
        let mut ring = self.ring.lock();

        if ring.is_empty() || ring.read_position() != position {
            return Ok(PullOutcome::Moved);
        }
        let Some(record) = self.head(&ring)? else {
            return Ok(PullOutcome::Unreadable);
        };
        if record.id != id {
            return Ok(PullOutcome::Moved);
        }
        self.remove_head(&mut ids, &mut ring, record)
            .map(PullOutcome::Pulled)
    }

    fn head(&self, ring: &RingBuffer) -> CoreResult<Option<EventRecord>> {
        Ok(ring.peek()?.and_then(|block| self.unpack(&block)))
    }

    fn remove_head(
        &self,
        ids: &mut IdState,
        ring: &mut RingBuffer,
        record: EventRecord,
    ) -> CoreResult<EventRecord> {
        ring.get()?;
        let current = ids.current.unwrap_or(record.id);
        ring.store_seq_ack(u64::from(current), u64::from(record.id))?;
        ids.current = Some(current);
        ids.ack = record.id;
        debug!(id = record.id, "event pulled");
        Ok(record)
    }

    /// Returns the most recently written event, delivered or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be read.
    pub fn peek_last_event(&self) -> CoreResult<Option<EventRecord>> {
        let ring = self.ring.lock();
        last_event(&ring, &self.config)
    }

    /// Returns all undelivered events, oldest first.
    ///
    /// Blocks of the wrong size are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be read.
    pub fn events(&self) -> CoreResult<Vec<EventRecord>> {
        let ring = self.ring.lock();
        Ok(ring
            .items()?
            .into_iter()
            .filter_map(|(_, block)| self.unpack(&block))
            .collect())
    }

    /// Position of the oldest stored event.
    ///
    /// The delivery loop compares it before and after a send to detect a
    /// concurrent consumer.
    #[must_use]
    pub fn read_position(&self) -> u64 {
        self.ring.lock().read_position()
    }

    /// Last assigned event ID, `None` if no event was ever logged.
    #[must_use]
    pub fn current_id(&self) -> Option<u16> {
        self.ids.lock().current
    }

    /// Last delivered event ID.
    #[must_use]
    pub fn ack_id(&self) -> u16 {
        self.ids.lock().ack
    }

    /// Discards all stored events. Event IDs keep counting.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be cleared.
    pub fn clear(&self) -> CoreResult<()> {
        let _ids = self.ids.lock();
        self.ring.lock().clear()
    }

    /// Returns a summary of the log state.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored events cannot be counted.
    pub fn status(&self) -> CoreResult<LogStatus> {
        let ids = self.ids.lock();
        let ring = self.ring.lock();
        Ok(LogStatus {
            read_position: ring.read_position(),
            write_position: ring.write_position(),
            capacity: ring.capacity(),
            used_bytes: ring.used_bytes(),
            free_bytes: ring.free_bytes(),
            event_count: ring.items()?.len(),
            current_id: ids.current,
            ack_id: ids.ack,
            stats: ring.stats(),
        })
    }

    fn next_id(&self, current: Option<u16>) -> u16 {
        match current {
            None => 0,
            Some(id) => ((u32::from(id) + 1) % self.config.max_event_id) as u16,
        }
    }

    fn unpack(&self, block: &[u8]) -> Option<EventRecord> {
        unpack(block, &self.config)
    }
}

fn unpack(block: &[u8], config: &LogConfig) -> Option<EventRecord> {
    match EventRecord::decode(block, config.block_size) {
        Ok(record) => Some(record),
        Err(CoreError::BlockSizeMismatch { expected, actual }) => {
            error!(expected, actual, "invalid event block size");
            None
        }
        Err(err) => {
            error!(error = %err, "undecodable event block");
            None
        }
    }
}

fn last_event(ring: &RingBuffer, config: &LogConfig) -> CoreResult<Option<EventRecord>> {
    Ok(ring
        .peek_last(config.block_size)?
        .and_then(|block| unpack(&block, config)))
}

fn recover_ids(ring: &RingBuffer, config: &LogConfig) -> CoreResult<IdState> {
    let max = u64::from(config.max_event_id);
    let mut id = ring.sequence_number();
    if id >= max {
        warn!(id, max, "stored event ID out of range, resetting");
        id = 0;
    }
    let mut ack = ring.ack_number();
    if ack >= max {
        warn!(ack, max, "stored ack ID out of range, resetting");
        ack = 0;
    }

    let current = if id == 0 {
        match last_event(ring, config)? {
            Some(record) => {
                info!(id = record.id, "event ID restored from last stored event");
                Some(record.id)
            }
            None => {
                warn!("unable to determine last used event ID, restarting at 0");
                ack = 0;
                None
            }
        }
    } else {
        Some(id as u16)
    };

    if let Some(current) = current {
        if ack > u64::from(current) {
            warn!(ack, current, "ack ID ahead of event ID, clamping");
            ack = u64::from(current);
        }
    }

    Ok(IdState {
        current,
        ack: ack as u16,
    })
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("config", &self.config)
            .field("ids", &*self.ids.lock())
            .finish_non_exhaustive()
    }
}
