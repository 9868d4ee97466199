//! Ring buffer over a storage region.

use super::header::{Header, HeaderStore, DATA_START, HEADER_LEN, ITEM_SIZE_LEN};
use crate::error::{CoreError, CoreResult};
use eventlink_storage::StorageBackend;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Counters for ring buffer activity since open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RingStats {
    /// Items appended.
    pub puts: u64,
    /// Items removed by `get`.
    pub gets: u64,
    /// Items dropped to make room for newer ones.
    pub evictions: u64,
}

/// A durable FIFO of variable-length items with oldest-first eviction.
///
/// Positions handed out and accepted by this type are absolute byte offsets
/// into the storage region, in `DATA_START..DATA_START + capacity + 1`.
///
/// # Example
///
/// ```rust
/// use eventlink_core::{HeaderStore, RingBuffer};
/// use eventlink_storage::InMemoryBackend;
///
/// let mut ring = RingBuffer::open(InMemoryBackend::new(), 64, HeaderStore::inline()).unwrap();
/// ring.put(b"first").unwrap();
/// ring.put(b"second").unwrap();
/// assert_eq!(ring.get().unwrap().as_deref(), Some(&b"first"[..]));
/// assert_eq!(ring.peek().unwrap().as_deref(), Some(&b"second"[..]));
/// ```
pub struct RingBuffer {
    backend: Box<dyn StorageBackend>,
    header: HeaderStore,
    capacity: u64,
    region_len: u64,
    read_position: u64,
    write_position: u64,
    sequence: u64,
    ack: u64,
    stats: RingStats,
}

impl RingBuffer {
    /// Opens a ring buffer of `capacity` usable bytes over `backend`.
    ///
    /// A region of the wrong size is formatted. Otherwise the cursors are
    /// recovered from the header and the stored slots are checked; the write
    /// cursor is pulled back to the first slot that cannot be valid.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` cannot hold a single one-byte item or
    /// the region cannot be read, formatted or repaired.
    pub fn open(
        backend: impl StorageBackend + 'static,
        capacity: u64,
        header: HeaderStore,
    ) -> CoreResult<Self> {
        if capacity <= ITEM_SIZE_LEN {
            return Err(CoreError::invalid_config(format!(
                "ring capacity {capacity} cannot hold an item"
            )));
        }

        let mut ring = Self {
            backend: Box::new(backend),
            header,
            capacity,
            region_len: capacity + 1,
            read_position: DATA_START,
            write_position: DATA_START,
            sequence: 0,
            ack: 0,
            stats: RingStats::default(),
        };

        let expected_size = HEADER_LEN + ring.region_len;
        let size = ring.backend.size()?;
        if size == expected_size {
            ring.recover().map_err(log_failure("open"))?;
        } else {
            info!(size, expected_size, "formatting ring buffer region");
            ring.format(expected_size).map_err(log_failure("format"))?;
        }

        debug!(
            read = ring.read_position,
            write = ring.write_position,
            sequence = ring.sequence,
            ack = ring.ack,
            "ring buffer opened"
        );
        Ok(ring)
    }

    fn format(&mut self, size: u64) -> CoreResult<()> {
        self.backend.set_len(0)?;
        self.backend.set_len(size)?;
        self.sequence = 0;
        self.ack = 0;
        self.persist_cursors(DATA_START, DATA_START)
    }

    fn recover(&mut self) -> CoreResult<()> {
        let header = self.header.load(self.backend.as_ref())?;
        self.sequence = header.sequence;
        self.ack = header.ack;

        let (read, write) = match (
            self.stored_position(header.read),
            self.stored_position(header.write),
        ) {
            (Some(read), Some(write)) => (read, write),
            (Some(read), None) => {
                warn!(
                    read,
                    write = header.write,
                    "stored write cursor outside data region, rebuilding from slots"
                );
                let write = self.walk_slots(read, None)?;
                self.persist_cursors(read, write)?;
                return Ok(());
            }
            (None, Some(write)) => {
                warn!(
                    read = header.read,
                    write, "stored read cursor outside data region, dropping stored items"
                );
                self.persist_cursors(write, write)?;
                return Ok(());
            }
            (None, None) => {
                warn!(
                    read = header.read,
                    write = header.write,
                    "stored cursors outside data region, resetting to empty"
                );
                self.persist_cursors(DATA_START, DATA_START)?;
                return Ok(());
            }
        };

        let end = self.walk_slots(read, Some(write))?;
        self.read_position = read;
        self.write_position = write;
        if end != write {
            warn!(position = end, "discarding partially written data at end of ring");
            self.persist_cursors(read, end)?;
        }
        Ok(())
    }

    /// Follows valid slots from `from` and returns where they end.
    ///
    /// With a known write cursor the walk stops there; without one it stops
    /// once `capacity` bytes have been covered.
    fn walk_slots(&self, from: u64, to: Option<u64>) -> CoreResult<u64> {
        let mut position = from;
        let mut covered = 0;
        while Some(position) != to {
            let remaining = match to {
                Some(to) => self.distance(position, to),
                None => self.capacity - covered,
            };
            let len = self.slot_len_at(position)?;
            let slot = ITEM_SIZE_LEN + len;
            if len == 0 || slot > self.capacity || slot > remaining {
                break;
            }
            position = self.advance(position, slot);
            covered += slot;
        }
        Ok(position)
    }

    /// Maps a stored cursor to a position, `None` if it is out of range.
    fn stored_position(&self, stored: u64) -> Option<u64> {
        match stored {
            0 => Some(DATA_START),
            p if p == self.region_end() => Some(DATA_START),
            p if (DATA_START..self.region_end()).contains(&p) => Some(p),
            _ => None,
        }
    }

    /// Returns true if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_position == self.write_position
    }

    /// Appends an item and returns how many old items were evicted for it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyItem`] for an empty item,
    /// [`CoreError::ItemTooLarge`] if the slot exceeds the capacity, or a
    /// storage error if the item could not be made durable.
    pub fn put(&mut self, item: &[u8]) -> CoreResult<usize> {
        self.put_item(item).map_err(log_failure("put"))
    }

    fn put_item(&mut self, item: &[u8]) -> CoreResult<usize> {
        if item.is_empty() {
            return Err(CoreError::EmptyItem);
        }
        let slot = ITEM_SIZE_LEN + item.len() as u64;
        if slot > self.capacity {
            return Err(CoreError::ItemTooLarge {
                size: slot,
                capacity: self.capacity,
            });
        }
        let len = u32::try_from(item.len()).map_err(|_| CoreError::ItemTooLarge {
            size: slot,
            capacity: self.capacity,
        })?;

        let mut read = self.read_position;
        let mut evicted = 0usize;
        while self.capacity - self.distance(read, self.write_position) < slot {
            let old = self.slot_len_at(read)?;
            if old == 0 || ITEM_SIZE_LEN + old > self.distance(read, self.write_position) {
                return Err(CoreError::corrupted(
                    read,
                    format!("invalid slot length {old}"),
                ));
            }
            read = self.advance(read, ITEM_SIZE_LEN + old);
            evicted += 1;
            debug!(position = read, len = old, "evicted oldest item");
        }
        if evicted > 0 {
            self.persist_cursors(read, self.write_position)?;
        }

        let mut bytes = Vec::with_capacity(slot as usize);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(item);
        self.write_wrapped(self.write_position, &bytes)?;
        self.backend.flush()?;

        let write = self.advance(self.write_position, slot);
        self.persist_cursors(read, write)?;

        self.stats.puts += 1;
        self.stats.evictions += evicted as u64;
        debug!(read, write, len, evicted, "item stored");
        Ok(evicted)
    }

    /// Removes and returns the oldest item.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or the new read cursor
    /// cannot be persisted.
    pub fn get(&mut self) -> CoreResult<Option<Vec<u8>>> {
        self.get_item().map_err(log_failure("get"))
    }

    fn get_item(&mut self) -> CoreResult<Option<Vec<u8>>> {
        if self.is_empty() {
            return Ok(None);
        }
        let (item, next) = self.item_at(self.read_position)?;
        self.persist_cursors(next, self.write_position)?;
        self.stats.gets += 1;
        debug!(read = next, "item removed");
        Ok(Some(item))
    }

    /// Returns the oldest item without removing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read.
    pub fn peek(&self) -> CoreResult<Option<Vec<u8>>> {
        if self.is_empty() {
            return Ok(None);
        }
        let (item, _) = self.item_at(self.read_position)?;
        Ok(Some(item))
    }

    /// Returns the most recently written item, assuming it is `block_size`
    /// bytes long.
    ///
    /// Consumed items stay in the region, so this also works on an empty
    /// buffer. Returns `None` if the slot before the write cursor does not
    /// hold a `block_size` item.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be read.
    pub fn peek_last(&self, block_size: usize) -> CoreResult<Option<Vec<u8>>> {
        let slot = ITEM_SIZE_LEN + block_size as u64;
        if block_size == 0 || slot > self.capacity {
            return Ok(None);
        }
        let position = self.retreat(self.write_position, slot);
        if self.slot_len_at(position)? != block_size as u64 {
            return Ok(None);
        }
        let data = self.read_wrapped(self.advance(position, ITEM_SIZE_LEN), block_size)?;
        Ok(Some(data))
    }

    /// Moves the read cursor to `position` and persists it.
    ///
    /// A position at the end of the data region means its start.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPosition`] for a position outside the
    /// data region, or a storage error if it cannot be persisted.
    pub fn set_read_position(&mut self, position: u64) -> CoreResult<()> {
        let position = self.checked_position(position)?;
        self.persist_cursors(position, self.write_position)
            .map_err(log_failure("set_read_position"))?;
        debug!(read = position, "read cursor relocated");
        Ok(())
    }

    /// Moves the read cursor just past the item stored at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPosition`] for a position outside the
    /// data region, [`CoreError::Corrupted`] if no valid slot starts there,
    /// or a storage error.
    pub fn advance_read_position_from(&mut self, position: u64) -> CoreResult<()> {
        let position = self.checked_position(position)?;
        let len = self.slot_len_at(position)?;
        if len == 0 || ITEM_SIZE_LEN + len > self.capacity {
            return Err(CoreError::corrupted(
                position,
                format!("invalid slot length {len}"),
            ));
        }
        let next = self.advance(position, ITEM_SIZE_LEN + len);
        self.persist_cursors(next, self.write_position)
            .map_err(log_failure("advance_read_position_from"))?;
        debug!(from = position, read = next, "read cursor advanced");
        Ok(())
    }

    /// Zeroes the data region and empties the buffer.
    ///
    /// The sequence and ack numbers are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be written.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.clear_region().map_err(log_failure("clear"))?;
        info!("ring buffer cleared");
        Ok(())
    }

    fn clear_region(&mut self) -> CoreResult<()> {
        let zeros = vec![0u8; self.region_len as usize];
        self.backend.write_at(DATA_START, &zeros)?;
        self.backend.flush()?;
        self.persist_cursors(DATA_START, DATA_START)
    }

    /// Returns all stored items with their positions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if a slot cannot be read.
    pub fn items(&self) -> CoreResult<Vec<(u64, Vec<u8>)>> {
        let mut items = Vec::new();
        let mut position = self.read_position;
        while position != self.write_position {
            let (item, next) = self.item_at(position)?;
            items.push((position, item));
            position = next;
        }
        Ok(items)
    }

    /// Persists the sequence and ack numbers.
    ///
    /// # Errors
    ///
    /// Returns a storage error if they cannot be persisted.
    pub fn store_seq_ack(&mut self, sequence: u64, ack: u64) -> CoreResult<()> {
        let header = Header {
            read: self.read_position,
            write: self.write_position,
            sequence,
            ack,
        };
        self.header
            .store(self.backend.as_mut(), &header)
            .map_err(log_failure("store_seq_ack"))?;
        self.sequence = sequence;
        self.ack = ack;
        Ok(())
    }

    /// Last persisted sequence number.
    #[must_use]
    pub fn sequence_number(&self) -> u64 {
        self.sequence
    }

    /// Last persisted ack number.
    #[must_use]
    pub fn ack_number(&self) -> u64 {
        self.ack
    }

    /// Position of the oldest item.
    #[must_use]
    pub fn read_position(&self) -> u64 {
        self.read_position
    }

    /// Position the next item will be written to.
    #[must_use]
    pub fn write_position(&self) -> u64 {
        self.write_position
    }

    /// Usable bytes, length prefixes included.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes occupied by stored slots.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.distance(self.read_position, self.write_position)
    }

    /// Bytes available before the next put evicts.
    #[must_use]
    pub fn free_bytes(&self) -> u64 {
        self.capacity - self.used_bytes()
    }

    /// Activity counters since open.
    #[must_use]
    pub fn stats(&self) -> RingStats {
        self.stats
    }

    fn region_end(&self) -> u64 {
        DATA_START + self.region_len
    }

    fn checked_position(&self, position: u64) -> CoreResult<u64> {
        self.stored_position(position)
            .filter(|_| position != 0)
            .ok_or(CoreError::InvalidPosition {
                position,
                start: DATA_START,
                end: self.region_end(),
            })
    }

    fn persist_cursors(&mut self, read: u64, write: u64) -> CoreResult<()> {
        let header = Header {
            read,
            write,
            sequence: self.sequence,
            ack: self.ack,
        };
        self.header.store(self.backend.as_mut(), &header)?;
        self.read_position = read;
        self.write_position = write;
        Ok(())
    }

    fn advance(&self, position: u64, n: u64) -> u64 {
        DATA_START + (position - DATA_START + n) % self.region_len
    }

    fn retreat(&self, position: u64, n: u64) -> u64 {
        let n = n % self.region_len;
        DATA_START + (position - DATA_START + self.region_len - n) % self.region_len
    }

    fn distance(&self, from: u64, to: u64) -> u64 {
        (to + self.region_len - from) % self.region_len
    }

    fn slot_len_at(&self, position: u64) -> CoreResult<u64> {
        let raw = self.read_wrapped(position, ITEM_SIZE_LEN as usize)?;
        let mut bytes = [0u8; ITEM_SIZE_LEN as usize];
        bytes.copy_from_slice(&raw);
        Ok(u64::from(u32::from_le_bytes(bytes)))
    }

    /// Reads the item stored at `position` and the position after it.
    fn item_at(&self, position: u64) -> CoreResult<(Vec<u8>, u64)> {
        let len = self.slot_len_at(position)?;
        if len == 0 || ITEM_SIZE_LEN + len > self.capacity {
            return Err(CoreError::corrupted(
                position,
                format!("invalid slot length {len}"),
            ));
        }
        let item = self.read_wrapped(self.advance(position, ITEM_SIZE_LEN), len as usize)?;
        Ok((item, self.advance(position, ITEM_SIZE_LEN + len)))
    }

    fn read_wrapped(&self, position: u64, len: usize) -> CoreResult<Vec<u8>> {
        let tail = (self.region_end() - position) as usize;
        if len <= tail {
            return Ok(self.backend.read_at(position, len)?);
        }
        let mut data = self.backend.read_at(position, tail)?;
        data.extend(self.backend.read_at(DATA_START, len - tail)?);
        Ok(data)
    }

    fn write_wrapped(&mut self, position: u64, data: &[u8]) -> CoreResult<()> {
        let tail = (self.region_end() - position) as usize;
        if data.len() <= tail {
            self.backend.write_at(position, data)?;
        } else {
            self.backend.write_at(position, &data[..tail])?;
            self.backend.write_at(DATA_START, &data[tail..])?;
        }
        Ok(())
    }
}

fn log_failure(operation: &'static str) -> impl FnOnce(CoreError) -> CoreError {
    move |err| {
        if matches!(err, CoreError::Storage(_)) {
            error!(operation, error = %err, "ring buffer storage failure");
        }
        err
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("header", &self.header)
            .field("capacity", &self.capacity)
            .field("read_position", &self.read_position)
            .field("write_position", &self.write_position)
            .field("sequence", &self.sequence)
            .field("ack", &self.ack)
            .finish_non_exhaustive()
    }
}
