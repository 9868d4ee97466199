//! Reference model of the ring buffer.
//!
//! The model tracks items by slot size only and evicts from the front until
//! a new slot fits, which is exactly the contract the durable ring promises.

use eventlink_core::ITEM_SIZE_LEN;
use std::collections::VecDeque;

/// An in-memory FIFO with the ring buffer's eviction rule.
#[derive(Debug, Clone)]
pub struct RingModel {
    capacity: u64,
    used: u64,
    items: VecDeque<Vec<u8>>,
}

impl RingModel {
    /// Creates an empty model with `capacity` usable bytes.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            used: 0,
            items: VecDeque::new(),
        }
    }

    /// Bytes a stored item occupies, length prefix included.
    #[must_use]
    pub fn slot_len(item: &[u8]) -> u64 {
        ITEM_SIZE_LEN + item.len() as u64
    }

    /// Returns true if `item` can be stored at all.
    #[must_use]
    pub fn accepts(&self, item: &[u8]) -> bool {
        !item.is_empty() && Self::slot_len(item) <= self.capacity
    }

    /// Number of items `put(item)` would evict.
    #[must_use]
    pub fn evictions_for(&self, item: &[u8]) -> usize {
        let slot = Self::slot_len(item);
        let mut used = self.used;
        let mut evicted = 0;
        for old in &self.items {
            if self.capacity - used >= slot {
                break;
            }
            used -= Self::slot_len(old);
            evicted += 1;
        }
        evicted
    }

    /// Appends `item`, evicting from the front, and returns the eviction count.
    ///
    /// Items the ring would reject are ignored and report zero evictions.
    pub fn put(&mut self, item: &[u8]) -> usize {
        if !self.accepts(item) {
            return 0;
        }
        let evicted = self.evictions_for(item);
        for _ in 0..evicted {
            self.pop_front();
        }
        self.used += Self::slot_len(item);
        self.items.push_back(item.to_vec());
        evicted
    }

    /// Drops the oldest `count` items without returning them.
    pub fn evict(&mut self, count: usize) {
        for _ in 0..count {
            self.pop_front();
        }
    }

    /// Removes and returns the oldest item.
    pub fn get(&mut self) -> Option<Vec<u8>> {
        self.pop_front()
    }

    /// Returns the oldest item.
    #[must_use]
    pub fn peek(&self) -> Option<&Vec<u8>> {
        self.items.front()
    }

    /// Returns true if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bytes occupied by stored slots.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.used
    }

    /// Stored items, oldest first.
    #[must_use]
    pub fn items(&self) -> Vec<Vec<u8>> {
        self.items.iter().cloned().collect()
    }

    fn pop_front(&mut self) -> Option<Vec<u8>> {
        let item = self.items.pop_front()?;
        self.used -= Self::slot_len(&item);
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_until_slot_fits() {
        let mut model = RingModel::new(64);
        let block = [0u8; 18];
        assert_eq!(model.put(&block), 0);
        assert_eq!(model.put(&block), 0);
        assert_eq!(model.used_bytes(), 44);
        assert_eq!(model.put(&block), 1);
        assert_eq!(model.items().len(), 2);
    }

    #[test]
    fn rejects_what_the_ring_rejects() {
        let mut model = RingModel::new(16);
        assert_eq!(model.put(b""), 0);
        assert_eq!(model.put(&[1u8; 13]), 0);
        assert!(model.is_empty());
        assert_eq!(model.put(&[1u8; 12]), 0);
        assert_eq!(model.peek(), Some(&vec![1u8; 12]));
    }

    #[test]
    fn get_is_fifo() {
        let mut model = RingModel::new(64);
        model.put(b"a");
        model.put(b"b");
        assert_eq!(model.get(), Some(b"a".to_vec()));
        assert_eq!(model.get(), Some(b"b".to_vec()));
        assert_eq!(model.get(), None);
        assert_eq!(model.used_bytes(), 0);
    }
}
