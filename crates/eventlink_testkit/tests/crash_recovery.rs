//! Power loss at every point of a write must leave a ring that reopens into
//! a state the caller could have observed.

use eventlink_core::{
    Clock, EventLog, HeaderStore, LogConfig, ManualClock, RingBuffer, HEADER_COPY_LEN,
};
use eventlink_storage::InMemoryBackend;
use eventlink_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

const BLOCK: [u8; 18] = [0xAB; 18];

/// Bytes a single header store writes.
const HEADER_WRITE: usize = HEADER_COPY_LEN as usize;

fn reopen_items(storage: &InMemoryBackend, capacity: u64) -> Vec<Vec<u8>> {
    let ring = RingBuffer::open(storage.clone(), capacity, HeaderStore::inline()).unwrap();
    ring.items()
        .unwrap()
        .into_iter()
        .map(|(_, item)| item)
        .collect()
}

fn block(tag: u8) -> Vec<u8> {
    let mut block = BLOCK.to_vec();
    block[0] = tag;
    block
}

#[test]
fn crash_at_every_byte_of_an_evicting_put() {
    let capacity = 64;
    let mut completed = false;

    // eviction header, slot, final header
    for budget in 0..2 * HEADER_WRITE + 30 {
        let storage = InMemoryBackend::new();
        let backend = CrashableBackend::new(storage.clone());
        let switch = backend.switch();
        let mut ring = RingBuffer::open(backend, capacity, HeaderStore::inline()).unwrap();
        ring.put(&block(1)).unwrap();
        ring.put(&block(2)).unwrap();

        switch.crash_after(budget);
        let result = ring.put(&block(3));
        drop(ring);

        let recovered = reopen_items(&storage, capacity);
        if result.is_ok() {
            assert!(!switch.has_crashed());
            assert_eq!(recovered, vec![block(2), block(3)]);
            completed = true;
        } else {
            assert!(
                recovered == vec![block(1), block(2)] || recovered == vec![block(2)],
                "budget {budget}: unexpected recovery {recovered:?}"
            );
        }
    }
    assert!(completed, "no budget was large enough for the put");
}

#[test]
fn crash_with_multi_byte_cursors_keeps_flushed_items() {
    let capacity = 1000;
    let mut completed = false;

    for budget in 0..HEADER_WRITE + 30 {
        let storage = InMemoryBackend::new();
        let backend = CrashableBackend::new(storage.clone());
        let switch = backend.switch();
        let mut ring = RingBuffer::open(backend, capacity, HeaderStore::inline()).unwrap();
        for tag in 0..10 {
            ring.put(&block(tag)).unwrap();
        }
        let flushed: Vec<Vec<u8>> = (0..10).map(block).collect();
        let write_before = ring.write_position();
        assert!(write_before > 255);

        switch.crash_after(budget);
        let result = ring.put(&block(10));
        drop(ring);

        let ring = RingBuffer::open(storage.clone(), capacity, HeaderStore::inline()).unwrap();
        let recovered: Vec<Vec<u8>> = ring.items().unwrap().into_iter().map(|(_, i)| i).collect();
        if result.is_ok() {
            let mut expected = flushed.clone();
            expected.push(block(10));
            assert_eq!(recovered, expected);
            completed = true;
        } else {
            assert_eq!(ring.write_position(), write_before, "budget {budget}");
            assert_eq!(recovered, flushed, "budget {budget}");
        }
    }
    assert!(completed);
}

#[test]
fn failed_flush_keeps_the_previous_items() {
    let capacity = 128;
    let storage = InMemoryBackend::new();
    let backend = CrashableBackend::new(storage.clone());
    let switch = backend.switch();
    let mut ring = RingBuffer::open(backend, capacity, HeaderStore::inline()).unwrap();
    ring.put(b"first").unwrap();

    switch.set_fail_on_flush(true);
    assert!(ring.put(b"second").is_err());
    drop(ring);

    assert_eq!(reopen_items(&storage, capacity), vec![b"first".to_vec()]);
}

#[test]
fn failed_flush_during_eviction_drops_only_evicted_items() {
    let capacity = 64;
    let storage = InMemoryBackend::new();
    let backend = CrashableBackend::new(storage.clone());
    let switch = backend.switch();
    let mut ring = RingBuffer::open(backend, capacity, HeaderStore::inline()).unwrap();
    ring.put(&block(1)).unwrap();
    ring.put(&block(2)).unwrap();

    switch.set_fail_on_flush(true);
    assert!(ring.put(&block(3)).is_err());
    drop(ring);

    // the header copy reached storage before the flush failed
    assert_eq!(reopen_items(&storage, capacity), vec![block(2)]);
}

#[test]
fn crash_during_get_loses_nothing_or_exactly_one() {
    let capacity = 96;
    for budget in 0..HEADER_WRITE + 4 {
        let storage = InMemoryBackend::new();
        let backend = CrashableBackend::new(storage.clone());
        let switch = backend.switch();
        let mut ring = RingBuffer::open(backend, capacity, HeaderStore::inline()).unwrap();
        ring.put(b"one").unwrap();
        ring.put(b"two").unwrap();

        switch.crash_after(budget);
        let result = ring.get();
        drop(ring);

        let recovered = reopen_items(&storage, capacity);
        match result {
            Ok(item) => {
                assert_eq!(item, Some(b"one".to_vec()));
                assert_eq!(recovered, vec![b"two".to_vec()]);
            }
            Err(_) => assert_eq!(recovered, vec![b"one".to_vec(), b"two".to_vec()]),
        }
    }
}

#[test]
fn crash_during_add_event_never_reuses_an_id() {
    let config = LogConfig::default().max_events(3);
    // seq header, eviction header, slot, final header
    for budget in 0..3 * HEADER_WRITE + 30 {
        let storage = InMemoryBackend::new();
        let backend = CrashableBackend::new(storage.clone());
        let switch = backend.switch();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(FIXTURE_TIME));
        let log = EventLog::open(
            backend,
            HeaderStore::inline(),
            config.clone(),
            Arc::clone(&clock),
        )
        .unwrap();
        for _ in 0..4 {
            log.add_event(2u8, Some(b"tag")).unwrap();
        }

        switch.crash_after(budget);
        let _ = log.add_event(2u8, Some(b"tag"));
        drop(log);

        let log = EventLog::open(storage, HeaderStore::inline(), config.clone(), clock).unwrap();
        let stored: Vec<u16> = log.events().unwrap().iter().map(|e| e.id).collect();
        assert!(stored.windows(2).all(|w| w[1] == w[0] + 1), "{stored:?}");

        let next = log.add_event(2u8, None).unwrap();
        let last = *stored.last().unwrap();
        assert!(next > last, "budget {budget}: id {next} reused after {stored:?}");
        assert!(next <= 6);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn crash_during_put_recovers_a_consistent_state(
        capacity in capacity_strategy(),
        items in prop::collection::vec(item_strategy(16), 0..12),
        last in item_strategy(16),
        budget in 0usize..2 * HEADER_WRITE + 24,
    ) {
        let storage = InMemoryBackend::new();
        let backend = CrashableBackend::new(storage.clone());
        let switch = backend.switch();
        let mut ring = RingBuffer::open(backend, capacity, HeaderStore::inline()).unwrap();
        let mut model = RingModel::new(capacity);
        for item in &items {
            ring.put(item).unwrap();
            model.put(item);
        }

        let before = model.items();
        let mut evicted = model.clone();
        evicted.evict(model.evictions_for(&last));
        let mut after = model.clone();
        after.put(&last);

        switch.crash_after(budget);
        let result = ring.put(&last);
        drop(ring);

        let recovered = reopen_items(&storage, capacity);
        if result.is_ok() {
            prop_assert_eq!(recovered, after.items());
        } else {
            prop_assert!(
                recovered == before || recovered == evicted.items(),
                "unexpected recovery {:?}", recovered
            );
        }
    }
}
