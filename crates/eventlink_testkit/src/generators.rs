//! Property-based test generators.
//!
//! Provides proptest strategies for generating test data.

use eventlink_core::Command;
use proptest::prelude::*;

/// Strategy for non-empty ring items up to `max_len` bytes.
pub fn item_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len.max(1))
}

/// Strategy for event payloads, including empty and oversized ones.
pub fn event_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

/// Strategy for command bytes, mostly known commands.
pub fn command_strategy() -> impl Strategy<Value = u8> {
    prop_oneof![
        4 => Just(Command::TagDetected.as_byte()),
        2 => Just(Command::TimeRequest.as_byte()),
        1 => Just(Command::TimeRequest2.as_byte()),
        1 => Just(Command::TimeChanged.as_byte()),
        1 => any::<u8>(),
    ]
}

/// Strategy for ring capacities; large ones push cursors past one byte.
pub fn capacity_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![24u64..200, 200u64..2000]
}

/// An operation against a ring buffer.
#[derive(Debug, Clone)]
pub enum RingOperation {
    /// Append an item.
    Put(Vec<u8>),
    /// Remove the oldest item.
    Get,
    /// Look at the oldest item.
    Peek,
    /// Close and reopen the ring over the same bytes.
    Reopen,
}

/// Strategy for a single ring operation.
pub fn ring_operation_strategy(max_item: usize) -> impl Strategy<Value = RingOperation> {
    prop_oneof![
        5 => item_strategy(max_item).prop_map(RingOperation::Put),
        3 => Just(RingOperation::Get),
        1 => Just(RingOperation::Peek),
        1 => Just(RingOperation::Reopen),
    ]
}

/// Strategy for sequences of ring operations.
pub fn ring_operations_strategy(
    max_item: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<RingOperation>> {
    prop::collection::vec(ring_operation_strategy(max_item), 1..=max_ops)
}

/// An operation against an event log.
#[derive(Debug, Clone)]
pub enum LogOperation {
    /// Record an event.
    Add {
        /// Command byte.
        command: u8,
        /// Payload, possibly empty or longer than the block.
        data: Vec<u8>,
    },
    /// Peek at the oldest event.
    Peek,
    /// Remove the oldest event.
    Pull,
}

/// Strategy for event log operations.
pub fn log_operations_strategy(max_ops: usize) -> impl Strategy<Value = Vec<LogOperation>> {
    let op = prop_oneof![
        3 => (command_strategy(), event_data_strategy())
            .prop_map(|(command, data)| LogOperation::Add { command, data }),
        1 => Just(LogOperation::Peek),
        2 => Just(LogOperation::Pull),
    ];
    prop::collection::vec(op, 1..=max_ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn items_are_never_empty() {
        let mut runner = TestRunner::default();
        let strategy = item_strategy(8);
        for _ in 0..100 {
            let item = strategy.new_tree(&mut runner).unwrap().current();
            assert!(!item.is_empty() && item.len() <= 8);
        }
    }

    #[test]
    fn zero_max_len_still_yields_items() {
        let mut runner = TestRunner::default();
        let item = item_strategy(0).new_tree(&mut runner).unwrap().current();
        assert_eq!(item.len(), 1);
    }
}
