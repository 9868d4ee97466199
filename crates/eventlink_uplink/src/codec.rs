//! Uplink frame codec.
//!
//! ## Frames
//!
//! ```text
//! tag detected:  | 0x01 | id (2) | timestamp (4) | uid (4..=10)          |
//! time request:  | cmd  | id (2) | device time (4)                        |
//! time changed:  | 0x05 | id (2) | new time (4)  | old time (4)          |
//! ```
//!
//! Integers are little-endian. Events with other commands have no frame.

use eventlink_core::{Clock, Command, EventRecord};
use std::sync::Arc;
use tracing::debug;

/// Leading byte of a tag-detected frame.
pub const TAG_FRAME: u8 = 0x01;

const TAG_UID_MAX: usize = 10;
const TAG_UID_MIN: usize = 4;
const OLD_TIME_LEN: usize = 4;

/// Builds uplink frames from event records.
#[derive(Clone)]
pub struct PayloadCodec {
    clock: Arc<dyn Clock>,
}

impl PayloadCodec {
    /// Creates a codec; time requests are stamped with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Encodes `record`, or returns `None` if its command has no frame.
    pub fn encode(&self, record: &EventRecord) -> Option<Vec<u8>> {
        let command = record.known_command()?;
        let frame = match command {
            Command::TagDetected => {
                let uid = tag_uid(&record.data);
                debug!(id = record.id, uid = %hex(uid), timestamp = record.timestamp, "tag detected frame");
                frame(TAG_FRAME, record.id, record.timestamp, uid)
            }
            Command::TimeRequest | Command::TimeRequest2 => {
                let now = self.clock.now();
                debug!(id = record.id, now, "time request frame");
                frame(command.as_byte(), record.id, now, &[])
            }
            Command::TimeChanged => {
                let old = &record.data[..record.data.len().min(OLD_TIME_LEN)];
                debug!(id = record.id, timestamp = record.timestamp, old = %hex(old), "time changed frame");
                frame(command.as_byte(), record.id, record.timestamp, old)
            }
        };
        Some(frame)
    }

    /// Encodes a time request that is not stored in the log.
    pub fn time_request(&self, id: u16) -> Vec<u8> {
        frame(Command::TimeRequest2.as_byte(), id, self.clock.now(), &[])
    }
}

impl std::fmt::Debug for PayloadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCodec").finish_non_exhaustive()
    }
}

fn frame(lead: u8, id: u16, time: u32, tail: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(7 + tail.len());
    frame.push(lead);
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(&time.to_le_bytes());
    frame.extend_from_slice(tail);
    frame
}

/// First ten data bytes with trailing zeros removed, keeping at least four.
fn tag_uid(data: &[u8]) -> &[u8] {
    let uid = &data[..data.len().min(TAG_UID_MAX)];
    let mut len = uid.len();
    while len > TAG_UID_MIN && uid[len - 1] == 0 {
        len -= 1;
    }
    &uid[..len]
}

/// Formats bytes as lowercase hex.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventlink_core::ManualClock;

    const NOW: u32 = 0x6000_0000;

    #[test]
    fn hex_formatting() {
        assert_eq!(hex(&[0x00, 0xAB, 0x7F]), "00ab7f");
        assert_eq!(hex(&[]), "");
    }

    fn codec() -> PayloadCodec {
        PayloadCodec::new(Arc::new(ManualClock::new(NOW)))
    }

    fn record(command: Command, data: &[u8]) -> EventRecord {
        let mut data = data.to_vec();
        data.resize(11, 0);
        EventRecord::new(0x0203, command, 0x1122_3344, data)
    }

    #[test]
    fn tag_frame_trims_trailing_zeros() {
        let frame = codec()
            .encode(&record(Command::TagDetected, &[0xDE, 0xAD, 0xBE, 0xEF, 0x01]))
            .unwrap();
        assert_eq!(
            frame,
            vec![0x01, 0x03, 0x02, 0x44, 0x33, 0x22, 0x11, 0xDE, 0xAD, 0xBE, 0xEF, 0x01]
        );
    }

    #[test]
    fn tag_frame_keeps_four_byte_minimum() {
        let frame = codec()
            .encode(&record(Command::TagDetected, &[0xAB]))
            .unwrap();
        assert_eq!(&frame[7..], &[0xAB, 0, 0, 0]);
    }

    #[test]
    fn tag_frame_caps_uid_at_ten_bytes() {
        let frame = codec()
            .encode(&record(Command::TagDetected, &[0x55; 11]))
            .unwrap();
        assert_eq!(frame.len(), 7 + 10);
    }

    #[test]
    fn time_request_uses_current_clock() {
        let frame = codec().encode(&record(Command::TimeRequest2, &[])).unwrap();
        assert_eq!(frame[0], 0x04);
        assert_eq!(&frame[1..3], &[0x03, 0x02]);
        assert_eq!(&frame[3..7], &NOW.to_le_bytes());
        assert_eq!(frame.len(), 7);

        let frame = codec().encode(&record(Command::TimeRequest, &[])).unwrap();
        assert_eq!(frame[0], 0x03);
    }

    #[test]
    fn time_changed_carries_both_times() {
        let frame = codec()
            .encode(&record(Command::TimeChanged, &[0x0A, 0x0B, 0x0C, 0x0D]))
            .unwrap();
        assert_eq!(
            frame,
            vec![0x05, 0x03, 0x02, 0x44, 0x33, 0x22, 0x11, 0x0A, 0x0B, 0x0C, 0x0D]
        );
    }

    #[test]
    fn unknown_command_has_no_frame() {
        let record = EventRecord::new(1, 0x7Fu8, 0, vec![0; 11]);
        assert!(codec().encode(&record).is_none());
    }

    #[test]
    fn standalone_time_request() {
        let frame = codec().time_request(9);
        assert_eq!(frame, vec![0x04, 9, 0, 0x00, 0x00, 0x00, 0x60]);
    }
}
