//! Event record codec.

use crate::error::{CoreError, CoreResult};
use serde::Serialize;

/// Bytes taken by ID, command and timestamp at the start of every block.
pub const RECORD_HEADER_LEN: usize = 7;

/// Known event command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// An RFID tag was read; data holds the tag UID.
    TagDetected = 0x02,
    /// The device asks the backend for the current time.
    TimeRequest = 0x03,
    /// Second-stage time request.
    TimeRequest2 = 0x04,
    /// The device clock was adjusted; data holds the previous time.
    TimeChanged = 0x05,
}

impl Command {
    /// Maps a raw command byte to a known command.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x02 => Some(Self::TagDetected),
            0x03 => Some(Self::TimeRequest),
            0x04 => Some(Self::TimeRequest2),
            0x05 => Some(Self::TimeChanged),
            _ => None,
        }
    }

    /// The raw command byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        command.as_byte()
    }
}

/// A decoded event block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Event ID.
    pub id: u16,
    /// Raw command byte; unknown codes are kept as-is.
    pub command: u8,
    /// Device time in seconds when the event was logged.
    pub timestamp: u32,
    /// Payload bytes including zero padding.
    pub data: Vec<u8>,
}

impl EventRecord {
    /// Creates a record.
    pub fn new(id: u16, command: impl Into<u8>, timestamp: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            command: command.into(),
            timestamp,
            data: data.into(),
        }
    }

    /// The command, if it is a known one.
    #[must_use]
    pub fn known_command(&self) -> Option<Command> {
        Command::from_byte(self.command)
    }

    /// Serializes into a block of exactly `block_size` bytes.
    ///
    /// Data that does not fit is truncated; short data is zero padded.
    #[must_use]
    pub fn encode(&self, block_size: usize) -> Vec<u8> {
        let mut block = Vec::with_capacity(block_size.max(RECORD_HEADER_LEN));
        block.extend_from_slice(&self.id.to_le_bytes());
        block.push(self.command);
        block.extend_from_slice(&self.timestamp.to_le_bytes());
        block.extend_from_slice(&self.data);
        block.resize(block_size, 0);
        block
    }

    /// Parses a block.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BlockSizeMismatch`] if `block` is not exactly
    /// `block_size` bytes long.
    pub fn decode(block: &[u8], block_size: usize) -> CoreResult<Self> {
        if block.len() != block_size || block_size < RECORD_HEADER_LEN {
            return Err(CoreError::BlockSizeMismatch {
                expected: block_size,
                actual: block.len(),
            });
        }
        Ok(Self {
            id: u16::from_le_bytes([block[0], block[1]]),
            command: block[2],
            timestamp: u32::from_le_bytes([block[3], block[4], block[5], block[6]]),
            data: block[RECORD_HEADER_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_layout() {
        let record = EventRecord::new(0x0102, Command::TagDetected, 0x0A0B_0C0D, vec![0xAA, 0xBB]);
        let block = record.encode(18);
        assert_eq!(block.len(), 18);
        assert_eq!(&block[..9], &[0x02, 0x01, 0x02, 0x0D, 0x0C, 0x0B, 0x0A, 0xAA, 0xBB]);
        assert!(block[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn oversize_data_truncated() {
        let record = EventRecord::new(1, Command::TagDetected, 0, vec![7u8; 40]);
        let block = record.encode(18);
        assert_eq!(block.len(), 18);
        assert_eq!(&block[7..], &[7u8; 11]);
    }

    #[test]
    fn decode_pads_data_to_block() {
        let block = EventRecord::new(5, 0x99, 1234, vec![1, 2]).encode(12);
        let decoded = EventRecord::decode(&block, 12).unwrap();
        assert_eq!(decoded.id, 5);
        assert_eq!(decoded.command, 0x99);
        assert_eq!(decoded.known_command(), None);
        assert_eq!(decoded.timestamp, 1234);
        assert_eq!(decoded.data, vec![1, 2, 0, 0, 0]);
    }

    #[test]
    fn decode_rejects_wrong_size() {
        let err = EventRecord::decode(&[0u8; 10], 18).unwrap_err();
        assert!(matches!(
            err,
            CoreError::BlockSizeMismatch {
                expected: 18,
                actual: 10
            }
        ));
    }

    #[test]
    fn command_codes() {
        assert_eq!(u8::from(Command::TimeChanged), 0x05);
        assert_eq!(Command::from_byte(0x03), Some(Command::TimeRequest));
        assert_eq!(Command::from_byte(0x04), Some(Command::TimeRequest2));
        assert_eq!(Command::from_byte(0x01), None);
    }
}
