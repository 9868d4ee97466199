//! Ring header layout and placement.
//!
//! Inline headers are kept in two copies. Each store overwrites the older
//! copy with a higher generation and a CRC32 over the copy, so a write torn
//! by power loss leaves the other copy intact.

use crate::error::CoreResult;
use eventlink_storage::{FieldStore, StorageBackend};
use tracing::warn;

/// Width of one header value.
pub const POS_VALUE_LEN: u64 = 8;

/// Byte index of the read cursor within the header.
pub const READ_POS_IDX: u64 = 0;

/// Byte index of the write cursor within the header.
pub const WRITE_POS_IDX: u64 = POS_VALUE_LEN;

/// Byte index of the sequence number (last assigned event ID).
pub const SEQ_ID_IDX: u64 = POS_VALUE_LEN * 2;

/// Byte index of the ack number (last delivered event ID).
pub const ACK_ID_IDX: u64 = POS_VALUE_LEN * 3;

/// Length of the four header values.
pub const HEADER_VALUES_LEN: u64 = POS_VALUE_LEN * 4;

/// Byte index of the generation within an inline header copy.
const GENERATION_IDX: u64 = HEADER_VALUES_LEN;

/// Byte index of the CRC32 within an inline header copy.
const CHECKSUM_IDX: u64 = GENERATION_IDX + POS_VALUE_LEN;

/// Length of one inline header copy, padded to a multiple of 8.
pub const HEADER_COPY_LEN: u64 = CHECKSUM_IDX + POS_VALUE_LEN;

/// Total header length: two inline copies.
pub const HEADER_LEN: u64 = HEADER_COPY_LEN * 2;

/// First byte of the circular data region.
pub const DATA_START: u64 = HEADER_LEN;

/// Length of the slot length prefix.
pub const ITEM_SIZE_LEN: u64 = 4;

/// The four durable header values as stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// Stored read cursor (0 if never written).
    pub read: u64,
    /// Stored write cursor (0 if never written).
    pub write: u64,
    /// Last assigned event ID.
    pub sequence: u64,
    /// Last event ID confirmed delivered.
    pub ack: u64,
}

impl Header {
    /// Encodes the four values as little-endian `u64`s.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_VALUES_LEN as usize] {
        let mut bytes = [0u8; HEADER_VALUES_LEN as usize];
        for (idx, value) in [
            (READ_POS_IDX, self.read),
            (WRITE_POS_IDX, self.write),
            (SEQ_ID_IDX, self.sequence),
            (ACK_ID_IDX, self.ack),
        ] {
            let start = idx as usize;
            bytes[start..start + POS_VALUE_LEN as usize].copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Decodes the four values; missing trailing bytes read as zero.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            read: read_u64(bytes, READ_POS_IDX),
            write: read_u64(bytes, WRITE_POS_IDX),
            sequence: read_u64(bytes, SEQ_ID_IDX),
            ack: read_u64(bytes, ACK_ID_IDX),
        }
    }

    /// Encodes one inline copy: values, generation and checksum.
    #[must_use]
    pub fn encode_copy(&self, generation: u64) -> [u8; HEADER_COPY_LEN as usize] {
        let mut bytes = [0u8; HEADER_COPY_LEN as usize];
        bytes[..HEADER_VALUES_LEN as usize].copy_from_slice(&self.to_bytes());
        let generation_at = GENERATION_IDX as usize;
        bytes[generation_at..generation_at + 8].copy_from_slice(&generation.to_le_bytes());
        let checksum_at = CHECKSUM_IDX as usize;
        let checksum = crc32fast::hash(&bytes[..checksum_at]);
        bytes[checksum_at..checksum_at + 4].copy_from_slice(&checksum.to_le_bytes());
        bytes
    }

    /// Decodes one inline copy, `None` if its checksum does not match.
    #[must_use]
    pub fn decode_copy(bytes: &[u8]) -> Option<(Self, u64)> {
        let checksum_at = CHECKSUM_IDX as usize;
        let stored = bytes.get(checksum_at..checksum_at + 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(stored);
        if crc32fast::hash(&bytes[..checksum_at]) != u32::from_le_bytes(raw) {
            return None;
        }
        Some((Self::from_bytes(bytes), read_u64(bytes, GENERATION_IDX)))
    }
}

fn read_u64(bytes: &[u8], idx: u64) -> u64 {
    let start = idx as usize;
    let mut raw = [0u8; POS_VALUE_LEN as usize];
    if let Some(src) = bytes.get(start..start + POS_VALUE_LEN as usize) {
        raw.copy_from_slice(src);
    }
    u64::from_le_bytes(raw)
}

enum Placement {
    Inline,
    Fields {
        store: Box<dyn FieldStore>,
        prefix: String,
    },
}

/// Where the ring header is persisted.
///
/// Inline, the header takes the first [`HEADER_LEN`] bytes of the region.
/// With a field store, the values live under `<prefix>0`, `<prefix>8`,
/// `<prefix>16` and `<prefix>24`; the inline bytes are still reserved so
/// positions do not depend on the placement.
pub struct HeaderStore {
    placement: Placement,
    generation: u64,
}

impl HeaderStore {
    /// Header stored at the head of the region.
    #[must_use]
    pub fn inline() -> Self {
        Self {
            placement: Placement::Inline,
            generation: 0,
        }
    }

    /// Header stored in `store` under keys `<prefix>0`, `<prefix>8`, ...
    pub fn fields(store: impl FieldStore + 'static, prefix: impl Into<String>) -> Self {
        Self {
            placement: Placement::Fields {
                store: Box::new(store),
                prefix: prefix.into(),
            },
            generation: 0,
        }
    }

    /// Returns true if the header lives in a field store.
    #[must_use]
    pub fn is_fields(&self) -> bool {
        matches!(self.placement, Placement::Fields { .. })
    }

    fn key(prefix: &str, idx: u64) -> String {
        format!("{prefix}{idx}")
    }

    /// Loads all four values.
    ///
    /// Inline, the valid copy with the highest generation wins. If neither
    /// copy is valid the header reads as all zeros.
    pub(crate) fn load(&mut self, backend: &dyn StorageBackend) -> CoreResult<Header> {
        match &self.placement {
            Placement::Inline => {
                let len = backend.size()?.min(HEADER_LEN) as usize;
                let bytes = backend.read_at(0, len)?;
                let newest = bytes
                    .chunks(HEADER_COPY_LEN as usize)
                    .filter_map(Header::decode_copy)
                    .max_by_key(|(_, generation)| *generation);
                match newest {
                    Some((header, generation)) => {
                        self.generation = generation;
                        Ok(header)
                    }
                    None => {
                        warn!("no valid header copy, treating region as empty");
                        self.generation = 0;
                        Ok(Header::default())
                    }
                }
            }
            Placement::Fields { store, prefix } => {
                let field = |idx| -> CoreResult<u64> {
                    Ok(store.read_field(&Self::key(prefix, idx))?.unwrap_or(0))
                };
                Ok(Header {
                    read: field(READ_POS_IDX)?,
                    write: field(WRITE_POS_IDX)?,
                    sequence: field(SEQ_ID_IDX)?,
                    ack: field(ACK_ID_IDX)?,
                })
            }
        }
    }

    /// Persists and flushes all four values.
    ///
    /// Field stores write the write cursor before the read cursor, so a
    /// crash between the two never leaves a read cursor ahead of its data.
    pub(crate) fn store(
        &mut self,
        backend: &mut dyn StorageBackend,
        header: &Header,
    ) -> CoreResult<()> {
        match &mut self.placement {
            Placement::Inline => {
                let generation = self.generation + 1;
                let offset = (generation % 2) * HEADER_COPY_LEN;
                backend.write_at(offset, &header.encode_copy(generation))?;
                backend.flush()?;
                self.generation = generation;
            }
            Placement::Fields { store, prefix } => {
                for (idx, value) in [
                    (WRITE_POS_IDX, header.write),
                    (READ_POS_IDX, header.read),
                    (SEQ_ID_IDX, header.sequence),
                    (ACK_ID_IDX, header.ack),
                ] {
                    store.write_field(&Self::key(prefix, idx), value)?;
                }
                store.commit()?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HeaderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.placement {
            Placement::Inline => f
                .debug_struct("Inline")
                .field("generation", &self.generation)
                .finish(),
            Placement::Fields { prefix, .. } => f
                .debug_struct("Fields")
                .field("prefix", prefix)
                .finish_non_exhaustive(),
        }
    }
}
