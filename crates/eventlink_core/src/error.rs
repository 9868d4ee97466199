//! Error types for EventLink core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in EventLink core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] eventlink_storage::StorageError),

    /// Zero-length items cannot be told apart from unwritten space.
    #[error("cannot store an empty item")]
    EmptyItem,

    /// The item (including its length prefix) does not fit the buffer.
    #[error("item of {size} bytes exceeds buffer capacity of {capacity} bytes")]
    ItemTooLarge {
        /// Slot size including the length prefix.
        size: u64,
        /// Buffer capacity.
        capacity: u64,
    },

    /// A cursor position outside the data region was requested.
    #[error("position {position} outside data region {start}..{end}")]
    InvalidPosition {
        /// The requested position.
        position: u64,
        /// First byte of the data region.
        start: u64,
        /// One past the last byte of the data region.
        end: u64,
    },

    /// A slot with an impossible length prefix was found.
    #[error("corrupted slot at position {position}: {message}")]
    Corrupted {
        /// Position of the slot.
        position: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A stored block does not have the configured event block size.
    #[error("invalid event block size: expected {expected}, actual {actual}")]
    BlockSizeMismatch {
        /// Configured block size.
        expected: usize,
        /// Size of the stored block.
        actual: usize,
    },

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupted slot error.
    pub fn corrupted(position: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            position,
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
