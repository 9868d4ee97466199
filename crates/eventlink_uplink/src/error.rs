//! Error types for event delivery.

use thiserror::Error;

/// Result type for uplink operations.
pub type UplinkResult<T> = Result<T, UplinkError>;

/// Errors that can occur while delivering events.
#[derive(Error, Debug)]
pub enum UplinkError {
    /// Radio or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the send can be retried.
        retryable: bool,
    },

    /// The device has not joined the network yet.
    #[error("not joined to the uplink network")]
    NotJoined,

    /// Event log failure.
    #[error("event log error: {0}")]
    Core(#[from] eventlink_core::CoreError),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl UplinkError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the operation may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            UplinkError::Transport { retryable, .. } => *retryable,
            UplinkError::NotJoined => true,
            UplinkError::Core(_) => true,
            UplinkError::Config(_) => false,
        }
    }
}
