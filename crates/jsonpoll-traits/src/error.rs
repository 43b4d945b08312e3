//! Transport error types.

use thiserror::Error;

/// A specialized `Result` type for polling transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur while a polling transport talks to a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The caller asked a text-only transport to deliver a binary frame.
    ///
    /// This is a contract violation by the protocol layer, never a client error.
    #[error("binary frames are not supported by the {0} transport")]
    BinaryNotSupported(&'static str),

    /// The sink already wrote its single response.
    #[error("transport is no longer active")]
    Inactive,

    /// The session is closing or closed.
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// The application message handler failed while processing a batch.
    #[error("Message handler failed: {0}")]
    HandlerFailed(String),

    /// Failed to serialize or deserialize a payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

impl TransportError {
    /// Create a handler failure from any displayable error.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Self::HandlerFailed(err.to_string())
    }

    /// Whether this error is an irrecoverable programming-contract violation.
    ///
    /// Fatal errors must not be translated into HTTP responses; the caller
    /// that produced them is broken.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BinaryNotSupported(_))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}
