//! Domain errors.

use thiserror::Error;

/// Inbound event or value failed validation.
///
/// The event is dropped and the originator is notified; nothing room-wide happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Malformed event: {0}")]
    Malformed(String),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("Invalid session code '{0}'")]
    InvalidSessionCode(String),

    #[error("Not joined to session '{0}'")]
    NotInSession(String),
}

/// Session Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Session '{0}' not found")]
    NotFound(String),

    #[error("Session code '{0}' already exists")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Delivery errors raised by a [`MessagePusher`](super::MessagePusher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("Channel to '{0}' is closed")]
    Closed(String),

    #[error("Channel to '{0}' is full")]
    Saturated(String),

    #[error("Failed to encode event: {0}")]
    Encode(String),
}
