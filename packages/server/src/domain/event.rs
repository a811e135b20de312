//! Protocol events.
//!
//! Closed sets of inbound and outbound events. The wire encoding lives in
//! `infrastructure::dto::websocket`.

use super::value_object::{ConnectionId, LanguageTag, SessionCode};

/// Validated event received from a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinSession {
        session_code: SessionCode,
    },
    CodeChange {
        session_code: SessionCode,
        code: String,
    },
    LanguageChange {
        session_code: SessionCode,
        language: LanguageTag,
    },
    ExecuteCode {
        session_code: SessionCode,
        code: String,
        language: LanguageTag,
    },
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinSession { .. } => "join_session",
            Self::CodeChange { .. } => "code_change",
            Self::LanguageChange { .. } => "language_change",
            Self::ExecuteCode { .. } => "execute_code",
        }
    }

    pub fn session_code(&self) -> &SessionCode {
        match self {
            Self::JoinSession { session_code }
            | Self::CodeChange { session_code, .. }
            | Self::LanguageChange { session_code, .. }
            | Self::ExecuteCode { session_code, .. } => session_code,
        }
    }
}

/// Event sent to one participant or fanned out to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Connected,
    SyncCode {
        code: String,
        language: LanguageTag,
    },
    UserJoined {
        user_id: ConnectionId,
        user_count: usize,
    },
    CodeUpdated {
        code: String,
        user_id: ConnectionId,
    },
    LanguageUpdated {
        language: LanguageTag,
    },
    CodeExecuting {
        user_id: ConnectionId,
        language: LanguageTag,
    },
    UserLeft {
        user_id: ConnectionId,
        user_count: usize,
    },
    Error {
        message: String,
    },
    ExecutionError {
        error: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
