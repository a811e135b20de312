//! WebSocket message DTOs.
//!
//! Every frame is a JSON object `{"event": <name>, "data": {...}}`.
//! Inbound payload fields are optional at this layer so that a missing field becomes a
//! [`ValidationError`] naming it, rather than an opaque parse failure.

use serde::{Deserialize, Serialize};

use crate::domain::ValidationError;

/// Raw inbound frame before the payload is interpreted.
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinSessionPayload {
    #[serde(default)]
    pub session_code: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct CodeChangePayload {
    #[serde(default)]
    pub session_code: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct LanguageChangePayload {
    #[serde(default)]
    pub session_code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecuteCodePayload {
    #[serde(default)]
    pub session_code: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Inbound message from a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    JoinSession(JoinSessionPayload),
    CodeChange(CodeChangePayload),
    LanguageChange(LanguageChangePayload),
    ExecuteCode(ExecuteCodePayload),
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        match envelope.event.as_str() {
            "join_session" => payload(envelope.data).map(Self::JoinSession),
            "code_change" => payload(envelope.data).map(Self::CodeChange),
            "language_change" => payload(envelope.data).map(Self::LanguageChange),
            "execute_code" => payload(envelope.data).map(Self::ExecuteCode),
            other => Err(ValidationError::Malformed(format!("unknown event '{other}'"))),
        }
    }
}

fn payload<T>(data: serde_json::Value) -> Result<T, ValidationError>
where
    T: Default + serde::de::DeserializeOwned,
{
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data).map_err(|e| ValidationError::Malformed(e.to_string()))
}

/// Outbound message to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {},
    SyncCode { code: String, language: String },
    UserJoined { user_id: String, user_count: usize },
    CodeUpdated { code: String, user_id: String },
    LanguageUpdated { language: String },
    CodeExecuting { user_id: String, language: String },
    UserLeft { user_id: String, user_count: usize },
    Error { message: String },
    ExecutionError { error: String },
}
