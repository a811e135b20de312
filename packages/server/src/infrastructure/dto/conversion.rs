//! Conversion logic between DTOs and domain types.

use std::sync::Arc;

use crate::domain::{
    ClientEvent, LanguageTag, MessagePushError, ServerEvent, Session, SessionCode,
    ValidationError,
};
use crate::infrastructure::dto::{http as http_dto, websocket as dto};
use pairpad_shared::time::timestamp_to_rfc3339;

// ========================================
// DTO → Domain
// ========================================

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value.ok_or(ValidationError::MissingField(field))
}

fn session_code(value: Option<String>) -> Result<SessionCode, ValidationError> {
    SessionCode::new(required(value, "session_code")?)
}

fn language(value: Option<String>) -> Result<LanguageTag, ValidationError> {
    LanguageTag::new(required(value, "language")?)
}

impl TryFrom<dto::ClientMessage> for ClientEvent {
    type Error = ValidationError;

    fn try_from(message: dto::ClientMessage) -> Result<Self, Self::Error> {
        match message {
            dto::ClientMessage::JoinSession(p) => Ok(Self::JoinSession {
                session_code: session_code(p.session_code)?,
            }),
            dto::ClientMessage::CodeChange(p) => Ok(Self::CodeChange {
                session_code: session_code(p.session_code)?,
                code: required(p.code, "code")?,
            }),
            dto::ClientMessage::LanguageChange(p) => Ok(Self::LanguageChange {
                session_code: session_code(p.session_code)?,
                language: language(p.language)?,
            }),
            dto::ClientMessage::ExecuteCode(p) => Ok(Self::ExecuteCode {
                session_code: session_code(p.session_code)?,
                code: required(p.code, "code")?,
                language: language(p.language)?,
            }),
        }
    }
}

/// Parse and validate a text frame into a domain event.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, ValidationError> {
    dto::ClientMessage::parse(text)?.try_into()
}

// ========================================
// Domain → DTO
// ========================================

impl From<&ServerEvent> for dto::ServerMessage {
    fn from(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::Connected => Self::Connected {},
            ServerEvent::SyncCode { code, language } => Self::SyncCode {
                code: code.clone(),
                language: language.as_str().to_string(),
            },
            ServerEvent::UserJoined {
                user_id,
                user_count,
            } => Self::UserJoined {
                user_id: user_id.as_str().to_string(),
                user_count: *user_count,
            },
            ServerEvent::CodeUpdated { code, user_id } => Self::CodeUpdated {
                code: code.clone(),
                user_id: user_id.as_str().to_string(),
            },
            ServerEvent::LanguageUpdated { language } => Self::LanguageUpdated {
                language: language.as_str().to_string(),
            },
            ServerEvent::CodeExecuting { user_id, language } => Self::CodeExecuting {
                user_id: user_id.as_str().to_string(),
                language: language.as_str().to_string(),
            },
            ServerEvent::UserLeft {
                user_id,
                user_count,
            } => Self::UserLeft {
                user_id: user_id.as_str().to_string(),
                user_count: *user_count,
            },
            ServerEvent::Error { message } => Self::Error {
                message: message.clone(),
            },
            ServerEvent::ExecutionError { error } => Self::ExecutionError {
                error: error.clone(),
            },
        }
    }
}

/// Encode an outbound event into a shareable text frame.
pub fn encode_server_event(event: &ServerEvent) -> Result<Arc<str>, MessagePushError> {
    serde_json::to_string(&dto::ServerMessage::from(event))
        .map(Arc::from)
        .map_err(|e| MessagePushError::Encode(e.to_string()))
}

impl From<Session> for http_dto::SessionSnapshotDto {
    fn from(session: Session) -> Self {
        Self {
            id: session.id.into_string(),
            session_code: session.code.into_string(),
            code: session.document,
            language: session.language.into_string(),
            connected_users: session.participant_count,
            created_at: timestamp_to_rfc3339(session.created_at.value()),
        }
    }
}

impl From<Session> for http_dto::CreateSessionResponse {
    fn from(session: Session) -> Self {
        Self {
            url: format!("/interview/{}", session.code),
            id: session.id.into_string(),
            code: session.code.into_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionId, SessionId, Timestamp};

    #[test]
    fn test_decode_code_change() {
        // テスト項目: code_change フレームがドメインイベントに変換される
        // given (前提条件):
        let text = r#"{"event":"code_change","data":{"session_code":"a1b2c3d4","code":"let x=1;"}}"#;

        // when (操作):
        let event = decode_client_event(text);

        // then (期待する結果): セッションコードは大文字に正規化される
        assert_eq!(
            event,
            Ok(ClientEvent::CodeChange {
                session_code: SessionCode::new("A1B2C3D4".to_string()).unwrap(),
                code: "let x=1;".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_missing_session_code_names_field() {
        // テスト項目: session_code が欠けたイベントは MissingField になる
        // given (前提条件):
        let text = r#"{"event":"language_change","data":{"language":"python"}}"#;

        // when (操作):
        let event = decode_client_event(text);

        // then (期待する結果):
        assert_eq!(event, Err(ValidationError::MissingField("session_code")));
    }

    #[test]
    fn test_decode_execute_requires_language() {
        // テスト項目: language が欠けた execute_code は MissingField になる
        // given (前提条件):
        let text = r#"{"event":"execute_code","data":{"session_code":"A1B2C3D4","code":"1+1"}}"#;

        // when (操作):
        let event = decode_client_event(text);

        // then (期待する結果):
        assert_eq!(event, Err(ValidationError::MissingField("language")));
    }

    #[test]
    fn test_decode_empty_code_is_allowed() {
        // テスト項目: 空のドキュメントへの変更は有効なイベントとして扱われる
        // given (前提条件):
        let text = r#"{"event":"code_change","data":{"session_code":"A1B2C3D4","code":""}}"#;

        // when (操作):
        let event = decode_client_event(text);

        // then (期待する結果):
        assert!(matches!(event, Ok(ClientEvent::CodeChange { code, .. }) if code.is_empty()));
    }

    #[test]
    fn test_encode_code_updated() {
        // テスト項目: code_updated イベントが JSON にエンコードされる
        // given (前提条件):
        let event = ServerEvent::CodeUpdated {
            code: "let x=1;".to_string(),
            user_id: ConnectionId::from("alice"),
        };

        // when (操作):
        let frame = encode_server_event(&event).unwrap();

        // then (期待する結果):
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "code_updated", "data": {"code": "let x=1;", "user_id": "alice"}})
        );
    }

    #[test]
    fn test_session_to_create_response() {
        // テスト項目: Session から作成レスポンスへの変換で URL が組み立てられる
        // given (前提条件):
        let session = Session::new(
            SessionId::from_stored("id-1".to_string()),
            SessionCode::new("A1B2C3D4".to_string()).unwrap(),
            Timestamp::new(0),
        );

        // when (操作):
        let response: http_dto::CreateSessionResponse = session.into();

        // then (期待する結果):
        assert_eq!(response.id, "id-1");
        assert_eq!(response.code, "A1B2C3D4");
        assert_eq!(response.url, "/interview/A1B2C3D4");
    }
}
