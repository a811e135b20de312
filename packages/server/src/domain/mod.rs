//! Domain layer
//!
//! セッション・ルーム・プロトコルイベントのドメインモデルと、
//! Infrastructure 層が実装するインターフェース（trait）を定義します。

pub mod entity;
pub mod error;
pub mod event;
pub mod factory;
pub mod message_pusher;
pub mod repository;
pub mod value_object;

pub use entity::{LiveSession, Session};
pub use error::{MessagePushError, RepositoryError, ValidationError};
pub use event::{ClientEvent, ServerEvent};
pub use factory::{CodeGenerator, RandomCodeGenerator, SequenceCodeGenerator};
pub use message_pusher::{MessagePusher, PeerLink, PusherChannel};
pub use repository::SessionStore;
pub use value_object::{
    ConnectionId, DEFAULT_DOCUMENT, DEFAULT_LANGUAGE, LanguageTag, SESSION_CODE_LEN, SessionCode,
    SessionId, Timestamp,
};
