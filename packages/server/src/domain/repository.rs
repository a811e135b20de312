//! Repository trait 定義
//!
//! ドメイン層が必要とする永続化ストアへのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! - `InMemorySessionStore`: テスト・`--in-memory` 起動用
//! - `SqliteSessionStore`: 本番用（プロセス再起動後もセッションが残る）

use async_trait::async_trait;

use super::{LanguageTag, RepositoryError, Session, SessionCode};

/// Session Store trait
///
/// Durable record per session. Short-code uniqueness must be enforced here: a second
/// `create_session` with an existing code fails with [`RepositoryError::Conflict`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session row.
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError>;

    /// Look up a session by its short code.
    async fn get_by_code(&self, code: &SessionCode) -> Result<Session, RepositoryError>;

    /// Replace the stored document text.
    async fn update_text(&self, code: &SessionCode, text: &str) -> Result<(), RepositoryError>;

    /// Replace the stored language tag.
    async fn update_language(
        &self,
        code: &SessionCode,
        language: &LanguageTag,
    ) -> Result<(), RepositoryError>;

    /// Store the current participant count.
    async fn update_participant_count(
        &self,
        code: &SessionCode,
        count: usize,
    ) -> Result<(), RepositoryError>;
}
