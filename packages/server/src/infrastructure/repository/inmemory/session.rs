//! InMemory Session Store 実装
//!
//! ドメイン層が定義する SessionStore trait の具体的な実装。
//! HashMap をインメモリ DB として使用します（キーはセッションコード）。
//!
//! プロセスが終了するとデータは失われるため、テストと `--in-memory` 起動でのみ使用します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{LanguageTag, RepositoryError, Session, SessionCode, SessionStore};

/// インメモリ Session Store 実装
#[derive(Default)]
pub struct InMemorySessionStore {
    /// Key: セッションコード
    sessions: Mutex<HashMap<SessionCode, Session>>,
}

impl InMemorySessionStore {
    /// 新しい InMemorySessionStore を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みセッション数を取得
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    async fn update_with(
        &self,
        code: &SessionCode,
        apply: impl FnOnce(&mut Session),
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| RepositoryError::NotFound(code.as_str().to_string()))?;
        apply(session);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.code) {
            return Err(RepositoryError::Conflict(session.code.as_str().to_string()));
        }
        sessions.insert(session.code.clone(), session.clone());
        Ok(())
    }

    async fn get_by_code(&self, code: &SessionCode) -> Result<Session, RepositoryError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(code)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(code.as_str().to_string()))
    }

    async fn update_text(&self, code: &SessionCode, text: &str) -> Result<(), RepositoryError> {
        self.update_with(code, |session| session.document = text.to_string())
            .await
    }

    async fn update_language(
        &self,
        code: &SessionCode,
        language: &LanguageTag,
    ) -> Result<(), RepositoryError> {
        self.update_with(code, |session| session.language = language.clone())
            .await
    }

    async fn update_participant_count(
        &self,
        code: &SessionCode,
        count: usize,
    ) -> Result<(), RepositoryError> {
        self.update_with(code, |session| session.participant_count = count)
            .await
    }
}
