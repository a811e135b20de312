//! Entities
//!
//! 識別子を持ち、ライフサイクルを通じて状態が変化するドメインモデルを定義します。
//!
//! - [`Session`]: 永続化されるセッションのスナップショット
//! - [`LiveSession`]: Registry が保持する、接続中の参加者を含むライブ状態

use std::collections::BTreeSet;

use serde::Serialize;

use super::value_object::{
    ConnectionId, DEFAULT_DOCUMENT, LanguageTag, SessionCode, SessionId, Timestamp,
};

/// Durable view of one collaborative editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub code: SessionCode,
    pub document: String,
    pub language: LanguageTag,
    pub created_at: Timestamp,
    pub participant_count: usize,
}

impl Session {
    /// Create a session with the initial editor contents and the default language.
    pub fn new(id: SessionId, code: SessionCode, created_at: Timestamp) -> Self {
        Self {
            id,
            code,
            document: DEFAULT_DOCUMENT.to_string(),
            language: LanguageTag::default(),
            created_at,
            participant_count: 0,
        }
    }
}

/// Live, write-serialized state of a session.
///
/// The membership set is authoritative; `participant_count` in snapshots is always
/// derived from it.
#[derive(Debug, Clone)]
pub struct LiveSession {
    id: SessionId,
    code: SessionCode,
    document: String,
    language: LanguageTag,
    created_at: Timestamp,
    members: BTreeSet<ConnectionId>,
}

impl LiveSession {
    /// Build a live entry from a stored session. Nobody is connected yet, whatever
    /// the stored participant count says.
    pub fn from_session(session: Session) -> Self {
        Self {
            id: session.id,
            code: session.code,
            document: session.document,
            language: session.language,
            created_at: session.created_at,
            members: BTreeSet::new(),
        }
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn language(&self) -> &LanguageTag {
        &self.language
    }

    /// Replace the whole document (last write wins).
    pub fn set_document(&mut self, document: String) {
        self.document = document;
    }

    pub fn set_language(&mut self, language: LanguageTag) {
        self.language = language;
    }

    /// Add a member and return the resulting count. Adding twice is a no-op.
    pub fn add_member(&mut self, handle: ConnectionId) -> usize {
        self.members.insert(handle);
        self.members.len()
    }

    /// Remove a member if present and return the resulting count.
    pub fn remove_member(&mut self, handle: &ConnectionId) -> usize {
        self.members.remove(handle);
        self.members.len()
    }

    pub fn has_member(&self, handle: &ConnectionId) -> bool {
        self.members.contains(handle)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = &ConnectionId> {
        self.members.iter()
    }

    pub fn snapshot(&self) -> Session {
        Session {
            id: self.id.clone(),
            code: self.code.clone(),
            document: self.document.clone(),
            language: self.language.clone(),
            created_at: self.created_at,
            participant_count: self.members.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_session() -> Session {
        Session::new(
            SessionId::generate(),
            SessionCode::new("A1B2C3D4".to_string()).unwrap(),
            Timestamp::new(1000),
        )
    }

    #[test]
    fn test_new_session_has_default_contents() {
        // テスト項目: 新規セッションは初期テキストとデフォルト言語を持つ
        // given (前提条件):

        // when (操作):
        let session = create_test_session();

        // then (期待する結果):
        assert_eq!(session.document, "// Start coding here...\n");
        assert_eq!(session.language.as_str(), "javascript");
        assert_eq!(session.participant_count, 0);
    }

    #[test]
    fn test_live_session_ignores_stored_participant_count() {
        // テスト項目: ハイドレーション時は保存済みの参加者数ではなく空のメンバーから始まる
        // given (前提条件):
        let mut session = create_test_session();
        session.participant_count = 3;

        // when (操作):
        let live = LiveSession::from_session(session);

        // then (期待する結果):
        assert_eq!(live.member_count(), 0);
        assert_eq!(live.snapshot().participant_count, 0);
    }

    #[test]
    fn test_add_member_is_idempotent() {
        // テスト項目: 同じハンドルを二度追加しても参加者数は増えない
        // given (前提条件):
        let mut live = LiveSession::from_session(create_test_session());
        let alice = ConnectionId::from("alice");

        // when (操作):
        let first = live.add_member(alice.clone());
        let second = live.add_member(alice);

        // then (期待する結果):
        assert_eq!(first, 1);
        assert_eq!(second, 1);
    }

    #[test]
    fn test_remove_absent_member_returns_unchanged_count() {
        // テスト項目: 存在しないハンドルの削除は参加者数を変えない
        // given (前提条件):
        let mut live = LiveSession::from_session(create_test_session());
        live.add_member(ConnectionId::from("alice"));

        // when (操作):
        let count = live.remove_member(&ConnectionId::from("bob"));

        // then (期待する結果):
        assert_eq!(count, 1);
        assert!(live.has_member(&ConnectionId::from("alice")));
    }

    #[test]
    fn test_snapshot_reflects_latest_document() {
        // テスト項目: 最後に書き込まれたドキュメントがスナップショットに反映される (last-write-wins)
        // given (前提条件):
        let mut live = LiveSession::from_session(create_test_session());

        // when (操作):
        live.set_document("text1".to_string());
        live.set_document("text2".to_string());

        // then (期待する結果):
        assert_eq!(live.snapshot().document, "text2");
    }
}
