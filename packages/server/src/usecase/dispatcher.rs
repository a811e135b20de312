//! Event Dispatcher（プロトコルの状態機械）
//!
//! 1 接続ぶんの受信イベントを対応するユースケースに振り分け、
//! エラーを送信者へのユニキャスト（`error` / `execution_error`）に変換します。
//!
//! 状態遷移:
//!
//! ```text
//! Connected --join_session--> InRoom(code) --disconnect--> Closed
//!     ^                          |  ^
//!     |                          |  +-- code_change / language_change / execute_code
//!     +---- join 失敗は Connected のまま
//! ```
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - 2 人の参加者による一連のプロトコルのやり取り
//! - 検証エラーが送信者のみに返り、ルームに副作用を起こさないこと
//! - 配信に失敗した参加者が切り離され、他の参加者への配信が継続すること

use std::sync::Arc;

use crate::{
    domain::{ClientEvent, ConnectionId, MessagePusher, PeerLink, ServerEvent, Timestamp},
    infrastructure::{connection::ConnectionManager, registry::SessionRegistry},
};

use super::{
    ConnectParticipantUseCase, JoinSessionUseCase, LeaveSessionUseCase, RequestExecutionUseCase,
    UpdateCodeUseCase, UpdateLanguageUseCase,
    error::{JoinSessionError, RoomEventError},
};

const SESSION_NOT_FOUND: &str = "Session not found";

pub struct EventDispatcher {
    connect_participant_usecase: ConnectParticipantUseCase,
    join_session_usecase: JoinSessionUseCase,
    update_code_usecase: UpdateCodeUseCase,
    update_language_usecase: UpdateLanguageUseCase,
    request_execution_usecase: RequestExecutionUseCase,
    leave_session_usecase: LeaveSessionUseCase,
    message_pusher: Arc<dyn MessagePusher>,
    connections: Arc<ConnectionManager>,
}

impl EventDispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            connect_participant_usecase: ConnectParticipantUseCase::new(
                message_pusher.clone(),
                connections.clone(),
            ),
            join_session_usecase: JoinSessionUseCase::new(
                registry.clone(),
                message_pusher.clone(),
                connections.clone(),
            ),
            update_code_usecase: UpdateCodeUseCase::new(
                registry.clone(),
                message_pusher.clone(),
                connections.clone(),
            ),
            update_language_usecase: UpdateLanguageUseCase::new(
                registry.clone(),
                message_pusher.clone(),
                connections.clone(),
            ),
            request_execution_usecase: RequestExecutionUseCase::new(
                registry.clone(),
                message_pusher.clone(),
                connections.clone(),
            ),
            leave_session_usecase: LeaveSessionUseCase::new(
                registry,
                message_pusher.clone(),
                connections.clone(),
            ),
            message_pusher,
            connections,
        }
    }

    /// Accept a new connection and greet it with `connected`.
    pub async fn connect(&self, link: PeerLink) -> Timestamp {
        self.connect_participant_usecase.execute(link).await
    }

    /// Apply one validated inbound event.
    pub async fn dispatch(&self, handle: &ConnectionId, event: ClientEvent) {
        tracing::debug!("'{}' -> {}", handle, event.name());
        match event {
            ClientEvent::JoinSession { session_code } => {
                match self
                    .join_session_usecase
                    .execute(handle, session_code.clone())
                    .await
                {
                    Ok(_) => {}
                    Err(JoinSessionError::NotFound(code)) => {
                        tracing::warn!("'{}' tried to join unknown session '{}'", handle, code);
                        self.reply(handle, ServerEvent::error(SESSION_NOT_FOUND)).await;
                    }
                    Err(JoinSessionError::Closed) => {
                        tracing::debug!("Ignoring join from closed connection '{}'", handle);
                    }
                    Err(e @ JoinSessionError::Persistence(_)) => {
                        tracing::error!("'{}' could not join '{}': {}", handle, session_code, e);
                        self.reply(handle, ServerEvent::error(e.to_string())).await;
                    }
                }
            }
            ClientEvent::CodeChange { session_code, code } => {
                let result = self
                    .update_code_usecase
                    .execute(handle, &session_code, code)
                    .await;
                self.report(handle, "code_change", result, false).await;
            }
            ClientEvent::LanguageChange {
                session_code,
                language,
            } => {
                let result = self
                    .update_language_usecase
                    .execute(handle, &session_code, language)
                    .await;
                self.report(handle, "language_change", result, false).await;
            }
            ClientEvent::ExecuteCode {
                session_code,
                language,
                ..
            } => {
                let result = self
                    .request_execution_usecase
                    .execute(handle, &session_code, language)
                    .await;
                self.report(handle, "execute_code", result, true).await;
            }
        }
    }

    /// Reject an inbound frame that failed validation. Only the sender is told.
    pub async fn reject(&self, handle: &ConnectionId, reason: impl std::fmt::Display) {
        tracing::warn!("Rejected frame from '{}': {}", handle, reason);
        self.reply(handle, ServerEvent::error(reason.to_string())).await;
    }

    /// Clean up after the transport closed.
    pub async fn disconnect(&self, handle: &ConnectionId) {
        let remaining = self.leave_session_usecase.execute(handle).await;
        let open = self.connections.count().await;
        match remaining {
            Some(remaining) => tracing::info!(
                "'{}' disconnected ({} left in room, {} connections open)",
                handle,
                remaining,
                open
            ),
            None => tracing::info!("'{}' disconnected ({} connections open)", handle, open),
        }
    }

    async fn report(
        &self,
        handle: &ConnectionId,
        event: &str,
        result: Result<(), RoomEventError>,
        reply_when_missing: bool,
    ) {
        let Err(error) = result else {
            return;
        };
        match error {
            RoomEventError::SessionNotFound(code) if reply_when_missing => {
                tracing::warn!("{} for unknown session '{}' from '{}'", event, code, handle);
                self.reply(
                    handle,
                    ServerEvent::ExecutionError {
                        error: SESSION_NOT_FOUND.to_string(),
                    },
                )
                .await;
            }
            RoomEventError::SessionNotFound(code) => {
                tracing::debug!("Dropped {} for unknown session '{}'", event, code);
            }
            RoomEventError::NotMember => {
                tracing::debug!("Dropped {} from '{}': no longer a member", event, handle);
            }
            e @ RoomEventError::NotInSession(_) => {
                tracing::warn!("Rejected {} from '{}': {}", event, handle, e);
                self.reply(handle, ServerEvent::error(e.to_string())).await;
            }
            e @ RoomEventError::Persistence(_) => {
                tracing::error!("{} from '{}' failed: {}", event, handle, e);
                self.reply(handle, ServerEvent::error(e.to_string())).await;
            }
        }
    }

    /// Unicast to one connection; a failed delivery closes it.
    async fn reply(&self, handle: &ConnectionId, event: ServerEvent) {
        let Some(link) = self.connections.link(handle).await else {
            return;
        };
        if let Err(e) = self.message_pusher.push_to(&link, &event).await {
            tracing::warn!("Failed to reply to '{}': {}", handle, e);
            self.leave_session_usecase.evict(handle).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{LanguageTag, SessionCode, SessionStore, ValidationError},
        infrastructure::connection::ProtocolState,
        usecase::test_support::{TestHarness, TestPeer},
    };

    fn create_dispatcher(harness: &TestHarness) -> EventDispatcher {
        EventDispatcher::new(
            harness.registry.clone(),
            harness.message_pusher.clone(),
            harness.connections.clone(),
        )
    }

    async fn connect(
        dispatcher: &EventDispatcher,
        name: &str,
        capacity: usize,
    ) -> (ConnectionId, TestPeer) {
        let id = ConnectionId::from(name);
        let (link, rx) = PeerLink::channel(id.clone(), capacity);
        dispatcher.connect(link).await;
        (id, TestPeer { rx })
    }

    fn join(code: &SessionCode) -> ClientEvent {
        ClientEvent::JoinSession {
            session_code: code.clone(),
        }
    }

    fn change(code: &SessionCode, text: &str) -> ClientEvent {
        ClientEvent::CodeChange {
            session_code: code.clone(),
            code: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_connect_greets() {
        // テスト項目: 接続直後に `connected` が届く
        // given (前提条件):
        let harness = TestHarness::new();
        let dispatcher = create_dispatcher(&harness);

        // when (操作):
        let (_alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;

        // then (期待する結果):
        let frames = alice_rx.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "connected");
    }

    #[tokio::test]
    async fn test_two_participants_join() {
        // テスト項目: A と B が参加すると、A は人数 2 の user_joined を受け取り、
        //             B は sync_code をちょうど 1 回受け取る
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;
        let (bob, mut bob_rx) = connect(&dispatcher, "bob", 16).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        alice_rx.drain();

        // when (操作):
        dispatcher.dispatch(&bob, join(&session.code)).await;

        // then (期待する結果):
        let alice_frames = alice_rx.drain();
        assert_eq!(alice_frames.len(), 1);
        assert_eq!(alice_frames[0]["event"], "user_joined");
        assert_eq!(alice_frames[0]["data"]["user_id"], "bob");
        assert_eq!(alice_frames[0]["data"]["user_count"], 2);

        let bob_frames = bob_rx.drain();
        let sync: Vec<_> = bob_frames
            .iter()
            .filter(|f| f["event"] == "sync_code")
            .collect();
        assert_eq!(sync.len(), 1);
        assert!(
            bob_frames
                .iter()
                .any(|f| f["event"] == "user_joined" && f["data"]["user_count"] == 2)
        );
    }

    #[tokio::test]
    async fn test_join_unknown_code_errors_only_to_joiner() {
        // テスト項目: 存在しないコードへの参加では、参加者本人にだけ error が返る
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;
        let (bob, mut bob_rx) = connect(&dispatcher, "bob", 16).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        alice_rx.drain();
        bob_rx.drain();

        // when (操作):
        let missing = SessionCode::new("NOPE0000".to_string()).unwrap();
        dispatcher.dispatch(&bob, join(&missing)).await;

        // then (期待する結果):
        let frames = bob_rx.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "error");
        assert_eq!(frames[0]["data"]["message"], "Session not found");
        assert!(alice_rx.drain().is_empty());
        assert_eq!(harness.connections.state(&bob).await, ProtocolState::Connected);
    }

    #[tokio::test]
    async fn test_join_unknown_code_while_in_room_keeps_membership() {
        // テスト項目: 入室中に存在しないコードへ参加しても、元のルームに留まり誰にも通知されない
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;
        let (bob, mut bob_rx) = connect(&dispatcher, "bob", 16).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        dispatcher.dispatch(&bob, join(&session.code)).await;
        alice_rx.drain();
        bob_rx.drain();

        // when (操作):
        let missing = SessionCode::new("NOPE0000".to_string()).unwrap();
        dispatcher.dispatch(&alice, join(&missing)).await;

        // then (期待する結果):
        let frames = alice_rx.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "error");
        assert_eq!(frames[0]["data"]["message"], "Session not found");
        assert!(bob_rx.drain().is_empty());
        assert_eq!(
            harness.connections.state(&alice).await,
            ProtocolState::InRoom(session.code.clone())
        );
        assert_eq!(harness.message_pusher.member_count(&session.code).await, 2);
        let live = harness.registry.hydrate(&session.code).await.unwrap();
        assert_eq!(live.participant_count, 2);
    }

    #[tokio::test]
    async fn test_code_changes_arrive_in_order() {
        // テスト項目: 2 回の更新が順番通りに届き、Registry には最後の値が残る
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;
        let (bob, mut bob_rx) = connect(&dispatcher, "bob", 16).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        dispatcher.dispatch(&bob, join(&session.code)).await;
        alice_rx.drain();
        bob_rx.drain();

        // when (操作):
        dispatcher.dispatch(&alice, change(&session.code, "text1")).await;
        dispatcher.dispatch(&alice, change(&session.code, "text2")).await;

        // then (期待する結果):
        let updates = bob_rx.drain_events("code_updated");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0]["data"]["code"], "text1");
        assert_eq!(updates[1]["data"]["code"], "text2");
        assert!(alice_rx.drain().is_empty());
        let live = harness.registry.hydrate(&session.code).await.unwrap();
        assert_eq!(live.document, "text2");
    }

    #[tokio::test]
    async fn test_large_document_is_delivered_intact() {
        // テスト項目: 50,000 文字のドキュメントがそのまま届き、保存される
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, _alice_rx) = connect(&dispatcher, "alice", 16).await;
        let (bob, mut bob_rx) = connect(&dispatcher, "bob", 16).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        dispatcher.dispatch(&bob, join(&session.code)).await;
        bob_rx.drain();
        let document: String = "ab\"\\\n😀".chars().cycle().take(50_000).collect();

        // when (操作):
        dispatcher.dispatch(&alice, change(&session.code, &document)).await;
        harness.registry.flush().await;

        // then (期待する結果):
        let updates = bob_rx.drain_events("code_updated");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0]["data"]["code"].as_str(), Some(document.as_str()));
        let stored = harness.store.get_by_code(&session.code).await.unwrap();
        assert_eq!(stored.document, document);
    }

    #[tokio::test]
    async fn test_late_joiner_syncs_latest_state() {
        // テスト項目: 後から参加した接続の sync_code に、それまでの変更が反映されている
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, _alice_rx) = connect(&dispatcher, "alice", 16).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        dispatcher.dispatch(&alice, change(&session.code, "fn main() {}")).await;
        dispatcher
            .dispatch(
                &alice,
                ClientEvent::LanguageChange {
                    session_code: session.code.clone(),
                    language: LanguageTag::new("rust".to_string()).unwrap(),
                },
            )
            .await;

        // when (操作):
        let (carol, mut carol_rx) = connect(&dispatcher, "carol", 16).await;
        dispatcher.dispatch(&carol, join(&session.code)).await;

        // then (期待する結果):
        let sync = carol_rx.drain_events("sync_code");
        assert_eq!(sync.len(), 1);
        assert_eq!(sync[0]["data"]["code"], "fn main() {}");
        assert_eq!(sync[0]["data"]["language"], "rust");
    }

    #[tokio::test]
    async fn test_disconnect_announces_user_left() {
        // テスト項目: A の切断で B に人数 1 の user_left が届き、ストアの人数も減る
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, _alice_rx) = connect(&dispatcher, "alice", 16).await;
        let (bob, mut bob_rx) = connect(&dispatcher, "bob", 16).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        dispatcher.dispatch(&bob, join(&session.code)).await;
        bob_rx.drain();

        // when (操作):
        dispatcher.disconnect(&alice).await;
        harness.registry.flush().await;

        // then (期待する結果):
        let left = bob_rx.drain_events("user_left");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["data"]["user_id"], "alice");
        assert_eq!(left[0]["data"]["user_count"], 1);
        let stored = harness.store.get_by_code(&session.code).await.unwrap();
        assert_eq!(stored.participant_count, 1);
    }

    #[tokio::test]
    async fn test_rejected_frame_only_reaches_sender() {
        // テスト項目: 検証エラーは送信者にだけ error として返り、接続は維持される
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;
        let (bob, mut bob_rx) = connect(&dispatcher, "bob", 16).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        dispatcher.dispatch(&bob, join(&session.code)).await;
        alice_rx.drain();
        bob_rx.drain();

        // when (操作):
        dispatcher
            .reject(&alice, ValidationError::MissingField("session_code"))
            .await;

        // then (期待する結果):
        let frames = alice_rx.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "error");
        assert_eq!(
            frames[0]["data"]["message"],
            "Missing required field 'session_code'"
        );
        assert!(bob_rx.drain().is_empty());
        assert_eq!(
            harness.connections.state(&alice).await,
            ProtocolState::InRoom(session.code.clone())
        );
    }

    #[tokio::test]
    async fn test_room_event_before_join_is_rejected() {
        // テスト項目: 参加前の code_change は error になり、ルームには届かない
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;
        let (bob, mut bob_rx) = connect(&dispatcher, "bob", 16).await;
        dispatcher.dispatch(&bob, join(&session.code)).await;
        alice_rx.drain();
        bob_rx.drain();

        // when (操作):
        dispatcher.dispatch(&alice, change(&session.code, "sneaky")).await;

        // then (期待する結果):
        let frames = alice_rx.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "error");
        assert!(bob_rx.drain().is_empty());
    }

    #[tokio::test]
    async fn test_change_for_unknown_session_is_dropped() {
        // テスト項目: 解決できないセッションへの code_change は黙って破棄される
        // given (前提条件):
        let harness = TestHarness::new();
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;
        alice_rx.drain();
        let missing = SessionCode::new("NOPE0000".to_string()).unwrap();

        // when (操作):
        dispatcher.dispatch(&alice, change(&missing, "text")).await;

        // then (期待する結果):
        assert!(alice_rx.drain().is_empty());
    }

    #[tokio::test]
    async fn test_execute_for_unknown_session_replies_execution_error() {
        // テスト項目: 解決できないセッションへの execute_code には execution_error が返る
        // given (前提条件):
        let harness = TestHarness::new();
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 16).await;
        alice_rx.drain();

        // when (操作):
        dispatcher
            .dispatch(
                &alice,
                ClientEvent::ExecuteCode {
                    session_code: SessionCode::new("NOPE0000".to_string()).unwrap(),
                    code: "print(1)".to_string(),
                    language: LanguageTag::new("python".to_string()).unwrap(),
                },
            )
            .await;

        // then (期待する結果):
        let frames = alice_rx.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "execution_error");
        assert_eq!(frames[0]["data"]["error"], "Session not found");
    }

    #[tokio::test]
    async fn test_saturated_peer_is_dropped_without_blocking_others() {
        // テスト項目: 送信キューが詰まった参加者は切り離され、他の参加者への配信は続く
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let dispatcher = create_dispatcher(&harness);
        let (alice, mut alice_rx) = connect(&dispatcher, "alice", 64).await;
        let (carol, mut carol_rx) = connect(&dispatcher, "carol", 64).await;
        dispatcher.dispatch(&alice, join(&session.code)).await;
        dispatcher.dispatch(&carol, join(&session.code)).await;
        // bob のキューは容量 4：connected / user_joined / sync_code で残り 1
        let (bob, _bob_rx) = connect(&dispatcher, "bob", 4).await;
        dispatcher.dispatch(&bob, join(&session.code)).await;
        alice_rx.drain();
        carol_rx.drain();

        // when (操作):
        dispatcher.dispatch(&alice, change(&session.code, "one")).await;
        dispatcher.dispatch(&alice, change(&session.code, "two")).await;

        // then (期待する結果):
        let carol_frames = carol_rx.drain();
        let updates: Vec<_> = carol_frames
            .iter()
            .filter(|f| f["event"] == "code_updated")
            .collect();
        assert_eq!(updates.len(), 2);
        let left: Vec<_> = carol_frames
            .iter()
            .filter(|f| f["event"] == "user_left")
            .collect();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["data"]["user_id"], "bob");
        assert_eq!(left[0]["data"]["user_count"], 2);
        assert_eq!(alice_rx.drain_events("user_left").len(), 1);
        assert_eq!(harness.connections.state(&bob).await, ProtocolState::Closed);
        assert_eq!(harness.message_pusher.member_count(&session.code).await, 2);

        // 後から届いた切断処理では user_left は再送されない
        dispatcher.disconnect(&bob).await;
        assert!(carol_rx.drain_events("user_left").is_empty());
    }
}
