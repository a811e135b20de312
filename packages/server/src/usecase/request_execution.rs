//! UseCase: コード実行の通知
//!
//! 状態は変更せず、送信者以外に `code_executing` を配信します。
//! 実行そのものはクライアント側で行われます。

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, LanguageTag, MessagePusher, ServerEvent, SessionCode},
    infrastructure::{connection::ConnectionManager, registry::SessionRegistry},
};

use super::{
    error::RoomEventError,
    room::{enter_joined_room, fan_out},
};

/// コード実行通知のユースケース
pub struct RequestExecutionUseCase {
    registry: Arc<SessionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    connections: Arc<ConnectionManager>,
}

impl RequestExecutionUseCase {
    pub fn new(
        registry: Arc<SessionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            connections,
        }
    }

    pub async fn execute(
        &self,
        handle: &ConnectionId,
        code: &SessionCode,
        language: LanguageTag,
    ) -> Result<(), RoomEventError> {
        let mut lease = enter_joined_room(&self.registry, &self.connections, handle, code).await?;
        let executing = ServerEvent::CodeExecuting {
            user_id: handle.clone(),
            language,
        };
        fan_out(
            &mut lease,
            self.message_pusher.as_ref(),
            &self.connections,
            &executing,
            Some(handle),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::{join_session::JoinSessionUseCase, test_support::TestHarness};

    #[tokio::test]
    async fn test_request_execution_does_not_mutate() {
        // テスト項目: 実行通知は他の参加者に届き、ドキュメントは変わらない
        // given (前提条件):
        let harness = TestHarness::new();
        let session = harness.create_session().await;
        let join = JoinSessionUseCase::new(
            harness.registry.clone(),
            harness.message_pusher.clone(),
            harness.connections.clone(),
        );
        let usecase = RequestExecutionUseCase::new(
            harness.registry.clone(),
            harness.message_pusher.clone(),
            harness.connections.clone(),
        );
        let (alice, mut alice_rx) = harness.open("alice", 16).await;
        let (bob, mut bob_rx) = harness.open("bob", 16).await;
        join.execute(&alice, session.code.clone()).await.unwrap();
        join.execute(&bob, session.code.clone()).await.unwrap();
        alice_rx.drain();
        bob_rx.drain();

        // when (操作):
        usecase
            .execute(
                &alice,
                &session.code,
                LanguageTag::new("python".to_string()).unwrap(),
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert!(alice_rx.drain().is_empty());
        let frames = bob_rx.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "code_executing");
        assert_eq!(frames[0]["data"]["user_id"], "alice");
        assert_eq!(frames[0]["data"]["language"], "python");
        let live = harness.registry.hydrate(&session.code).await.unwrap();
        assert_eq!(live.document, "// Start coding here...\n");
        assert_eq!(live.language.as_str(), "javascript");
    }
}
