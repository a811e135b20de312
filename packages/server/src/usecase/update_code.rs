//! UseCase: ドキュメントの更新
//!
//! ドキュメント全体を置き換え（後勝ち）、送信者以外に `code_updated` を配信します。

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, MessagePusher, ServerEvent, SessionCode},
    infrastructure::{connection::ConnectionManager, registry::SessionRegistry},
};

use super::{
    error::RoomEventError,
    room::{enter_joined_room, fan_out},
};

/// ドキュメント更新のユースケース
pub struct UpdateCodeUseCase {
    registry: Arc<SessionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    connections: Arc<ConnectionManager>,
}

impl UpdateCodeUseCase {
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
        text: String,
    ) -> Result<(), RoomEventError> {
        let mut lease = enter_joined_room(&self.registry, &self.connections, handle, code).await?;
        lease.set_document(text.clone());
        tracing::debug!(
            "'{}' updated session '{}' ({} bytes)",
            handle,
            code,
            text.len()
        );
        let updated = ServerEvent::CodeUpdated {
            code: text,
            user_id: handle.clone(),
        };
        fan_out(
            &mut lease,
            self.message_pusher.as_ref(),
            &self.connections,
            &updated,
            Some(handle),
        )
        .await;
        Ok(())
    }
}
