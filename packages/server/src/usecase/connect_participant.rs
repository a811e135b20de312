//! UseCase: 接続の受付
//!
//! 新しい接続を Connected 状態で登録し、`connected` を送信します。

use std::sync::Arc;

use crate::{
    domain::{MessagePusher, PeerLink, ServerEvent, Timestamp},
    infrastructure::connection::ConnectionManager,
};

/// 接続受付のユースケース
pub struct ConnectParticipantUseCase {
    message_pusher: Arc<dyn MessagePusher>,
    connections: Arc<ConnectionManager>,
}

impl ConnectParticipantUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, connections: Arc<ConnectionManager>) -> Self {
        Self {
            message_pusher,
            connections,
        }
    }

    /// 接続を登録し、接続時刻を返す
    pub async fn execute(&self, link: PeerLink) -> Timestamp {
        let connected_at = self.connections.open(link.clone()).await;
        if let Err(e) = self
            .message_pusher
            .push_to(&link, &ServerEvent::Connected)
            .await
        {
            tracing::warn!("Failed to greet '{}': {}", link.id(), e);
            self.connections.evict(link.id()).await;
        }
        connected_at
    }
}
