//! UseCase: 切断と退出
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - LeaveSessionUseCase::execute() / evict() メソッド
//!
//! ### どのような状況を想定しているか
//! - 正常系：入室中の接続の切断（残りの参加者に user_left）
//! - エッジケース：ルームに入っていない接続の切断（何もしない）
//! - エッジケース：2 回目の切断（冪等）

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, MessagePusher},
    infrastructure::{connection::ConnectionManager, registry::SessionRegistry},
};

use super::room::leave_room;

/// 切断処理のユースケース
pub struct LeaveSessionUseCase {
    registry: Arc<SessionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    connections: Arc<ConnectionManager>,
}

impl LeaveSessionUseCase {
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

    /// トランスポートが閉じた接続の後始末
    ///
    /// # Returns
    ///
    /// 退出したルームの残り人数。ルームに入っていなかった場合は `None`。
    pub async fn execute(&self, handle: &ConnectionId) -> Option<usize> {
        let code = self.connections.close(handle).await?;
        leave_room(
            &self.registry,
            self.message_pusher.as_ref(),
            &self.connections,
            &code,
            handle,
        )
        .await
    }

    /// ルーム外から配信に失敗した接続を閉じる
    pub async fn evict(&self, handle: &ConnectionId) -> Option<usize> {
        let code = self.connections.evict(handle).await?;
        leave_room(
            &self.registry,
            self.message_pusher.as_ref(),
            &self.connections,
            &code,
            handle,
        )
        .await
    }
}
