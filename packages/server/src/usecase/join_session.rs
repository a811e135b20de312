//! UseCase: セッションへの参加
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinSessionUseCase::execute() メソッド
//! - 参加者数の更新、`user_joined` のブロードキャスト、`sync_code` のユニキャスト
//!
//! ### どのような状況を想定しているか
//! - 正常系：1 人目・2 人目の参加
//! - 正常系：同じルームへの再参加（`sync_code` のみ再送）
//! - 正常系：別ルームへの移動（元のルームから退出してから参加）
//! - 異常系：存在しないセッション（入室中なら元のルームに留まる）

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, MessagePusher, ServerEvent, SessionCode},
    infrastructure::{
        connection::{ConnectionManager, ProtocolState},
        registry::{RoomLease, SessionRegistry},
    },
};

use super::{
    error::JoinSessionError,
    room::{fan_out, leave_room, unicast_member},
};

/// セッション参加のユースケース
pub struct JoinSessionUseCase {
    registry: Arc<SessionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    connections: Arc<ConnectionManager>,
}

impl JoinSessionUseCase {
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

    /// 接続をセッションに参加させる
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - 参加後のルームの人数
    /// * `Err(JoinSessionError)` - セッションが存在しない、または接続が閉じている
    pub async fn execute(
        &self,
        handle: &ConnectionId,
        code: SessionCode,
    ) -> Result<usize, JoinSessionError> {
        let state = self.connections.state(handle).await;
        match &state {
            ProtocolState::Closed => return Err(JoinSessionError::Closed),
            ProtocolState::InRoom(current) if *current == code => {
                return self.resync(handle, &code).await;
            }
            _ => {}
        }

        // The current room is only left once the target session resolves.
        self.registry.hydrate(&code).await?;
        if let ProtocolState::InRoom(_) = state {
            if let Some(previous) = self.connections.leave_room(handle).await {
                leave_room(
                    &self.registry,
                    self.message_pusher.as_ref(),
                    &self.connections,
                    &previous,
                    handle,
                )
                .await;
            }
        }

        let link = self
            .connections
            .link(handle)
            .await
            .ok_or(JoinSessionError::Closed)?;
        let mut lease = self.registry.enter(&code).await?;

        self.message_pusher.join(&code, link.clone()).await;
        let user_count = lease.add_member(handle.clone());
        if !self.connections.enter_room(handle, code.clone()).await {
            lease.remove_member(handle);
            self.message_pusher.leave(&code, handle).await;
            return Err(JoinSessionError::Closed);
        }
        tracing::info!("'{}' joined session '{}' ({} members)", handle, code, user_count);

        let joined = ServerEvent::UserJoined {
            user_id: handle.clone(),
            user_count,
        };
        fan_out(
            &mut lease,
            self.message_pusher.as_ref(),
            &self.connections,
            &joined,
            None,
        )
        .await;
        if lease.has_member(handle) {
            self.send_sync(&mut lease, handle).await;
        }
        Ok(lease.member_count())
    }

    async fn resync(
        &self,
        handle: &ConnectionId,
        code: &SessionCode,
    ) -> Result<usize, JoinSessionError> {
        let mut lease = self.registry.enter(code).await?;
        if !lease.has_member(handle) {
            return Err(JoinSessionError::Closed);
        }
        self.send_sync(&mut lease, handle).await;
        Ok(lease.member_count())
    }

    async fn send_sync(&self, lease: &mut RoomLease, handle: &ConnectionId) {
        let Some(link) = self.connections.link(handle).await else {
            return;
        };
        let sync = ServerEvent::SyncCode {
            code: lease.document().to_string(),
            language: lease.language().clone(),
        };
        unicast_member(
            lease,
            self.message_pusher.as_ref(),
            &self.connections,
            &link,
            &sync,
        )
        .await;
    }
}
