//! WebSocket を使った MessagePusher 実装（Room Broadcaster）
//!
//! ## 責務
//!
//! - セッションごとの配信先チャンネル（`PeerLink`）を管理
//! - ルーム単位のブロードキャストと、単一接続へのユニキャスト
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `PeerLink` を受け取り、エンコード済みフレームを送信します。
//!
//! 送信は `try_send` のみで行い、遅いピアや切断済みのピアがルーム全体を止めることはありません。
//! 送信に失敗したハンドルはルームから外され、呼び出し元に返されます。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ConnectionId, MessagePushError, MessagePusher, PeerLink, ServerEvent, SessionCode},
    infrastructure::dto::conversion::encode_server_event,
};

type RoomChannels = HashMap<ConnectionId, PeerLink>;

/// WebSocket を使った MessagePusher 実装
///
/// ## フィールド
///
/// - `rooms`: セッションコードごとの配信先チャンネル
///
/// 外側の Mutex は部屋の検索・追加時にのみ短時間保持し、配信中は部屋ごとの Mutex だけを保持します。
#[derive(Default)]
pub struct WebSocketMessagePusher {
    rooms: Mutex<HashMap<SessionCode, Arc<Mutex<RoomChannels>>>>,
}

impl WebSocketMessagePusher {
    /// 新しい WebSocketMessagePusher を作成
    pub fn new() -> Self {
        Self::default()
    }

    async fn room(&self, code: &SessionCode) -> Option<Arc<Mutex<RoomChannels>>> {
        self.rooms.lock().await.get(code).cloned()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn join(&self, code: &SessionCode, link: PeerLink) {
        let room = {
            let mut rooms = self.rooms.lock().await;
            Arc::clone(rooms.entry(code.clone()).or_default())
        };
        let handle = link.id().clone();
        room.lock().await.insert(handle.clone(), link);
        tracing::debug!("Connection '{}' joined room '{}'", handle, code);
    }

    async fn leave(&self, code: &SessionCode, handle: &ConnectionId) {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(code).cloned() else {
            return;
        };
        let mut channels = room.lock().await;
        if channels.remove(handle).is_some() {
            tracing::debug!("Connection '{}' left room '{}'", handle, code);
        }
        if channels.is_empty() {
            rooms.remove(code);
        }
    }

    async fn push_to(&self, link: &PeerLink, event: &ServerEvent) -> Result<(), MessagePushError> {
        let frame = encode_server_event(event)?;
        link.deliver(frame)?;
        tracing::debug!("Pushed event to connection '{}'", link.id());
        Ok(())
    }

    async fn broadcast(
        &self,
        code: &SessionCode,
        event: &ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> Vec<ConnectionId> {
        let frame = match encode_server_event(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Failed to encode broadcast for room '{}': {}", code, e);
                return Vec::new();
            }
        };
        let Some(room) = self.room(code).await else {
            return Vec::new();
        };

        let mut channels = room.lock().await;
        let mut failed = Vec::new();
        let mut delivered = 0usize;
        for (handle, link) in channels.iter() {
            if exclude == Some(handle) {
                continue;
            }
            // ブロードキャストでは一部の送信失敗を許容し、失敗したピアは切断扱いにする
            match link.deliver(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!("Failed to push event in room '{}': {}", code, e);
                    failed.push(handle.clone());
                }
            }
        }
        for handle in &failed {
            channels.remove(handle);
        }
        tracing::debug!(
            "Broadcasted event to {} connection(s) in room '{}'",
            delivered,
            code
        );
        failed
    }

    async fn member_count(&self, code: &SessionCode) -> usize {
        match self.room(code).await {
            Some(room) => room.lock().await.len(),
            None => 0,
        }
    }
}
