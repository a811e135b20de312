//! Connection Lifecycle Manager
//!
//! トランスポート層の接続ごとに、配信先（`PeerLink`）とプロトコル状態を保持します。
//!
//! 状態遷移: `Connected` → `InRoom(code)` → `Closed`
//!
//! ルームのクリティカルセクション内から呼ばれることがあるため、
//! このマネージャーのロックは常に短時間で解放し、保持したまま他のロックを取りません。

use std::{collections::HashMap, sync::Arc};

use pairpad_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{ConnectionId, PeerLink, SessionCode, Timestamp};

/// Per-connection protocol state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolState {
    Connected,
    InRoom(SessionCode),
    Closed,
}

impl ProtocolState {
    pub fn room(&self) -> Option<&SessionCode> {
        match self {
            Self::InRoom(code) => Some(code),
            _ => None,
        }
    }
}

struct ConnectionEntry {
    link: PeerLink,
    state: ProtocolState,
    connected_at: Timestamp,
}

pub struct ConnectionManager {
    connections: Mutex<HashMap<ConnectionId, ConnectionEntry>>,
    clock: Arc<dyn Clock>,
}

impl ConnectionManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Track a freshly opened connection in the `Connected` state.
    pub async fn open(&self, link: PeerLink) -> Timestamp {
        let connected_at = Timestamp::new(self.clock.now_millis());
        let id = link.id().clone();
        self.connections.lock().await.insert(
            id.clone(),
            ConnectionEntry {
                link,
                state: ProtocolState::Connected,
                connected_at,
            },
        );
        tracing::info!("Connection '{}' opened", id);
        connected_at
    }

    /// Current state; unknown connections are `Closed`.
    pub async fn state(&self, id: &ConnectionId) -> ProtocolState {
        self.connections
            .lock()
            .await
            .get(id)
            .map(|entry| entry.state.clone())
            .unwrap_or(ProtocolState::Closed)
    }

    pub async fn link(&self, id: &ConnectionId) -> Option<PeerLink> {
        self.connections
            .lock()
            .await
            .get(id)
            .map(|entry| entry.link.clone())
    }

    /// Move a live connection into `code`. Returns `false` if it is already closed.
    pub async fn enter_room(&self, id: &ConnectionId, code: SessionCode) -> bool {
        match self.connections.lock().await.get_mut(id) {
            Some(entry) if entry.state != ProtocolState::Closed => {
                entry.state = ProtocolState::InRoom(code);
                true
            }
            _ => false,
        }
    }

    /// Return a connection to `Connected`, yielding the room it left.
    pub async fn leave_room(&self, id: &ConnectionId) -> Option<SessionCode> {
        let mut connections = self.connections.lock().await;
        let entry = connections.get_mut(id)?;
        match std::mem::replace(&mut entry.state, ProtocolState::Connected) {
            ProtocolState::InRoom(code) => Some(code),
            ProtocolState::Connected => None,
            ProtocolState::Closed => {
                entry.state = ProtocolState::Closed;
                None
            }
        }
    }

    /// Mark a connection `Closed` after a failed delivery and ask its transport to
    /// shut down. The entry stays until [`ConnectionManager::close`].
    pub async fn evict(&self, id: &ConnectionId) -> Option<SessionCode> {
        let mut connections = self.connections.lock().await;
        let entry = connections.get_mut(id)?;
        let previous = std::mem::replace(&mut entry.state, ProtocolState::Closed);
        entry.link.request_shutdown();
        tracing::warn!("Connection '{}' evicted", id);
        match previous {
            ProtocolState::InRoom(code) => Some(code),
            _ => None,
        }
    }

    /// Forget a connection, yielding the room it was still in.
    pub async fn close(&self, id: &ConnectionId) -> Option<SessionCode> {
        let entry = self.connections.lock().await.remove(id)?;
        let elapsed = self.clock.now_millis() - entry.connected_at.value();
        tracing::info!("Connection '{}' closed after {}ms", id, elapsed);
        match entry.state {
            ProtocolState::InRoom(code) => Some(code),
            _ => None,
        }
    }

    /// Number of tracked connections.
    pub async fn count(&self) -> usize {
        self.connections.lock().await.len()
    }
}
