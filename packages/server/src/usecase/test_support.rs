//! UseCase テスト用のヘルパー

use std::sync::Arc;

use pairpad_shared::time::FixedClock;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, PeerLink, RandomCodeGenerator, Session},
    infrastructure::{
        connection::ConnectionManager, message_pusher::WebSocketMessagePusher,
        registry::SessionRegistry, repository::InMemorySessionStore,
    },
};

/// 実装一式（in-memory store / WebSocket pusher / registry / connection manager）
pub(crate) struct TestHarness {
    pub store: Arc<InMemorySessionStore>,
    pub registry: Arc<SessionRegistry>,
    pub message_pusher: Arc<WebSocketMessagePusher>,
    pub connections: Arc<ConnectionManager>,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(InMemorySessionStore::new());
        let clock = Arc::new(FixedClock::new(1_700_000_000_000));
        let registry = Arc::new(SessionRegistry::new(
            store.clone(),
            Arc::new(RandomCodeGenerator),
            clock.clone(),
        ));
        Self {
            store,
            registry,
            message_pusher: Arc::new(WebSocketMessagePusher::default()),
            connections: Arc::new(ConnectionManager::new(clock)),
        }
    }

    pub async fn create_session(&self) -> Session {
        self.registry.create(None).await.unwrap()
    }

    /// 接続を開き、Connected 状態で登録する
    pub async fn open(&self, name: &str, capacity: usize) -> (ConnectionId, TestPeer) {
        let id = ConnectionId::from(name);
        let (link, rx) = PeerLink::channel(id.clone(), capacity);
        self.connections.open(link).await;
        (id, TestPeer { rx })
    }
}

/// 1 接続分の受信キュー
pub(crate) struct TestPeer {
    pub rx: mpsc::Receiver<Arc<str>>,
}

impl TestPeer {
    /// 現時点で届いているフレームをすべて取り出す
    pub fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    /// 指定したイベント名のフレームだけを取り出す
    pub fn drain_events(&mut self, event: &str) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter(|frame| frame["event"] == event)
            .collect()
    }
}
