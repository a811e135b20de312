//! MessagePusher trait 定義
//!
//! ルーム単位のメッセージ配信（Room Broadcaster）のインターフェースを定義します。
//! WebSocket 接続の受付は UI 層、配信先チャンネルの管理と送信は Infrastructure 層が担当します。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use super::{ConnectionId, MessagePushError, ServerEvent, SessionCode};

/// Outbound queue of one connection. Payloads are already-encoded frames.
pub type PusherChannel = mpsc::Sender<Arc<str>>;

/// Deliverable end of one live connection.
///
/// Sending never blocks: a full or closed queue is reported as a failure and the
/// connection is expected to be torn down.
#[derive(Debug, Clone)]
pub struct PeerLink {
    id: ConnectionId,
    sender: PusherChannel,
    shutdown: Arc<Notify>,
}

impl PeerLink {
    pub fn new(id: ConnectionId, sender: PusherChannel, shutdown: Arc<Notify>) -> Self {
        Self {
            id,
            sender,
            shutdown,
        }
    }

    /// Create a link together with the receiving half of its outbound queue.
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(id, sender, Arc::new(Notify::new())), receiver)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Signal fired when the connection must be closed from the server side.
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Ask the transport to close this connection.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Enqueue an encoded frame without waiting.
    pub fn deliver(&self, payload: Arc<str>) -> Result<(), MessagePushError> {
        self.sender.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                MessagePushError::Saturated(self.id.as_str().to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                MessagePushError::Closed(self.id.as_str().to_string())
            }
        })
    }
}

/// Room Broadcaster trait
///
/// Owns, per session, the set of open channels. Never reads or writes document content;
/// it only delivers the events it is handed.
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Register a channel as deliverable for `code`. Idempotent.
    async fn join(&self, code: &SessionCode, link: PeerLink);

    /// Deregister a handle from `code`. Idempotent.
    async fn leave(&self, code: &SessionCode, handle: &ConnectionId);

    /// Deliver an event to a single connection, which need not be in any room.
    async fn push_to(&self, link: &PeerLink, event: &ServerEvent) -> Result<(), MessagePushError>;

    /// Deliver an event to every channel of `code` except `exclude`.
    ///
    /// Returns the handles whose delivery failed. Failed handles are already removed
    /// from the room; the caller runs the disconnect path for them.
    async fn broadcast(
        &self,
        code: &SessionCode,
        event: &ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> Vec<ConnectionId>;

    /// Number of channels currently registered for `code`.
    async fn member_count(&self, code: &SessionCode) -> usize;
}
