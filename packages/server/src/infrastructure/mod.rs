//! Infrastructure layer
//!
//! Domain 層で定義したインターフェースの実装と、プロセス内の共有状態を提供します。
//!
//! - `repository`: Session Store（in-memory / SQLite）
//! - `registry`: Session Registry（ライブ状態と永続化ワーカー）
//! - `message_pusher`: Room Broadcaster（WebSocket 配信）
//! - `connection`: Connection Lifecycle Manager
//! - `dto`: ワイヤーフォーマットと変換

pub mod connection;
pub mod dto;
pub mod message_pusher;
pub mod registry;
pub mod repository;
