//! Shared application state.

use std::sync::Arc;

use crate::{
    config::ConnectionSettings,
    usecase::{CreateSessionUseCase, EventDispatcher, GetSessionUseCase},
};

/// Shared application state
pub struct AppState {
    /// CreateSessionUseCase（セッション作成のユースケース）
    pub create_session_usecase: Arc<CreateSessionUseCase>,
    /// GetSessionUseCase（セッション取得のユースケース）
    pub get_session_usecase: Arc<GetSessionUseCase>,
    /// EventDispatcher（WebSocket プロトコルの状態機械）
    pub dispatcher: Arc<EventDispatcher>,
    pub connection_settings: ConnectionSettings,
}
