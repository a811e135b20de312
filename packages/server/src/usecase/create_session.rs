//! UseCase: セッション作成
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - CreateSessionUseCase::execute() メソッド
//!
//! ### どのような状況を想定しているか
//! - 正常系：初期値（ドキュメント・言語）を持つセッションが保存される
//! - 異常系：コードの衝突が続いた場合に CodeCollision が返る

use std::sync::Arc;

use crate::{domain::Session, infrastructure::registry::SessionRegistry};

use super::error::CreateSessionError;

/// セッション作成のユースケース
pub struct CreateSessionUseCase {
    registry: Arc<SessionRegistry>,
}

impl CreateSessionUseCase {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// 新しいセッションを作成し、保存が完了してから返す
    pub async fn execute(&self) -> Result<Session, CreateSessionError> {
        self.registry.create(None).await.map_err(|e| {
            tracing::error!("Failed to create session: {}", e);
            CreateSessionError::from(e)
        })
    }
}
