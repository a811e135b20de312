//! UseCase: セッション取得
//!
//! HTTP の `GET /api/session/{code}` から呼ばれ、Registry のライブ状態を返します。

use std::sync::Arc;

use crate::{
    domain::{Session, SessionCode},
    infrastructure::registry::SessionRegistry,
};

use super::error::GetSessionError;

/// セッション取得のユースケース
pub struct GetSessionUseCase {
    registry: Arc<SessionRegistry>,
}

impl GetSessionUseCase {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// コードでセッションを取得する。形式が不正なコードは存在しないものとして扱う。
    pub async fn execute(&self, code: String) -> Result<Session, GetSessionError> {
        let code = SessionCode::new(code.clone()).map_err(|_| GetSessionError::NotFound(code))?;
        Ok(self.registry.hydrate(&code).await?)
    }
}
