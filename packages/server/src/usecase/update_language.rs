//! UseCase: 言語の変更

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, LanguageTag, MessagePusher, ServerEvent, SessionCode},
    infrastructure::{connection::ConnectionManager, registry::SessionRegistry},
};

use super::{
    error::RoomEventError,
    room::{enter_joined_room, fan_out},
};

/// 言語変更のユースケース
pub struct UpdateLanguageUseCase {
    registry: Arc<SessionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    connections: Arc<ConnectionManager>,
}

impl UpdateLanguageUseCase {
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

    pub async fn execute(
        &self,
        handle: &ConnectionId,
        code: &SessionCode,
        language: LanguageTag,
    ) -> Result<(), RoomEventError> {
        let mut lease = enter_joined_room(&self.registry, &self.connections, handle, code).await?;
        lease.set_language(language.clone());
        tracing::debug!("'{}' switched session '{}' to {}", handle, code, language.as_str());
        fan_out(
            &mut lease,
            self.message_pusher.as_ref(),
            &self.connections,
            &ServerEvent::LanguageUpdated { language },
            Some(handle),
        )
        .await;
        Ok(())
    }
}
