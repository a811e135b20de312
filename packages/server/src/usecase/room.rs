//! ルーム内の配信と後始末の共通処理
//!
//! ここにある関数はすべて、呼び出し元が [`RoomLease`] を保持している
//! （＝ルームのクリティカルセクション内にいる）ことを前提とします。

use std::collections::VecDeque;

use crate::{
    domain::{ConnectionId, MessagePusher, PeerLink, ServerEvent, SessionCode},
    infrastructure::{
        connection::{ConnectionManager, ProtocolState},
        registry::{RoomLease, SessionRegistry},
    },
    usecase::error::RoomEventError,
};

/// Broadcast `event` to the room and tear down every member whose delivery failed.
pub(crate) async fn fan_out(
    lease: &mut RoomLease,
    message_pusher: &dyn MessagePusher,
    connections: &ConnectionManager,
    event: &ServerEvent,
    exclude: Option<&ConnectionId>,
) {
    let failed = message_pusher
        .broadcast(lease.code(), event, exclude)
        .await;
    evict_members(lease, message_pusher, connections, failed).await;
}

/// Deliver `event` to one member; a failed delivery evicts it like a failed broadcast.
pub(crate) async fn unicast_member(
    lease: &mut RoomLease,
    message_pusher: &dyn MessagePusher,
    connections: &ConnectionManager,
    link: &PeerLink,
    event: &ServerEvent,
) {
    if let Err(e) = message_pusher.push_to(link, event).await {
        tracing::warn!("Failed to deliver to '{}': {}", link.id(), e);
        message_pusher.leave(lease.code(), link.id()).await;
        evict_members(lease, message_pusher, connections, vec![link.id().clone()]).await;
    }
}

/// Run the disconnect path for handles whose channel failed.
///
/// Each eviction is announced to the remaining members with `user_left`; failures
/// during that announcement are evicted in turn.
pub(crate) async fn evict_members(
    lease: &mut RoomLease,
    message_pusher: &dyn MessagePusher,
    connections: &ConnectionManager,
    failed: Vec<ConnectionId>,
) {
    let mut pending = VecDeque::from(failed);
    while let Some(handle) = pending.pop_front() {
        connections.evict(&handle).await;
        if !lease.has_member(&handle) {
            continue;
        }
        let user_count = lease.remove_member(&handle);
        tracing::warn!(
            "Dropped '{}' from session '{}' after failed delivery ({} remaining)",
            handle,
            lease.code(),
            user_count
        );
        let left = ServerEvent::UserLeft {
            user_id: handle,
            user_count,
        };
        pending.extend(message_pusher.broadcast(lease.code(), &left, None).await);
    }
}

/// Remove `handle` from `code` and announce it to the remaining members.
///
/// Returns the remaining member count, or `None` when the handle was not a member.
pub(crate) async fn leave_room(
    registry: &SessionRegistry,
    message_pusher: &dyn MessagePusher,
    connections: &ConnectionManager,
    code: &SessionCode,
    handle: &ConnectionId,
) -> Option<usize> {
    let mut lease = match registry.enter(code).await {
        Ok(lease) => lease,
        Err(e) => {
            tracing::error!("Cannot leave session '{}': {}", code, e);
            message_pusher.leave(code, handle).await;
            return None;
        }
    };
    message_pusher.leave(code, handle).await;
    if !lease.has_member(handle) {
        return None;
    }
    let user_count = lease.remove_member(handle);
    tracing::info!(
        "'{}' left session '{}' ({} remaining)",
        handle,
        code,
        user_count
    );
    let left = ServerEvent::UserLeft {
        user_id: handle.clone(),
        user_count,
    };
    fan_out(&mut lease, message_pusher, connections, &left, None).await;
    Some(user_count)
}

/// Enter the critical section of the room a room-scoped event targets.
///
/// The connection must be in that room, and its membership is re-checked once the
/// room lock is held.
pub(crate) async fn enter_joined_room(
    registry: &SessionRegistry,
    connections: &ConnectionManager,
    handle: &ConnectionId,
    code: &SessionCode,
) -> Result<RoomLease, RoomEventError> {
    match connections.state(handle).await {
        ProtocolState::InRoom(current) if &current == code => {}
        ProtocolState::Closed => return Err(RoomEventError::NotMember),
        _ => {
            // Distinguish an unknown session from one this connection never joined.
            registry.hydrate(code).await?;
            return Err(RoomEventError::NotInSession(code.as_str().to_string()));
        }
    }
    let lease = registry.enter(code).await?;
    if !lease.has_member(handle) {
        return Err(RoomEventError::NotMember);
    }
    Ok(lease)
}
