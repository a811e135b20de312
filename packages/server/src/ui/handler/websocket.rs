//! WebSocket connection handler.
//!
//! One reader loop per connection drives the [`EventDispatcher`]; a spawned writer task
//! drains the connection's outbound queue and sends heartbeat pings.
//!
//! [`EventDispatcher`]: crate::usecase::EventDispatcher

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use pairpad_shared::time::timestamp_to_rfc3339;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    domain::{ConnectionId, PeerLink},
    infrastructure::dto::conversion::decode_client_event,
    ui::state::AppState,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that forwards queued frames to the WebSocket and pings every
/// `heartbeat` interval.
fn pusher_loop(
    mut rx: mpsc::Receiver<Arc<str>>,
    mut sender: SplitSink<WebSocket, Message>,
    heartbeat: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.as_ref().into())).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.close().await;
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let settings = state.connection_settings.clone();
    let handle = ConnectionId::generate();
    let (link, rx) = PeerLink::channel(handle.clone(), settings.outbound_capacity);
    let shutdown = link.shutdown_signal();

    let (sender, mut receiver) = socket.split();
    let mut send_task = pusher_loop(rx, sender, settings.heartbeat_interval);
    let connected_at = state.dispatcher.connect(link).await;
    tracing::info!(
        "WebSocket '{}' accepted at {}",
        handle,
        timestamp_to_rfc3339(connected_at.value())
    );

    loop {
        tokio::select! {
            frame = tokio::time::timeout(settings.idle_timeout, receiver.next()) => {
                let msg = match frame {
                    Err(_) => {
                        tracing::info!("'{}' idle for {:?}, closing", handle, settings.idle_timeout);
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        tracing::warn!("WebSocket error on '{}': {}", handle, e);
                        break;
                    }
                    Ok(Some(Ok(msg))) => msg,
                };
                match msg {
                    Message::Text(text) => match decode_client_event(text.as_str()) {
                        Ok(event) => state.dispatcher.dispatch(&handle, event).await,
                        Err(e) => state.dispatcher.reject(&handle, e).await,
                    },
                    Message::Binary(_) => {
                        state
                            .dispatcher
                            .reject(&handle, "Binary frames are not supported")
                            .await;
                    }
                    Message::Close(_) => {
                        tracing::info!("'{}' requested close", handle);
                        break;
                    }
                    // Ping/pong is handled by the protocol; receiving it counts as activity.
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            _ = shutdown.notified() => {
                tracing::info!("Closing '{}' from the server side", handle);
                break;
            }
            _ = &mut send_task => {
                tracing::debug!("Writer for '{}' stopped", handle);
                break;
            }
        }
    }

    send_task.abort();
    state.dispatcher.disconnect(&handle).await;
}
