//! WebSocket endpoints streaming notifier envelopes.
//!
//! Each endpoint joins one notifier scope and forwards envelopes to the
//! client as JSON text frames. Dropping the connection drops the
//! subscription — scope membership is exactly the set of open sockets.

use crate::notifier::Scope;
use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace};

/// `GET /api/ws/counters/:counter_id`
pub async fn counter_updates(
    ws: WebSocketUpgrade,
    Path(counter_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| stream_scope(socket, state, Scope::Counter(counter_id)))
}

/// `GET /api/ws/doctors/:doctor_id`
pub async fn doctor_updates(
    ws: WebSocketUpgrade,
    Path(doctor_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| stream_scope(socket, state, Scope::Doctor(doctor_id)))
}

/// `GET /api/ws/technicians/:technician_id`
pub async fn technician_updates(
    ws: WebSocketUpgrade,
    Path(technician_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| stream_scope(socket, state, Scope::Technician(technician_id)))
}

/// `GET /api/ws/broadcast`
pub async fn broadcast_updates(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_scope(socket, state, Scope::Broadcast))
}

/// Forward a scope's envelopes until the client goes away.
async fn stream_scope(socket: WebSocket, state: AppState, scope: Scope) {
    let mut rx = state.notifier.subscribe(&scope);
    let (mut sender, mut receiver) = socket.split();
    debug!(scope = %scope, "WebSocket subscriber connected");

    loop {
        tokio::select! {
            envelope = rx.recv() => {
                match envelope {
                    Ok(envelope) => {
                        let Ok(text) = serde_json::to_string(&envelope) else {
                            continue;
                        };
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Slow client: drop the oldest events and move on.
                        trace!(scope = %scope, skipped, "WebSocket subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    // Answer pings, ignore client chatter.
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!(scope = %scope, "WebSocket subscriber disconnected");
}
