//! WebSocket route for job notifications
//!
//! Clients connect once and receive every job completion notification as a
//! JSON text frame. The stream is one-way; inbound frames are ignored apart
//! from close handling.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use super::NotificationHub;
use crate::api::AppState;

pub fn notification_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// Upgrade handler for `GET /notifications/ws`.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: NotificationHub) {
    tracing::debug!("notification client connected");
    let mut rx = hub.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            notification = rx.recv() => {
                match notification {
                    Ok(notification) => {
                        let text = match serde_json::to_string(&notification) {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::error!("failed to serialize notification: {}", e);
                                continue;
                            }
                        };
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // A slow client missed some messages; keep the
                    // connection and pick up from the current position.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notification client lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Ignore pings, pongs and stray client frames.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("notification client disconnected");
}
