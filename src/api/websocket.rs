//! WebSocket observer channel.
//!
//! Every connection registers with the [`ChangeNotifier`] and receives
//! `{table, action: "refresh", message}` after committed changes. Anything
//! the client sends is ignored; the connection ends on close or error.
//!
//! [`ChangeNotifier`]: crate::pipeline::ChangeNotifier

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use crate::api::types::ApiContext;
use crate::pipeline::ChangeNotifier;

/// Keepalive ping interval.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// `GET /ws`
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(ctx): State<ApiContext>) -> impl IntoResponse {
    let notifier = ctx.notifier.clone();
    ws.on_upgrade(move |socket| handle_ws(socket, notifier))
}

async fn handle_ws(socket: WebSocket, notifier: ChangeNotifier) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (observer_id, mut events) = notifier.register();
    tracing::info!(observer = %observer_id, "WebSocket observer connected");

    // Sender task: notifier channel → socket, plus keepalive pings.
    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(_) => continue,
                    };
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sink.close().await;
    });

    // Drain client frames until the socket goes away.
    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    notifier.unregister(&observer_id);
    sender_handle.abort();
    tracing::info!(observer = %observer_id, "WebSocket observer disconnected");
}
