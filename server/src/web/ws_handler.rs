use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::engine::chat_engine::ChatEngine;
use crate::engine::events::{ClientEvent, SessionId};

use super::app_state::AppState;

/// GET /ws: upgrade to a WebSocket carrying `{"event", "data"}` JSON frames.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, engine))
}

/// Drive one WebSocket connection from upgrade to close.
async fn handle_socket(socket: WebSocket, engine: Arc<ChatEngine>) {
    let (session_id, mut rx) = engine.connect();
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: drain the engine's outbound queue into the socket
    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(%session_id, error = %e, "failed to encode event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader task: decode client frames and hand them to the engine
    let reader_engine = engine.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => dispatch_frame(&reader_engine, session_id, text.as_str()),
                Message::Close(_) => break,
                Message::Binary(_) => debug!(%session_id, "ignoring binary frame"),
                Message::Ping(_) | Message::Pong(_) => {} // axum answers pings
            }
        }
    });

    // Wait for the aborted task to finish so no frame it was dispatching can
    // reach the engine after the disconnect below.
    tokio::select! {
        _ = &mut writer => {
            reader.abort();
            let _ = reader.await;
        }
        _ = &mut reader => {
            writer.abort();
            let _ = writer.await;
        }
    }

    engine.disconnect(session_id);
    info!(%session_id, "websocket closed");
}

/// Decode one text frame and apply it. Malformed frames and rejected events
/// are dropped; the connection stays open.
pub fn dispatch_frame(engine: &ChatEngine, session_id: SessionId, raw: &str) {
    let event: ClientEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            debug!(%session_id, error = %e, "dropping malformed frame");
            return;
        }
    };

    let name = event.name();
    if let Err(e) = engine.handle_event(session_id, event) {
        debug!(%session_id, event = name, error = %e, "event dropped");
    }
}
