//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::api::auth::AuthenticatedUser;
use crate::app_state::AppState;

/// `GET /ws` — Upgrade an authenticated HTTP connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> impl IntoResponse {
    let hub = state.hub;
    let max_frame = hub.settings().max_frame_bytes;

    ws.max_message_size(max_frame)
        .max_frame_size(max_frame)
        .on_failed_upgrade(move |e| {
            tracing::warn!(user_id = %identity.user_id, error = %e, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            let _ = hub.serve(identity, sink, stream).await;
        })
}
