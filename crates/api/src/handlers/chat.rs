//! Handlers for the `/chat` resource: message creation.
//!
//! Creation happens over HTTP, never over the socket. The handler persists
//! the row, then fans it out to live connections, so socket delivery order
//! matches persistence order. Offline recipients additionally get a push
//! notification.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use fieldline_db::models::chat::{ChatMessage, DirectMessage, NewChatMessage, NewDirectMessage};

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ws::chat::{persist_and_broadcast_message, persist_and_send_direct_message};

/// POST /api/v1/chat/messages
///
/// Persist a channel message and broadcast it to current channel members.
pub async fn create_message(
    State(state): State<AppState>,
    Json(new): Json<NewChatMessage>,
) -> AppResult<Json<ChatMessage>> {
    if new.body.trim().is_empty() {
        return Err(AppError::BadRequest("message body must not be empty".to_string()));
    }

    let message = persist_and_broadcast_message(&state.pool, &state.chat, &new).await?;
    Ok(Json(message))
}

/// POST /api/v1/chat/direct-messages
///
/// Persist a direct message, deliver it to the recipient's live
/// connections, and push to their registered devices if none are live.
pub async fn create_direct_message(
    State(state): State<AppState>,
    Json(new): Json<NewDirectMessage>,
) -> AppResult<Json<DirectMessage>> {
    if new.body.trim().is_empty() {
        return Err(AppError::BadRequest("message body must not be empty".to_string()));
    }

    let dm = persist_and_send_direct_message(&state.pool, &state.chat, &new).await?;

    // Push is best-effort; a delivery failure never fails the write.
    state
        .push
        .send(
            dm.recipient_id,
            "New direct message",
            &dm.body,
            json!({ "directMessageId": dm.id, "senderId": dm.sender_id }),
        )
        .await;

    Ok(Json(dm))
}
