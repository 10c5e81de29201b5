//! Chat entity models and DTOs.

use fieldline_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `chat_messages` table.
///
/// Broadcast to channel members verbatim as the `new_message` frame payload
/// after the row is persisted, so delivery order follows persistence order.
/// Serializes with camelCase keys to match the rest of the wire protocol.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: DbId,
    pub channel_id: DbId,
    pub sender_id: DbId,
    pub body: String,
    pub created_at: Timestamp,
}

/// A row from the `direct_messages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: DbId,
    pub sender_id: DbId,
    pub recipient_id: DbId,
    pub body: String,
    pub created_at: Timestamp,
}

/// DTO for creating a chat message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatMessage {
    pub channel_id: DbId,
    pub sender_id: DbId,
    pub body: String,
}

/// DTO for creating a direct message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDirectMessage {
    pub sender_id: DbId,
    pub recipient_id: DbId,
    pub body: String,
}
