//! Repository for the `chat_messages` and `direct_messages` tables.
//!
//! The messaging core persists first and broadcasts second, so within one
//! channel, socket delivery order follows row creation order.

use sqlx::PgPool;

use crate::models::chat::{ChatMessage, DirectMessage, NewChatMessage, NewDirectMessage};

/// Column list for `chat_messages` queries.
const MESSAGE_COLUMNS: &str = "id, channel_id, sender_id, body, created_at";

/// Column list for `direct_messages` queries.
const DM_COLUMNS: &str = "id, sender_id, recipient_id, body, created_at";

/// Create/read access to persisted chat traffic.
pub struct ChatRepo;

impl ChatRepo {
    /// Persist a channel message, returning the full row for broadcast.
    pub async fn create_message(
        pool: &PgPool,
        new: &NewChatMessage,
    ) -> Result<ChatMessage, sqlx::Error> {
        let query = format!(
            "INSERT INTO chat_messages (channel_id, sender_id, body) \
             VALUES ($1, $2, $3) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(new.channel_id)
            .bind(new.sender_id)
            .bind(&new.body)
            .fetch_one(pool)
            .await
    }

    /// Persist a direct message, returning the full row for delivery.
    pub async fn create_direct_message(
        pool: &PgPool,
        new: &NewDirectMessage,
    ) -> Result<DirectMessage, sqlx::Error> {
        let query = format!(
            "INSERT INTO direct_messages (sender_id, recipient_id, body) \
             VALUES ($1, $2, $3) \
             RETURNING {DM_COLUMNS}"
        );
        sqlx::query_as::<_, DirectMessage>(&query)
            .bind(new.sender_id)
            .bind(new.recipient_id)
            .bind(&new.body)
            .fetch_one(pool)
            .await
    }
}
