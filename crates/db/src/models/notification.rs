//! Notification entity model and DTO.

use fieldline_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `notifications` table: a persisted, per-recipient record.
///
/// Distinct from the transient system notifications broadcast to tenant
/// operators over the WebSocket endpoint, which are never stored.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub organization_id: DbId,
    pub crew_member_id: DbId,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for creating a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub organization_id: DbId,
    pub crew_member_id: DbId,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}
