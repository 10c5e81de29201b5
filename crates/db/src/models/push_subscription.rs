//! Push subscription entity model.

use fieldline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `push_subscriptions` table.
///
/// Keyed by a unique delivery `endpoint`; upsert-by-endpoint is the only
/// write path, so re-subscribing the same endpoint replaces the record
/// rather than duplicating it. Rows are deleted when the push service
/// reports the endpoint as gone.
///
/// Native mobile devices are stored with a synthesized pseudo-endpoint
/// carrying a scheme prefix (e.g. `expo-push://ios/<token>`) so the
/// dispatcher can recognize and skip them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushSubscription {
    pub id: DbId,
    pub crew_member_id: DbId,
    pub endpoint: String,
    pub p256dh: String,
    pub auth_key: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
