//! Repository for the `notifications` table.

use sqlx::PgPool;

use fieldline_core::types::DbId;

use crate::models::notification::NewNotification;

/// Creates per-recipient notification records.
///
/// Reading and read-state management belong to the resource API surface;
/// the delivery core only appends.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Create a notification, returning the generated ID.
    pub async fn create(pool: &PgPool, new: &NewNotification) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notifications (organization_id, crew_member_id, title, body, data) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(new.organization_id)
        .bind(new.crew_member_id)
        .bind(&new.title)
        .bind(&new.body)
        .bind(&new.data)
        .fetch_one(pool)
        .await
    }
}
