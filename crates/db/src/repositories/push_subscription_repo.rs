//! Repository for the `push_subscriptions` table.
//!
//! The endpoint column is unique and upsert-by-endpoint is the only write
//! path: re-subscribing an endpoint already on file replaces the existing
//! record (new recipient, new keys) instead of duplicating it.

use sqlx::PgPool;

use fieldline_core::types::DbId;

use crate::models::push_subscription::PushSubscription;

/// Column list for `push_subscriptions` queries.
const COLUMNS: &str = "id, crew_member_id, endpoint, p256dh, auth_key, created_at, updated_at";

/// Subscription lifecycle operations for the push dispatcher.
pub struct PushSubscriptionRepo;

impl PushSubscriptionRepo {
    /// Create or replace the subscription for `endpoint`, returning its ID.
    pub async fn upsert(
        pool: &PgPool,
        crew_member_id: DbId,
        endpoint: &str,
        p256dh: &str,
        auth_key: &str,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO push_subscriptions (crew_member_id, endpoint, p256dh, auth_key) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (endpoint) DO UPDATE \
             SET crew_member_id = EXCLUDED.crew_member_id, \
                 p256dh = EXCLUDED.p256dh, \
                 auth_key = EXCLUDED.auth_key, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(crew_member_id)
        .bind(endpoint)
        .bind(p256dh)
        .bind(auth_key)
        .fetch_one(pool)
        .await
    }

    /// Delete by endpoint (client-initiated unsubscribe).
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete_by_endpoint(pool: &PgPool, endpoint: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
            .bind(endpoint)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete by ID (dispatcher-initiated prune when the push service
    /// reports the endpoint gone).
    pub async fn delete_by_id(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// All subscriptions for one recipient.
    pub async fn list_for_recipient(
        pool: &PgPool,
        crew_member_id: DbId,
    ) -> Result<Vec<PushSubscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM push_subscriptions WHERE crew_member_id = $1");
        sqlx::query_as::<_, PushSubscription>(&query)
            .bind(crew_member_id)
            .fetch_all(pool)
            .await
    }

    /// Every subscription on file (tenant-wide broadcast fan-out).
    pub async fn list_all(pool: &PgPool) -> Result<Vec<PushSubscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM push_subscriptions");
        sqlx::query_as::<_, PushSubscription>(&query)
            .fetch_all(pool)
            .await
    }
}
