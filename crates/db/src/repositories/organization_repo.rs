//! Repository for the `organizations` table.

use sqlx::PgPool;

use fieldline_core::types::DbId;

/// Read access to tenant configuration.
pub struct OrganizationRepo;

impl OrganizationRepo {
    /// Fetch a tenant's configured IANA timezone name.
    ///
    /// Returns `None` when the organization does not exist or has no
    /// timezone configured; callers fall back to the platform default.
    pub async fn get_timezone(pool: &PgPool, id: DbId) -> Result<Option<String>, sqlx::Error> {
        let tz: Option<Option<String>> =
            sqlx::query_scalar("SELECT timezone FROM organizations WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(tz.flatten())
    }
}
