//! Repository for the `crew_members` table.

use sqlx::PgPool;

use fieldline_core::types::DbId;

use crate::models::crew_member::CrewMember;

/// Column list for `crew_members` queries.
const COLUMNS: &str = "id, organization_id, name, email, is_active, created_at";

/// Read access to crew member identities.
pub struct CrewMemberRepo;

impl CrewMemberRepo {
    /// Fetch a crew member by id. Returns `None` if the row does not exist.
    pub async fn get_by_id(pool: &PgPool, id: DbId) -> Result<Option<CrewMember>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM crew_members WHERE id = $1");
        sqlx::query_as::<_, CrewMember>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
