//! Repository for the `operators` table.

use sqlx::PgPool;

use fieldline_core::types::DbId;

use crate::models::operator::Operator;

/// Column list for `operators` queries.
const COLUMNS: &str = "id, organization_id, name, email, role, is_active, created_at";

/// Read access to operator identities.
pub struct OperatorRepo;

impl OperatorRepo {
    /// Fetch an operator by id. Returns `None` if the row does not exist.
    pub async fn get_by_id(pool: &PgPool, id: DbId) -> Result<Option<Operator>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM operators WHERE id = $1");
        sqlx::query_as::<_, Operator>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
