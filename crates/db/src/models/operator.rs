//! Operator (tenant back-office user) entity model.

use fieldline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `operators` table.
///
/// Only operators with a privileged role (see `fieldline_core::roles`) may
/// hold a connection to the tenant notification broadcast endpoint.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Operator {
    pub id: DbId,
    pub organization_id: DbId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}
