//! Crew member entity model.

use fieldline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `crew_members` table.
///
/// Crew members are the chat and reminder recipients. An inactive crew
/// member cannot authenticate a chat connection even with a structurally
/// valid token.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CrewMember {
    pub id: DbId,
    pub organization_id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
}
