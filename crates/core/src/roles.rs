//! Well-known operator role name constants.
//!
//! These must match the role values stored in the `operators.role` column.
//! Only operator roles may hold a connection to the tenant notification
//! endpoint; crew members authenticate against the chat endpoint instead.

/// Organization owner. Full administrative access.
pub const ROLE_OWNER: &str = "owner";

/// Organization administrator.
pub const ROLE_ADMIN: &str = "admin";

/// Office dispatcher: schedules jobs and crews.
pub const ROLE_DISPATCHER: &str = "dispatcher";

/// Whether a role is privileged enough to receive tenant-wide system
/// notifications over the broadcast endpoint.
pub fn is_operator(role: &str) -> bool {
    matches!(role, ROLE_OWNER | ROLE_ADMIN | ROLE_DISPATCHER)
}
