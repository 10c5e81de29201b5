//! Repository for the `appointments` and `appointment_assignments` tables.

use chrono::NaiveDate;
use sqlx::PgPool;

use fieldline_core::types::DbId;

use crate::models::appointment::Appointment;

/// Column list for `appointments` queries.
const COLUMNS: &str = "id, organization_id, title, scheduled_date, start_time, created_at";

/// Appointment reads for the reminder scheduler, plus assignment writes
/// for the assignment-notification path.
pub struct AppointmentRepo;

impl AppointmentRepo {
    /// Fetch an appointment by id. Returns `None` if the row does not exist.
    pub async fn get_by_id(pool: &PgPool, id: DbId) -> Result<Option<Appointment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM appointments WHERE id = $1");
        sqlx::query_as::<_, Appointment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Assign crew members to an appointment.
    ///
    /// Already-assigned members are left untouched; only the IDs of newly
    /// created assignments are returned, so callers notify each crew member
    /// at most once.
    pub async fn assign(
        pool: &PgPool,
        appointment_id: DbId,
        crew_member_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO appointment_assignments (appointment_id, crew_member_id) \
             SELECT $1, unnest($2::bigint[]) \
             ON CONFLICT DO NOTHING \
             RETURNING crew_member_id",
        )
        .bind(appointment_id)
        .bind(crew_member_ids)
        .fetch_all(pool)
        .await
    }

    /// All appointments scheduled on any of the given calendar dates.
    pub async fn list_scheduled_on(
        pool: &PgPool,
        dates: &[NaiveDate],
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM appointments WHERE scheduled_date = ANY($1)");
        sqlx::query_as::<_, Appointment>(&query)
            .bind(dates)
            .fetch_all(pool)
            .await
    }

    /// IDs of the crew members assigned to an appointment.
    pub async fn assigned_crew_ids(
        pool: &PgPool,
        appointment_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT crew_member_id FROM appointment_assignments WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .fetch_all(pool)
        .await
    }
}
