//! Appointment entity model.

use chrono::{NaiveDate, NaiveTime};
use fieldline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `appointments` table.
///
/// `scheduled_date` is a tenant-local calendar date; combining it with
/// `start_time` and the organization's timezone yields the absolute
/// instant. Appointments without a start time never trigger reminders.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Appointment {
    pub id: DbId,
    pub organization_id: DbId,
    pub title: String,
    pub scheduled_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub created_at: Timestamp,
}
