//! Appointment reminder scheduler.
//!
//! [`ReminderScheduler`] runs as a background task on a fixed period (the
//! first tick fires immediately at startup), scanning the next two calendar
//! days of appointments, computing each appointment's absolute start
//! instant in its tenant's timezone, and firing exactly one reminder per
//! `(appointment, recipient, date)` tuple inside the lead window. Each
//! reminder is both persisted as a notification row and dispatched through
//! the push dispatcher.
//!
//! Any error during a run is caught and logged; it never terminates the
//! timer, and a failure for one recipient never prevents processing of the
//! remaining recipients or appointments in the same run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;

use fieldline_core::reminders::{
    appointment_instant, in_reminder_window, lookahead_dates, minutes_until, resolve_timezone,
    ReminderDedup, ReminderKey, DEFAULT_DEDUP_MAX, DEFAULT_TIMEZONE,
};
use fieldline_core::types::DbId;
use fieldline_db::models::appointment::Appointment;
use fieldline_db::models::notification::NewNotification;
use fieldline_db::repositories::{AppointmentRepo, NotificationRepo, OrganizationRepo};
use fieldline_db::DbPool;

use crate::delivery::push::PushDispatcher;

/// How often the scheduler polls for upcoming appointments.
const REMINDER_CHECK_INTERVAL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tunables for the reminder scheduler.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Poll period.
    pub interval: Duration,
    /// Dedup set bound; the set is cleared once it grows past this.
    pub dedup_max: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval: REMINDER_CHECK_INTERVAL,
            dedup_max: DEFAULT_DEDUP_MAX,
        }
    }
}

impl ReminderConfig {
    /// Load overrides from `REMINDER_INTERVAL_SECS` and
    /// `REMINDER_DEDUP_MAX`. Malformed values panic at startup.
    pub fn from_env() -> Self {
        let default = Self::default();

        let interval = std::env::var("REMINDER_INTERVAL_SECS")
            .map(|v| {
                Duration::from_secs(v.parse().expect("REMINDER_INTERVAL_SECS must be a valid u64"))
            })
            .unwrap_or(default.interval);

        let dedup_max = std::env::var("REMINDER_DEDUP_MAX")
            .map(|v| v.parse().expect("REMINDER_DEDUP_MAX must be a valid usize"))
            .unwrap_or(default.dedup_max);

        Self {
            interval,
            dedup_max,
        }
    }
}

// ---------------------------------------------------------------------------
// ReminderScheduler
// ---------------------------------------------------------------------------

/// Background service that fires appointment reminders.
pub struct ReminderScheduler {
    pool: DbPool,
    dispatcher: Arc<PushDispatcher>,
    dedup: ReminderDedup,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(pool: DbPool, dispatcher: Arc<PushDispatcher>, config: ReminderConfig) -> Self {
        Self {
            pool,
            dispatcher,
            dedup: ReminderDedup::new(config.dedup_max),
            interval: config.interval,
        }
    }

    /// Run the scheduler loop.
    ///
    /// Ticks immediately once, then every `interval`. The loop exits
    /// gracefully when the provided [`CancellationToken`] is cancelled.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reminder scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        tracing::error!(error = %e, "Reminder scan failed");
                    }
                }
            }
        }
    }

    /// One full scan at a given instant.
    async fn run_once(&mut self, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        // Two-day lookahead in the platform default timezone bounds the
        // query without needing per-tenant timezones up front.
        let dates = lookahead_dates(now, DEFAULT_TIMEZONE);
        let appointments = AppointmentRepo::list_scheduled_on(&self.pool, &dates).await?;

        let mut tz_cache: HashMap<DbId, Tz> = HashMap::new();

        for appointment in &appointments {
            if let Err(e) = self.process_appointment(appointment, now, &mut tz_cache).await {
                tracing::error!(
                    appointment_id = appointment.id,
                    error = %e,
                    "Failed to process appointment"
                );
            }
        }

        if self.dedup.shrink() {
            tracing::info!("Reminder dedup set exceeded its bound and was cleared");
        }

        Ok(())
    }

    /// Evaluate one appointment and fire reminders for eligible assignees.
    async fn process_appointment(
        &mut self,
        appointment: &Appointment,
        now: DateTime<Utc>,
        tz_cache: &mut HashMap<DbId, Tz>,
    ) -> Result<(), sqlx::Error> {
        let Some(start_time) = appointment.start_time else {
            return Ok(());
        };

        let assigned = AppointmentRepo::assigned_crew_ids(&self.pool, appointment.id).await?;
        if assigned.is_empty() {
            return Ok(());
        }

        let tz = match tz_cache.get(&appointment.organization_id) {
            Some(tz) => *tz,
            None => {
                let name =
                    OrganizationRepo::get_timezone(&self.pool, appointment.organization_id).await?;
                let tz = resolve_timezone(name.as_deref());
                tz_cache.insert(appointment.organization_id, tz);
                tz
            }
        };

        let Some(instant) = appointment_instant(appointment.scheduled_date, start_time, tz) else {
            tracing::warn!(
                appointment_id = appointment.id,
                "Appointment start does not exist in tenant timezone, skipping"
            );
            return Ok(());
        };

        let minutes = minutes_until(now, instant);
        if !in_reminder_window(minutes) {
            return Ok(());
        }

        for crew_member_id in assigned {
            let key = ReminderKey {
                appointment_id: appointment.id,
                recipient_id: crew_member_id,
                date: appointment.scheduled_date,
            };
            if !self.dedup.claim(key) {
                continue;
            }

            if let Err(e) = self.send_reminder(appointment, crew_member_id, minutes).await {
                tracing::error!(
                    appointment_id = appointment.id,
                    crew_member_id,
                    error = %e,
                    "Failed to send reminder"
                );
            }
        }

        Ok(())
    }

    /// Persist the notification row, then dispatch push.
    async fn send_reminder(
        &self,
        appointment: &Appointment,
        crew_member_id: DbId,
        minutes: i64,
    ) -> Result<(), sqlx::Error> {
        let title = "Upcoming appointment".to_string();
        let body = format!("{} starts in {} minutes", appointment.title, minutes);
        let data = serde_json::json!({
            "appointmentId": appointment.id,
            "scheduledDate": appointment.scheduled_date,
        });

        NotificationRepo::create(
            &self.pool,
            &NewNotification {
                organization_id: appointment.organization_id,
                crew_member_id,
                title: title.clone(),
                body: body.clone(),
                data: data.clone(),
            },
        )
        .await?;

        self.dispatcher.send(crew_member_id, &title, &body, data).await;

        tracing::info!(
            appointment_id = appointment.id,
            crew_member_id,
            minutes,
            "Appointment reminder sent"
        );

        Ok(())
    }
}
