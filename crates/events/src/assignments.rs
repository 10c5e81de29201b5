//! Assignment-change notifications.
//!
//! When the resource layer creates or updates an appointment, it calls
//! [`AssignmentNotifier`] synchronously so newly assigned crew members find
//! out immediately: a notification row is persisted and a push is
//! dispatched for each of them. Broadcasting the matching system alert to
//! tenant operators happens over the notification WebSocket endpoint,
//! which the resource layer reaches through the API server's registry.

use std::sync::Arc;

use fieldline_core::types::DbId;
use fieldline_db::models::appointment::Appointment;
use fieldline_db::models::notification::NewNotification;
use fieldline_db::repositories::NotificationRepo;
use fieldline_db::DbPool;

use crate::delivery::push::PushDispatcher;

/// Notifies crew members of appointment assignment changes.
pub struct AssignmentNotifier {
    pool: DbPool,
    dispatcher: Arc<PushDispatcher>,
}

impl AssignmentNotifier {
    pub fn new(pool: DbPool, dispatcher: Arc<PushDispatcher>) -> Self {
        Self { pool, dispatcher }
    }

    /// Notify every newly assigned crew member. Best-effort: a failure for
    /// one recipient is logged and does not block the others.
    pub async fn appointment_assigned(&self, appointment: &Appointment, assigned: &[DbId]) {
        for &crew_member_id in assigned {
            if let Err(e) = self.notify_one(appointment, crew_member_id).await {
                tracing::error!(
                    appointment_id = appointment.id,
                    crew_member_id,
                    error = %e,
                    "Failed to send assignment notification"
                );
            }
        }
    }

    async fn notify_one(
        &self,
        appointment: &Appointment,
        crew_member_id: DbId,
    ) -> Result<(), sqlx::Error> {
        let title = "New appointment assignment".to_string();
        let body = format!(
            "You have been assigned to {} on {}",
            appointment.title, appointment.scheduled_date
        );
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
        Ok(())
    }
}
