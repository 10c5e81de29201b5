//! Handlers for the `/appointments` resource: assignment changes.
//!
//! Assigning crew to an appointment triggers both delivery channels:
//! each newly assigned crew member gets a persisted notification and a
//! push, and the tenant's operators get a system alert over the
//! notification WebSocket.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use fieldline_core::error::CoreError;
use fieldline_core::types::DbId;
use fieldline_db::repositories::AppointmentRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ws::SystemNotification;

/// Request body for `POST /appointments/{id}/assignments`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub crew_member_ids: Vec<DbId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    /// Crew members that were not already assigned.
    pub newly_assigned: Vec<DbId>,
}

/// POST /api/v1/appointments/{id}/assignments
///
/// Assign crew members to an appointment and notify everyone affected.
pub async fn assign_crew(
    State(state): State<AppState>,
    Path(appointment_id): Path<DbId>,
    Json(req): Json<AssignRequest>,
) -> AppResult<Json<AssignResponse>> {
    if req.crew_member_ids.is_empty() {
        return Err(AppError::BadRequest(
            "crewMemberIds must not be empty".to_string(),
        ));
    }

    let appointment = AppointmentRepo::get_by_id(&state.pool, appointment_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Appointment",
            id: appointment_id,
        }))?;

    let newly_assigned =
        AppointmentRepo::assign(&state.pool, appointment_id, &req.crew_member_ids).await?;

    if !newly_assigned.is_empty() {
        state
            .assignments
            .appointment_assigned(&appointment, &newly_assigned)
            .await;

        state
            .notify
            .broadcast(&SystemNotification {
                organization_id: Some(appointment.organization_id),
                title: "Appointment assignments updated".to_string(),
                body: format!(
                    "{} crew assigned to {}",
                    newly_assigned.len(),
                    appointment.title
                ),
                data: json!({ "appointmentId": appointment.id }),
            })
            .await;
    }

    Ok(Json(AssignResponse { newly_assigned }))
}
