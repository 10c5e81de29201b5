//! Handlers for the `/push` resource: subscription lifecycle.
//!
//! Browsers register a real Web Push endpoint; native devices register a
//! platform token, which is stored behind a synthesized pseudo-endpoint so
//! one unique-endpoint table covers both. The dispatcher recognizes the
//! pseudo-endpoint scheme and skips HTTP delivery for those rows.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use fieldline_core::error::CoreError;
use fieldline_core::types::DbId;
use fieldline_db::repositories::PushSubscriptionRepo;
use fieldline_events::NATIVE_SCHEME_PREFIX;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for `POST /push/subscribe`: a standard Web Push
/// subscription as produced by `PushManager.subscribe()`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub crew_member_id: DbId,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// Request body for `POST /push/unsubscribe`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

/// Request body for `POST /push/devices`: a native device token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    pub crew_member_id: DbId,
    /// `ios` or `android`.
    pub platform: String,
    pub device_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub id: DbId,
}

/// POST /api/v1/push/subscribe
///
/// Create or replace a Web Push subscription keyed by endpoint.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> AppResult<Json<SubscribeResponse>> {
    if req.endpoint.is_empty() {
        return Err(AppError::BadRequest("endpoint must not be empty".to_string()));
    }

    let id = PushSubscriptionRepo::upsert(
        &state.pool,
        req.crew_member_id,
        &req.endpoint,
        &req.p256dh,
        &req.auth,
    )
    .await?;

    tracing::info!(
        subscription_id = id,
        crew_member_id = req.crew_member_id,
        "Push subscription registered"
    );
    Ok(Json(SubscribeResponse { id }))
}

/// POST /api/v1/push/unsubscribe
///
/// Remove a subscription by endpoint. 404 when no such endpoint is on file.
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(req): Json<UnsubscribeRequest>,
) -> AppResult<impl IntoResponse> {
    let removed = PushSubscriptionRepo::delete_by_endpoint(&state.pool, &req.endpoint).await?;

    if !removed {
        return Err(AppError::Core(CoreError::Validation(
            "no subscription on file for that endpoint".to_string(),
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/push/devices
///
/// Register a native device token behind a pseudo-endpoint. The key fields
/// are stored empty; native delivery goes through the platform service, not
/// Web Push encryption.
pub async fn register_device(
    State(state): State<AppState>,
    Json(req): Json<DeviceRequest>,
) -> AppResult<Json<SubscribeResponse>> {
    if !matches!(req.platform.as_str(), "ios" | "android") {
        return Err(AppError::BadRequest(format!(
            "unknown platform: {}",
            req.platform
        )));
    }
    if req.device_token.is_empty() {
        return Err(AppError::BadRequest("device token must not be empty".to_string()));
    }

    let endpoint = format!("{NATIVE_SCHEME_PREFIX}{}/{}", req.platform, req.device_token);
    let id =
        PushSubscriptionRepo::upsert(&state.pool, req.crew_member_id, &endpoint, "", "").await?;

    tracing::info!(
        subscription_id = id,
        crew_member_id = req.crew_member_id,
        platform = %req.platform,
        "Native device registered"
    );
    Ok(Json(SubscribeResponse { id }))
}
