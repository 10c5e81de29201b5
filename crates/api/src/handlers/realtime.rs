//! Handlers for the `/realtime` resource: connect-token minting.
//!
//! Tokens are short-lived, audience-bound credentials the WebSocket
//! endpoints accept in their `auth` frame. When no signing secret is
//! configured the service degrades: minting returns 503 and the WebSocket
//! endpoints reject every auth attempt.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use fieldline_core::error::CoreError;
use fieldline_core::roles;
use fieldline_core::token::{self, Audience, TOKEN_TTL_SECS};
use fieldline_core::types::DbId;
use fieldline_db::repositories::{CrewMemberRepo, OperatorRepo};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for token minting.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// The crew member (chat) or operator (notify) to mint for.
    pub subject_id: DbId,
}

/// Response body for token minting.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
}

fn unavailable() -> AppError {
    AppError::Core(CoreError::Unavailable(
        "realtime token secret is not configured".to_string(),
    ))
}

/// POST /api/v1/realtime/chat-token
///
/// Mint a chat connect token for an active crew member. Returns 503 when
/// the signing secret is not configured.
pub async fn mint_chat_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let member = CrewMemberRepo::get_by_id(&state.pool, req.subject_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "CrewMember",
            id: req.subject_id,
        }))?;

    let token = token::issue(
        &state.config.token_secret,
        member.id,
        member.organization_id,
        Audience::Chat,
    )
    .ok_or_else(unavailable)?;

    Ok(Json(TokenResponse {
        token,
        expires_in: TOKEN_TTL_SECS,
    }))
}

/// POST /api/v1/realtime/notify-token
///
/// Mint a notification connect token for an active operator with a
/// privileged role.
pub async fn mint_notify_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let operator = OperatorRepo::get_by_id(&state.pool, req.subject_id)
        .await?
        .filter(|o| o.is_active)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Operator",
            id: req.subject_id,
        }))?;

    if !roles::is_operator(&operator.role) {
        return Err(AppError::Core(CoreError::Forbidden(
            "notification access requires a privileged role".to_string(),
        )));
    }

    let token = token::issue(
        &state.config.token_secret,
        operator.id,
        operator.organization_id,
        Audience::Notify,
    )
    .ok_or_else(unavailable)?;

    Ok(Json(TokenResponse {
        token,
        expires_in: TOKEN_TTL_SECS,
    }))
}
