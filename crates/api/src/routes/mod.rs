pub mod health;

use axum::routing::{any, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws/chat                        crew chat WebSocket
/// /ws/notifications               tenant notification WebSocket
///
/// /realtime/chat-token            mint chat connect token
/// /realtime/notify-token          mint notification connect token
///
/// /chat/messages                  create channel message (persist + broadcast)
/// /chat/direct-messages           create direct message (persist + deliver)
///
/// /appointments/{id}/assignments  assign crew + notify both channels
///
/// /push/subscribe                 register Web Push subscription
/// /push/unsubscribe               remove subscription by endpoint
/// /push/devices                   register native device token
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoints
        .route("/ws/chat", any(ws::chat_ws_handler))
        .route("/ws/notifications", any(ws::notify_ws_handler))
        // Connect-token minting
        .route("/realtime/chat-token", post(handlers::realtime::mint_chat_token))
        .route(
            "/realtime/notify-token",
            post(handlers::realtime::mint_notify_token),
        )
        // Chat message creation
        .route("/chat/messages", post(handlers::chat::create_message))
        .route(
            "/chat/direct-messages",
            post(handlers::chat::create_direct_message),
        )
        // Appointment assignment notifications
        .route(
            "/appointments/{id}/assignments",
            post(handlers::appointments::assign_crew),
        )
        // Push subscription lifecycle
        .route("/push/subscribe", post(handlers::push::subscribe))
        .route("/push/unsubscribe", post(handlers::push::unsubscribe))
        .route("/push/devices", post(handlers::push::register_device))
}
