//! Auth resolution tests for the chat WebSocket endpoint.
//!
//! A structurally valid connect token is not enough: the claimed crew
//! member must exist and be active at handshake time. These run against a
//! real database so identity resolution goes through the same queries as
//! production.

use std::sync::Arc;

use axum::extract::ws::Message;
use sqlx::PgPool;
use tokio::sync::mpsc::UnboundedReceiver;

use fieldline_api::config::ServerConfig;
use fieldline_api::state::AppState;
use fieldline_api::ws::chat::handle_auth;
use fieldline_api::ws::{ChatRegistry, NotifyRegistry};
use fieldline_core::token::{self, Audience, TokenSecret};
use fieldline_events::{AssignmentNotifier, PushDispatcher};

fn test_state(pool: PgPool) -> AppState {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        heartbeat_interval_secs: 30,
        token_secret: TokenSecret::new("integration-test-secret"),
    };
    let push = Arc::new(PushDispatcher::new(pool.clone(), None));

    AppState {
        pool: pool.clone(),
        config: Arc::new(config),
        chat: Arc::new(ChatRegistry::new()),
        notify: Arc::new(NotifyRegistry::new()),
        push: Arc::clone(&push),
        assignments: Arc::new(AssignmentNotifier::new(pool, push)),
    }
}

async fn seed_crew_member(pool: &PgPool, is_active: bool) -> (i64, i64) {
    let org: i64 = sqlx::query_scalar(
        "INSERT INTO organizations (name) VALUES ('Acme Field Services') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();
    let crew: i64 = sqlx::query_scalar(
        "INSERT INTO crew_members (organization_id, name, is_active) \
         VALUES ($1, 'Jordan', $2) RETURNING id",
    )
    .bind(org)
    .bind(is_active)
    .fetch_one(pool)
    .await
    .unwrap();
    (org, crew)
}

fn recv_json(rx: &mut UnboundedReceiver<Message>) -> serde_json::Value {
    match rx.try_recv().expect("expected a queued message") {
        Message::Text(text) => serde_json::from_str(&text).expect("frame should be valid JSON"),
        other => panic!("Expected Text frame, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: an active crew member with a valid token is authorized
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn active_crew_member_is_authorized(pool: PgPool) {
    let state = test_state(pool.clone());
    let (org, crew) = seed_crew_member(&pool, true).await;
    let mut rx = state.chat.add("conn-1".to_string()).await;

    let token = token::issue(&state.config.token_secret, crew, org, Audience::Chat)
        .expect("secret is configured");

    assert!(handle_auth(&state, "conn-1", &token).await);
    assert!(state.chat.is_authorized("conn-1").await);

    let frame = recv_json(&mut rx);
    assert_eq!(frame["type"], "auth_success");
    assert_eq!(frame["payload"]["subjectId"], crew);
}

// ---------------------------------------------------------------------------
// Test: an inactive crew member is rejected despite a valid token
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn inactive_crew_member_is_rejected(pool: PgPool) {
    let state = test_state(pool.clone());
    let (org, crew) = seed_crew_member(&pool, false).await;
    let mut rx = state.chat.add("conn-1".to_string()).await;

    let token = token::issue(&state.config.token_secret, crew, org, Audience::Chat)
        .expect("secret is configured");

    // The token verifies, but identity resolution must still fail closed.
    assert!(!handle_auth(&state, "conn-1", &token).await);
    assert!(!state.chat.is_authorized("conn-1").await);

    let frame = recv_json(&mut rx);
    assert_eq!(frame["type"], "auth_error");
}

// ---------------------------------------------------------------------------
// Test: a token for a crew member that does not exist is rejected
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_crew_member_is_rejected(pool: PgPool) {
    let state = test_state(pool.clone());
    let mut rx = state.chat.add("conn-1".to_string()).await;

    let token = token::issue(&state.config.token_secret, 424242, 1, Audience::Chat)
        .expect("secret is configured");

    assert!(!handle_auth(&state, "conn-1", &token).await);
    assert!(!state.chat.is_authorized("conn-1").await);

    let frame = recv_json(&mut rx);
    assert_eq!(frame["type"], "auth_error");
}
