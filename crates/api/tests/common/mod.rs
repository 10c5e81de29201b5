use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use fieldline_api::config::ServerConfig;
use fieldline_api::router::build_app_router;
use fieldline_api::state::AppState;
use fieldline_api::ws::{ChatRegistry, NotifyRegistry};
use fieldline_core::token::TokenSecret;
use fieldline_events::{AssignmentNotifier, PushDispatcher};

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a fixed token secret so realtime reports as enabled.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        heartbeat_interval_secs: 30,
        token_secret: TokenSecret::new("integration-test-secret"),
    }
}

/// A pool that never connects. Routes that don't touch the database work
/// normally; the health check reports the database as unhealthy.
pub fn lazy_pool() -> sqlx::PgPool {
    PgPoolOptions::new()
        // Fail fast: the default 30s acquire timeout would collide with the
        // 30s request-timeout middleware and surface as 408 instead of a
        // degraded health response.
        .acquire_timeout(std::time::Duration::from_secs(1))
        .connect_lazy("postgres://127.0.0.1:1/fieldline_test")
        .expect("lazy pool")
}

/// Build the full application router with all middleware layers.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app(pool: sqlx::PgPool) -> Router {
    let config = test_config();
    let push = Arc::new(PushDispatcher::new(pool.clone(), None));

    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        chat: Arc::new(ChatRegistry::new()),
        notify: Arc::new(NotifyRegistry::new()),
        push: Arc::clone(&push),
        assignments: Arc::new(AssignmentNotifier::new(pool, push)),
    };

    build_app_router(state, &config)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request should build"),
    )
    .await
    .expect("request should not fail")
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    serde_json::from_slice(&bytes).expect("body should be valid JSON")
}
