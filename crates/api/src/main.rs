use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldline_api::config::ServerConfig;
use fieldline_api::router::build_app_router;
use fieldline_api::state::AppState;
use fieldline_api::ws;
use fieldline_events::{AssignmentNotifier, PushDispatcher, ReminderConfig, ReminderScheduler, VapidConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldline_api=debug,fieldline_events=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    if !config.token_secret.is_configured() {
        tracing::warn!("REALTIME_TOKEN_SECRET not set; realtime endpoints will reject all connections");
    }

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = fieldline_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fieldline_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    fieldline_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Push dispatcher ---
    let vapid = VapidConfig::from_env();
    if vapid.is_none() {
        tracing::warn!("VAPID keys not set; push delivery disabled");
    }
    let push = Arc::new(PushDispatcher::new(pool.clone(), vapid));
    let assignments = Arc::new(AssignmentNotifier::new(pool.clone(), Arc::clone(&push)));

    // --- WebSocket registries ---
    let chat = Arc::new(ws::ChatRegistry::new());
    let notify = Arc::new(ws::NotifyRegistry::new());

    // --- Heartbeats ---
    let heartbeat_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let chat_heartbeat = ws::start_heartbeat(Arc::clone(&chat), heartbeat_interval);
    let notify_heartbeat = ws::start_heartbeat(Arc::clone(&notify), heartbeat_interval);

    // --- Reminder scheduler ---
    let reminder_cancel = tokio_util::sync::CancellationToken::new();
    let scheduler = ReminderScheduler::new(pool.clone(), Arc::clone(&push), ReminderConfig::from_env());
    let scheduler_cancel = reminder_cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_cancel).await;
    });
    tracing::info!("Reminder scheduler started");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        chat: Arc::clone(&chat),
        notify: Arc::clone(&notify),
        push: Arc::clone(&push),
        assignments,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    reminder_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler_handle).await;
    tracing::info!("Reminder scheduler stopped");

    chat.shutdown_all().await;
    notify.shutdown_all().await;

    chat_heartbeat.abort();
    notify_heartbeat.abort();
    tracing::info!("Heartbeat tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
