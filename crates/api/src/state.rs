use std::sync::Arc;

use crate::config::ServerConfig;
use crate::ws::{ChatRegistry, NotifyRegistry};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: fieldline_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Chat / direct-message connection registry.
    pub chat: Arc<ChatRegistry>,
    /// Tenant notification connection registry.
    pub notify: Arc<NotifyRegistry>,
    /// Out-of-band push dispatcher.
    pub push: Arc<fieldline_events::PushDispatcher>,
    /// Assignment-change notifier (persist + push per new assignee).
    pub assignments: Arc<fieldline_events::AssignmentNotifier>,
}
