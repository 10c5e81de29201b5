//! Tenant notification broadcast WebSocket server.
//!
//! Operators connect here to receive system notifications for their tenant.
//! Authorization is stricter than chat: the connect token must carry the
//! notify audience, the operator must exist, be active, hold a privileged
//! role, and the token's tenant claim must match the operator's actual
//! tenant. Broadcasts are tenant-scoped; a notification without a tenant is
//! dropped with a warning rather than leaked to every connection.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};

use fieldline_core::roles;
use fieldline_core::token::{self, Audience};
use fieldline_core::types::DbId;
use fieldline_db::repositories::OperatorRepo;

use crate::state::AppState;
use crate::ws::heartbeat::Liveness;
use crate::ws::protocol::{ClientFrame, ServerFrame, SystemNotification};

/// State for a single notification connection.
pub struct NotifyConnection {
    pub sender: mpsc::UnboundedSender<Message>,
    /// Authenticated operator, set once `auth` succeeds.
    pub operator_id: Option<DbId>,
    /// Tenant the connection receives broadcasts for.
    pub organization_id: Option<DbId>,
    /// Whether a pong arrived since the last heartbeat sweep.
    pub responded: bool,
}

impl NotifyConnection {
    fn is_authorized(&self) -> bool {
        self.operator_id.is_some()
    }
}

/// Registry of all active notification connections.
pub struct NotifyRegistry {
    connections: RwLock<HashMap<String, NotifyConnection>>,
}

impl NotifyRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new (unauthorized) connection.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = NotifyConnection {
            sender: tx,
            operator_id: None,
            organization_id: None,
            responded: true,
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Mark a connection authorized for a tenant.
    pub async fn authorize(&self, conn_id: &str, operator_id: DbId, organization_id: DbId) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get_mut(conn_id) {
            Some(conn) => {
                conn.operator_id = Some(operator_id);
                conn.organization_id = Some(organization_id);
                true
            }
            None => false,
        }
    }

    pub async fn is_authorized(&self, conn_id: &str) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(NotifyConnection::is_authorized)
    }

    /// Fan a notification out to every authorized connection of its tenant.
    ///
    /// A notification without a tenant is dropped; broadcasting it would
    /// either leak across tenants or reach nobody, and neither is useful.
    /// Returns the number of connections reached.
    pub async fn broadcast(&self, notification: &SystemNotification) -> usize {
        let Some(organization_id) = notification.organization_id else {
            tracing::warn!(
                title = %notification.title,
                "Dropping system notification without a tenant"
            );
            return 0;
        };

        let msg = ServerFrame::Notification(notification.clone()).to_message();
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.organization_id == Some(organization_id) {
                let _ = conn.sender.send(msg.clone());
                count += 1;
            }
        }
        count
    }

    /// Send a frame to one specific connection.
    pub async fn send_to_conn(&self, conn_id: &str, frame: &ServerFrame) -> bool {
        let conns = self.connections.read().await;
        match conns.get(conn_id) {
            Some(conn) => conn.sender.send(frame.to_message()).is_ok(),
            None => false,
        }
    }

    /// Record a pong for the liveness sweep.
    pub async fn mark_pong(&self, conn_id: &str) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.responded = true;
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all notification connections");
    }
}

impl Default for NotifyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Liveness for NotifyRegistry {
    async fn sweep_and_ping(&self) -> (usize, usize) {
        let mut conns = self.connections.write().await;

        let dead: Vec<String> = conns
            .iter()
            .filter(|(_, c)| !c.responded)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            if let Some(conn) = conns.remove(id) {
                let _ = conn.sender.send(Message::Close(None));
            }
        }

        let pinged = conns.len();
        for conn in conns.values_mut() {
            conn.responded = false;
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }

        (dead.len(), pinged)
    }
}

// ---------------------------------------------------------------------------
// Socket handler
// ---------------------------------------------------------------------------

/// HTTP handler that upgrades the connection to the notification WebSocket.
pub async fn notify_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Notification WebSocket connected");

    let mut rx = state.notify.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "Notification WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => state.notify.mark_pong(&conn_id).await,
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                // The notification endpoint is receive-only apart from auth;
                // chat-only frames arriving here are ignored.
                Ok(ClientFrame::Auth { token }) => {
                    if !handle_auth(&state, &conn_id, &token).await {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Dropping malformed notification frame");
                }
            },
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Notification WebSocket receive error");
                break;
            }
        }
    }

    state.notify.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Notification WebSocket disconnected");
}

/// Verify the connect token and check the operator against the database.
///
/// Returns `false` when the connection must be terminated.
async fn handle_auth(state: &AppState, conn_id: &str, raw_token: &str) -> bool {
    let Some(claims) = token::verify(&state.config.token_secret, raw_token, Audience::Notify) else {
        return reject_auth(state, conn_id, "invalid or expired token").await;
    };

    let operator = match OperatorRepo::get_by_id(&state.pool, claims.sub).await {
        Ok(Some(operator)) => operator,
        Ok(None) => return reject_auth(state, conn_id, "unknown operator").await,
        Err(e) => {
            tracing::error!(conn_id = %conn_id, error = %e, "Operator lookup failed during auth");
            return reject_auth(state, conn_id, "authorization failed").await;
        }
    };

    if !operator.is_active {
        return reject_auth(state, conn_id, "inactive operator").await;
    }
    if !roles::is_operator(&operator.role) {
        return reject_auth(state, conn_id, "insufficient role").await;
    }
    // The token's tenant claim must agree with the operator's actual tenant.
    if operator.organization_id != claims.org {
        return reject_auth(state, conn_id, "tenant mismatch").await;
    }

    state
        .notify
        .authorize(conn_id, operator.id, operator.organization_id)
        .await;
    state
        .notify
        .send_to_conn(
            conn_id,
            &ServerFrame::AuthSuccess {
                subject_id: operator.id,
            },
        )
        .await;

    tracing::info!(
        conn_id = %conn_id,
        operator_id = operator.id,
        organization_id = operator.organization_id,
        "Notification connection authorized"
    );
    true
}

async fn reject_auth(state: &AppState, conn_id: &str, reason: &str) -> bool {
    tracing::info!(conn_id = %conn_id, reason, "Notification auth rejected");
    state
        .notify
        .send_to_conn(
            conn_id,
            &ServerFrame::AuthError {
                error: reason.to_string(),
            },
        )
        .await;
    false
}
