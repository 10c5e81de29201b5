//! Crew chat and direct-message WebSocket server.
//!
//! Per-connection state machine: connected (unauthorized) → `auth` frame
//! with a valid connect token → authorized (+ channel memberships) →
//! terminated on close or liveness failure. Every channel operation is
//! rejected until token verification succeeds; frames arriving before auth
//! are silently ignored, since an unauthenticated peer has no identity to
//! blame.
//!
//! Message creation is triggered by the resource layer, not the socket
//! protocol: [`persist_and_broadcast_message`] persists first and fans out
//! second, so broadcast order within a channel follows persistence order.

use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};

use fieldline_core::token::{self, Audience};
use fieldline_core::types::DbId;
use fieldline_db::models::chat::{ChatMessage, DirectMessage, NewChatMessage, NewDirectMessage};
use fieldline_db::repositories::{ChatRepo, CrewMemberRepo};
use fieldline_db::DbPool;

use crate::state::AppState;
use crate::ws::heartbeat::Liveness;
use crate::ws::protocol::{ClientFrame, ServerFrame};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// State for a single chat connection.
pub struct ChatConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// Authenticated crew member, set once `auth` succeeds.
    pub crew_member_id: Option<DbId>,
    /// Tenant of the authenticated crew member.
    pub organization_id: Option<DbId>,
    /// Channels this connection has joined.
    pub channels: HashSet<DbId>,
    /// Whether a pong arrived since the last heartbeat sweep.
    pub responded: bool,
}

impl ChatConnection {
    fn is_authorized(&self) -> bool {
        self.crew_member_id.is_some()
    }
}

/// Registry of all active chat connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Channel membership lives inside each
/// connection entry, so removing a connection removes it from every set
/// that references it.
pub struct ChatRegistry {
    connections: RwLock<HashMap<String, ChatConnection>>,
}

impl ChatRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new (unauthorized) connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ChatConnection {
            sender: tx,
            crew_member_id: None,
            organization_id: None,
            channels: HashSet::new(),
            responded: true,
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Mark a connection authorized with its resolved identity.
    ///
    /// Returns `false` if the connection is already gone.
    pub async fn authorize(&self, conn_id: &str, crew_member_id: DbId, organization_id: DbId) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get_mut(conn_id) {
            Some(conn) => {
                conn.crew_member_id = Some(crew_member_id);
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
            .is_some_and(ChatConnection::is_authorized)
    }

    /// Add an authorized connection to a channel's broadcast set.
    ///
    /// Pre-auth joins are ignored and return `false`. No channel-existence
    /// check is made: broadcasting to an empty channel is a no-op fan-out.
    pub async fn join(&self, conn_id: &str, channel_id: DbId) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get_mut(conn_id) {
            Some(conn) if conn.is_authorized() => {
                conn.channels.insert(channel_id);
                true
            }
            _ => false,
        }
    }

    /// Remove a connection from a channel's broadcast set.
    pub async fn leave(&self, conn_id: &str, channel_id: DbId) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get_mut(conn_id) {
            Some(conn) if conn.is_authorized() => conn.channels.remove(&channel_id),
            _ => false,
        }
    }

    /// Whether a connection is currently in a channel's member set.
    pub async fn is_member(&self, conn_id: &str, channel_id: DbId) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|c| c.channels.contains(&channel_id))
    }

    /// Fan a frame out to every authorized member of a channel.
    ///
    /// Returns the number of connections the frame was sent to. Membership
    /// is checked at broadcast time, never cached per-message.
    pub async fn broadcast_to_channel(&self, channel_id: DbId, frame: &ServerFrame) -> usize {
        let msg = frame.to_message();
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.is_authorized() && conn.channels.contains(&channel_id) {
                let _ = conn.sender.send(msg.clone());
                count += 1;
            }
        }
        count
    }

    /// Fan a persisted chat message out to its channel's current members.
    pub async fn broadcast_new_message(&self, channel_id: DbId, message: &ChatMessage) -> usize {
        self.broadcast_to_channel(channel_id, &ServerFrame::NewMessage(message.clone()))
            .await
    }

    /// Deliver a direct message to the recipient's live connections.
    ///
    /// If the recipient has no live connection the message is simply not
    /// delivered over the socket; the persisted row remains the source of
    /// truth and push delivery covers the offline case.
    pub async fn send_direct_message(&self, recipient_id: DbId, dm: &DirectMessage) -> usize {
        let msg = ServerFrame::NewDm(dm.clone()).to_message();
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.crew_member_id == Some(recipient_id) {
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

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all chat connections");
    }
}

impl Default for ChatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Liveness for ChatRegistry {
    async fn sweep_and_ping(&self) -> (usize, usize) {
        let mut conns = self.connections.write().await;

        // Two-strike: anything that did not pong since the previous sweep
        // is terminated and removed from every set referencing it.
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
// Resource-layer seam
// ---------------------------------------------------------------------------

/// Persist a channel message, then broadcast it.
///
/// The persist-then-broadcast order is the delivery-order guarantee: within
/// one channel, members observe messages in creation order.
pub async fn persist_and_broadcast_message(
    pool: &DbPool,
    registry: &ChatRegistry,
    new: &NewChatMessage,
) -> Result<ChatMessage, sqlx::Error> {
    let message = ChatRepo::create_message(pool, new).await?;
    registry.broadcast_new_message(message.channel_id, &message).await;
    Ok(message)
}

/// Persist a direct message, then deliver it to the recipient's live
/// connections (if any).
pub async fn persist_and_send_direct_message(
    pool: &DbPool,
    registry: &ChatRegistry,
    new: &NewDirectMessage,
) -> Result<DirectMessage, sqlx::Error> {
    let dm = ChatRepo::create_direct_message(pool, new).await?;
    registry.send_direct_message(dm.recipient_id, &dm).await;
    Ok(dm)
}

// ---------------------------------------------------------------------------
// Socket handler
// ---------------------------------------------------------------------------

/// Whether the receive loop should keep going after a frame.
#[derive(PartialEq)]
enum Flow {
    Continue,
    Terminate,
}

/// HTTP handler that upgrades the connection to the chat WebSocket.
pub async fn chat_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single chat connection after upgrade.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Chat WebSocket connected");

    let mut rx = state.chat.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "Chat WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: process inbound frames.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => state.chat.mark_pong(&conn_id).await,
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => {
                    if handle_frame(&state, &conn_id, frame).await == Flow::Terminate {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Dropping malformed chat frame");
                }
            },
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Chat WebSocket receive error");
                break;
            }
        }
    }

    state.chat.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Chat WebSocket disconnected");
}

async fn handle_frame(state: &AppState, conn_id: &str, frame: ClientFrame) -> Flow {
    match frame {
        ClientFrame::Auth { token } => {
            if handle_auth(state, conn_id, &token).await {
                Flow::Continue
            } else {
                Flow::Terminate
            }
        }

        ClientFrame::JoinChannel { channel_id } => {
            if !state.chat.join(conn_id, channel_id).await {
                tracing::debug!(conn_id = %conn_id, channel_id, "Ignoring pre-auth join");
            }
            Flow::Continue
        }

        ClientFrame::LeaveChannel { channel_id } => {
            state.chat.leave(conn_id, channel_id).await;
            Flow::Continue
        }

        ClientFrame::Typing {
            channel_id,
            crew_member_id,
            name,
            is_typing,
        } => {
            if state.chat.is_authorized(conn_id).await {
                state
                    .chat
                    .broadcast_to_channel(
                        channel_id,
                        &ServerFrame::Typing {
                            channel_id,
                            crew_member_id,
                            name,
                            is_typing,
                        },
                    )
                    .await;
            }
            Flow::Continue
        }
    }
}

/// Verify the connect token and resolve the claimed identity.
///
/// Even a structurally valid token is rejected when the referenced crew
/// member is missing or inactive. Any failure emits `auth_error` and
/// returns `false`, which terminates the transport; the connection never
/// reaches the authorized state.
pub async fn handle_auth(state: &AppState, conn_id: &str, raw_token: &str) -> bool {
    let Some(claims) = token::verify(&state.config.token_secret, raw_token, Audience::Chat) else {
        return reject_auth(state, conn_id, "invalid or expired token").await;
    };

    let crew_member = match CrewMemberRepo::get_by_id(&state.pool, claims.sub).await {
        Ok(Some(member)) => member,
        Ok(None) => return reject_auth(state, conn_id, "unknown crew member").await,
        Err(e) => {
            tracing::error!(conn_id = %conn_id, error = %e, "Crew member lookup failed during auth");
            return reject_auth(state, conn_id, "authorization failed").await;
        }
    };

    if !crew_member.is_active {
        return reject_auth(state, conn_id, "inactive crew member").await;
    }

    state
        .chat
        .authorize(conn_id, crew_member.id, crew_member.organization_id)
        .await;
    state
        .chat
        .send_to_conn(
            conn_id,
            &ServerFrame::AuthSuccess {
                subject_id: crew_member.id,
            },
        )
        .await;

    tracing::info!(conn_id = %conn_id, crew_member_id = crew_member.id, "Chat connection authorized");
    true
}

async fn reject_auth(state: &AppState, conn_id: &str, reason: &str) -> bool {
    tracing::info!(conn_id = %conn_id, reason, "Chat auth rejected");
    state
        .chat
        .send_to_conn(
            conn_id,
            &ServerFrame::AuthError {
                error: reason.to_string(),
            },
        )
        .await;
    false
}

// Registry-level behaviour is covered by the integration tests in
// `tests/chat_registry.rs`.
