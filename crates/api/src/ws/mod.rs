//! WebSocket infrastructure for real-time delivery.
//!
//! Two persistent-connection endpoints share this module: crew chat /
//! direct messages ([`chat`]) and tenant operator notifications
//! ([`notify`]). Each owns its own connection registry; both registries
//! are swept by the shared two-strike heartbeat ([`heartbeat`]) and speak
//! the `{type, payload}` frame protocol ([`protocol`]).
//!
//! Registries are process-local: this design assumes a single running
//! instance holds all live connections.

pub mod chat;
pub mod heartbeat;
pub mod notify;
pub mod protocol;

pub use chat::{chat_ws_handler, ChatRegistry};
pub use heartbeat::{start_heartbeat, Liveness};
pub use notify::{notify_ws_handler, NotifyRegistry};
pub use protocol::{ClientFrame, ServerFrame, SystemNotification};
