//! Wire protocol for both WebSocket endpoints.
//!
//! Every frame is `{"type": <string>, "payload": <object>}`. Frame type
//! names are snake_case; payload keys are camelCase to match the browser
//! clients. Inbound frames are parsed defensively: a frame that fails to
//! parse is logged and dropped, never closing the connection.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use fieldline_core::types::DbId;
use fieldline_db::models::chat::{ChatMessage, DirectMessage};

/// Frames a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Handshake: carries the signed connect token. The transport is a
    /// persistent connection opened before any request/response exchange
    /// exists, so the token rides in the first frame rather than a header.
    Auth { token: String },

    /// Typing indicator; re-broadcast verbatim to the channel, not persisted.
    #[serde(rename_all = "camelCase")]
    Typing {
        channel_id: DbId,
        crew_member_id: DbId,
        name: String,
        is_typing: bool,
    },

    /// Join a channel's broadcast set.
    #[serde(rename_all = "camelCase")]
    JoinChannel { channel_id: DbId },

    /// Leave a channel's broadcast set.
    #[serde(rename_all = "camelCase")]
    LeaveChannel { channel_id: DbId },
}

/// Frames the server may send.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    AuthSuccess { subject_id: DbId },

    AuthError { error: String },

    NewMessage(ChatMessage),

    NewDm(DirectMessage),

    #[serde(rename_all = "camelCase")]
    Typing {
        channel_id: DbId,
        crew_member_id: DbId,
        name: String,
        is_typing: bool,
    },

    Notification(SystemNotification),
}

impl ServerFrame {
    /// Encode as a WebSocket text message.
    pub fn to_message(&self) -> Message {
        let text = serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to encode server frame");
            "{}".to_string()
        });
        Message::Text(text.into())
    }
}

/// A transient tenant-scoped system alert.
///
/// Broadcast to authorized operator connections of the matching tenant and
/// never persisted; distinct from the per-recipient notification rows the
/// storage layer owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotification {
    /// Tenant scope. A notification without one is rejected at the source
    /// rather than broadcast to everyone.
    pub organization_id: Option<DbId>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth_frame() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"auth","payload":{"token":"abc"}}"#).unwrap();
        match frame {
            ClientFrame::Auth { token } => assert_eq!(token, "abc"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn parses_join_channel_frame_with_camel_case_payload() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"join_channel","payload":{"channelId":42}}"#).unwrap();
        match frame {
            ClientFrame::JoinChannel { channel_id } => assert_eq!(channel_id, 42),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_frame_type() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"type":"shutdown","payload":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn serializes_auth_success_with_camel_case_payload() {
        let json = serde_json::to_value(ServerFrame::AuthSuccess { subject_id: 7 }).unwrap();
        assert_eq!(json["type"], "auth_success");
        assert_eq!(json["payload"]["subjectId"], 7);
    }

    #[test]
    fn serializes_typing_frame() {
        let json = serde_json::to_value(ServerFrame::Typing {
            channel_id: 1,
            crew_member_id: 2,
            name: "Ana".into(),
            is_typing: true,
        })
        .unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["payload"]["channelId"], 1);
        assert_eq!(json["payload"]["isTyping"], true);
    }
}
