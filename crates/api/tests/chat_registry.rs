//! Unit tests for `ChatRegistry`.
//!
//! These tests exercise the chat connection registry directly, without
//! performing any HTTP upgrades. They verify the auth gate, channel
//! membership, broadcast delivery, direct-message addressing, the
//! two-strike liveness sweep, and graceful shutdown behaviour.

use assert_matches::assert_matches;
use axum::extract::ws::Message;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;

use fieldline_api::ws::{ChatRegistry, Liveness, ServerFrame};
use fieldline_db::models::chat::{ChatMessage, DirectMessage};

/// Pop the next message off a connection's channel and parse it as JSON.
fn recv_json(rx: &mut UnboundedReceiver<Message>) -> serde_json::Value {
    match rx.try_recv().expect("expected a queued message") {
        Message::Text(text) => serde_json::from_str(&text).expect("frame should be valid JSON"),
        other => panic!("Expected Text frame, got: {other:?}"),
    }
}

fn sample_message(channel_id: i64) -> ChatMessage {
    ChatMessage {
        id: 1,
        channel_id,
        sender_id: 10,
        body: "on my way".to_string(),
        created_at: Utc::now(),
    }
}

fn sample_dm(recipient_id: i64) -> DirectMessage {
    DirectMessage {
        id: 1,
        sender_id: 10,
        recipient_id,
        body: "call me when free".to_string(),
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Test: new registry starts with zero connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_registry_has_zero_connections() {
    let registry = ChatRegistry::new();

    assert_eq!(registry.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: add() and remove() update the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_update_connection_count() {
    let registry = ChatRegistry::new();

    let _rx = registry.add("conn-1".to_string()).await;
    assert_eq!(registry.connection_count().await, 1);

    registry.remove("conn-1").await;
    assert_eq!(registry.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: join before auth is rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_before_auth_is_rejected() {
    let registry = ChatRegistry::new();
    let _rx = registry.add("conn-1".to_string()).await;

    assert!(!registry.join("conn-1", 5).await);
    assert!(!registry.is_member("conn-1", 5).await);
}

// ---------------------------------------------------------------------------
// Test: broadcast reaches only authorized channel members
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_only_channel_members() {
    let registry = ChatRegistry::new();

    let mut member_rx = registry.add("member".to_string()).await;
    let mut outsider_rx = registry.add("outsider".to_string()).await;
    let mut unauthorized_rx = registry.add("unauthorized".to_string()).await;

    registry.authorize("member", 1, 100).await;
    registry.authorize("outsider", 2, 100).await;
    assert!(registry.join("member", 5).await);

    let count = registry.broadcast_new_message(5, &sample_message(5)).await;
    assert_eq!(count, 1);

    let frame = recv_json(&mut member_rx);
    assert_eq!(frame["type"], "new_message");
    assert_eq!(frame["payload"]["channelId"], 5);
    assert_eq!(frame["payload"]["body"], "on my way");

    assert!(outsider_rx.try_recv().is_err());
    assert!(unauthorized_rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: leave() stops delivery to a former member
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_stops_delivery() {
    let registry = ChatRegistry::new();
    let mut rx = registry.add("conn-1".to_string()).await;

    registry.authorize("conn-1", 1, 100).await;
    registry.join("conn-1", 5).await;
    registry.broadcast_new_message(5, &sample_message(5)).await;
    assert_eq!(recv_json(&mut rx)["type"], "new_message");

    assert!(registry.leave("conn-1", 5).await);
    let count = registry.broadcast_new_message(5, &sample_message(5)).await;
    assert_eq!(count, 0);
    assert!(rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: typing frames fan out at broadcast time
// ---------------------------------------------------------------------------

#[tokio::test]
async fn typing_frame_fans_out_to_members() {
    let registry = ChatRegistry::new();
    let mut rx = registry.add("conn-1".to_string()).await;

    registry.authorize("conn-1", 1, 100).await;
    registry.join("conn-1", 5).await;

    let frame = ServerFrame::Typing {
        channel_id: 5,
        crew_member_id: 2,
        name: "Dana".to_string(),
        is_typing: true,
    };
    assert_eq!(registry.broadcast_to_channel(5, &frame).await, 1);

    let received = recv_json(&mut rx);
    assert_eq!(received["type"], "typing");
    assert_eq!(received["payload"]["crewMemberId"], 2);
    assert_eq!(received["payload"]["isTyping"], true);
}

// ---------------------------------------------------------------------------
// Test: direct messages reach every connection of the recipient
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_message_reaches_all_recipient_connections() {
    let registry = ChatRegistry::new();

    let mut phone_rx = registry.add("phone".to_string()).await;
    let mut laptop_rx = registry.add("laptop".to_string()).await;
    let mut other_rx = registry.add("other".to_string()).await;

    registry.authorize("phone", 7, 100).await;
    registry.authorize("laptop", 7, 100).await;
    registry.authorize("other", 8, 100).await;

    let count = registry.send_direct_message(7, &sample_dm(7)).await;
    assert_eq!(count, 2);

    assert_eq!(recv_json(&mut phone_rx)["type"], "new_dm");
    assert_eq!(recv_json(&mut laptop_rx)["type"], "new_dm");
    assert!(other_rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: direct message with no live recipient delivers to nobody
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_message_offline_recipient_is_not_an_error() {
    let registry = ChatRegistry::new();

    let count = registry.send_direct_message(7, &sample_dm(7)).await;
    assert_eq!(count, 0);
}

// ---------------------------------------------------------------------------
// Test: two-strike sweep only prunes after a second missed pong
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_requires_two_missed_pongs() {
    let registry = ChatRegistry::new();

    let mut quiet_rx = registry.add("quiet".to_string()).await;
    let mut responsive_rx = registry.add("responsive".to_string()).await;

    // First sweep: both are fresh, both survive and get pinged.
    let (pruned, pinged) = registry.sweep_and_ping().await;
    assert_eq!((pruned, pinged), (0, 2));
    assert_matches!(quiet_rx.try_recv(), Ok(Message::Ping(_)));
    assert_matches!(responsive_rx.try_recv(), Ok(Message::Ping(_)));

    // Only one connection answers.
    registry.mark_pong("responsive").await;

    // Second sweep: the silent connection is terminated.
    let (pruned, pinged) = registry.sweep_and_ping().await;
    assert_eq!((pruned, pinged), (1, 1));
    assert_eq!(registry.connection_count().await, 1);

    let msg = quiet_rx.try_recv().expect("quiet conn should receive Close");
    assert_matches!(msg, Message::Close(None));
}

// ---------------------------------------------------------------------------
// Test: pruning removes the connection from channel broadcast sets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pruned_connection_leaves_channel_sets() {
    let registry = ChatRegistry::new();
    let _rx = registry.add("conn-1".to_string()).await;

    registry.authorize("conn-1", 1, 100).await;
    registry.join("conn-1", 5).await;

    // Two sweeps with no pong in between.
    registry.sweep_and_ping().await;
    let (pruned, _) = registry.sweep_and_ping().await;
    assert_eq!(pruned, 1);

    assert_eq!(registry.broadcast_new_message(5, &sample_message(5)).await, 0);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let registry = ChatRegistry::new();

    let mut rx1 = registry.add("conn-1".to_string()).await;
    let mut rx2 = registry.add("conn-2".to_string()).await;
    assert_eq!(registry.connection_count().await, 2);

    registry.shutdown_all().await;
    assert_eq!(registry.connection_count().await, 0);

    let msg1 = rx1.recv().await.expect("rx1 should receive Close");
    assert_matches!(msg1, Message::Close(None));

    let msg2 = rx2.recv().await.expect("rx2 should receive Close");
    assert_matches!(msg2, Message::Close(None));
}
