use super::Store;
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use zapgate_core::chat::{ChatKind, ContactPatch};
use zapgate_core::jid::Jid;
use zapgate_core::message::{Direction, Message, MessageKind, MessageStatus};
use zapgate_core::session::{Session, SessionStatus};
use zapgate_core::traits::{
    ChatRepository, ContactRepository, MessageRepository, SessionRepository, WebhookRepository,
};
use zapgate_core::webhook::{WebhookEvent, WebhookStatus};
use zapgate_core::GatewayError;

/// Create an in-memory store for testing.
async fn test_store() -> Store {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap();
    Store::run_migrations(&pool).await.unwrap();
    Store { pool }
}

fn make_session(id: &str, name: &str) -> Session {
    let now = Utc::now();
    Session {
        id: id.to_string(),
        name: name.to_string(),
        device_jid: String::new(),
        status: SessionStatus::Disconnected,
        qr_code: None,
        qr_png: None,
        webhook_url: String::new(),
        webhook_events: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn make_message(session_id: &str, msg_id: &str, chat: &Jid, direction: Direction) -> Message {
    Message {
        session_id: session_id.to_string(),
        msg_id: msg_id.to_string(),
        chat_jid: chat.clone(),
        sender_jid: chat.clone(),
        direction,
        kind: MessageKind::Text,
        content: "hello".to_string(),
        status: MessageStatus::Sent,
        timestamp: Utc::now(),
        media_path: None,
        media_mime: None,
        media_size: None,
        raw_payload: None,
    }
}

fn make_event(id: &str, session_id: &str) -> WebhookEvent {
    let now = Utc::now();
    WebhookEvent {
        id: id.to_string(),
        session_id: session_id.to_string(),
        event_type: "message".to_string(),
        url: "http://127.0.0.1:9/hook".to_string(),
        payload: serde_json::json!({"k": "v"}),
        status: WebhookStatus::Pending,
        attempts: 0,
        max_attempts: 3,
        next_retry_at: None,
        last_error: None,
        http_status: None,
        response_body: None,
        last_latency_ms: None,
        delivered_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn chat_jid() -> Jid {
    Jid::parse("5511999887766@s.whatsapp.net").unwrap()
}

#[tokio::test]
async fn test_session_crud() {
    let store = test_store().await;
    let sessions: &dyn SessionRepository = &store;
    sessions.create(&make_session("s1", "primary")).await.unwrap();

    let got = sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(got.name, "primary");
    assert_eq!(got.status, SessionStatus::Disconnected);
    assert!(!got.is_bound());

    let by_name = sessions.get_by_name("primary").await.unwrap().unwrap();
    assert_eq!(by_name.id, "s1");

    sessions.create(&make_session("s2", "backup")).await.unwrap();
    assert_eq!(sessions.list().await.unwrap().len(), 2);

    sessions.delete("s2").await.unwrap();
    assert!(sessions.get("s2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_duplicate_name_rejected() {
    let store = test_store().await;
    let sessions: &dyn SessionRepository = &store;
    sessions.create(&make_session("s1", "primary")).await.unwrap();
    let err = sessions
        .create(&make_session("s2", "primary"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_session_status_and_binding() {
    let store = test_store().await;
    let sessions: &dyn SessionRepository = &store;
    sessions.create(&make_session("s1", "primary")).await.unwrap();
    sessions.create(&make_session("s2", "backup")).await.unwrap();

    sessions
        .update_status("s1", SessionStatus::Connected)
        .await
        .unwrap();
    sessions
        .update_device_jid("s1", "5511888@s.whatsapp.net")
        .await
        .unwrap();

    let got = sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(got.status, SessionStatus::Connected);
    assert!(got.is_bound());

    // Only bound sessions participate in startup reconnect.
    let bound = sessions.bound_sessions().await.unwrap();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].id, "s1");

    // Logout unbinds.
    sessions.update_device_jid("s1", "").await.unwrap();
    assert!(sessions.bound_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_qr_set_and_clear() {
    let store = test_store().await;
    let sessions: &dyn SessionRepository = &store;
    sessions.create(&make_session("s1", "primary")).await.unwrap();

    sessions
        .set_qr("s1", "2@abc,def", "data:image/png;base64,AAAA")
        .await
        .unwrap();
    let got = sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(got.qr_code.as_deref(), Some("2@abc,def"));
    assert!(got.qr_png.as_deref().unwrap().starts_with("data:image/png"));

    sessions.clear_qr("s1").await.unwrap();
    let got = sessions.get("s1").await.unwrap().unwrap();
    assert!(got.qr_code.is_none());
    assert!(got.qr_png.is_none());
}

#[tokio::test]
async fn test_session_webhook_subscription() {
    let store = test_store().await;
    let sessions: &dyn SessionRepository = &store;
    sessions.create(&make_session("s1", "primary")).await.unwrap();
    sessions
        .set_webhook(
            "s1",
            "https://hooks.example.com/wa",
            &["message".to_string(), "receipt.update".to_string()],
        )
        .await
        .unwrap();

    let got = sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(got.webhook_url, "https://hooks.example.com/wa");
    assert!(got.wants_event("message"));
    assert!(got.wants_event("receipt.update"));
    assert!(!got.wants_event("presence.update"));
}

#[tokio::test]
async fn test_message_insert_is_idempotent() {
    let store = test_store().await;
    let messages: &dyn MessageRepository = &store;
    let chat = chat_jid();
    let msg = make_message("s1", "MSG1", &chat, Direction::Inbound);

    assert!(messages.insert(&msg).await.unwrap());
    // Replay of the same (session_id, msg_id) is swallowed.
    assert!(!messages.insert(&msg).await.unwrap());
    assert!(messages.exists("s1", "MSG1").await.unwrap());

    // Same msg_id under another session is a distinct message.
    let other = make_message("s2", "MSG1", &chat, Direction::Inbound);
    assert!(messages.insert(&other).await.unwrap());
}

#[tokio::test]
async fn test_receipt_status_only_moves_forward() {
    let store = test_store().await;
    let messages: &dyn MessageRepository = &store;
    let chat = chat_jid();
    messages
        .insert(&make_message("s1", "MSG1", &chat, Direction::Outbound))
        .await
        .unwrap();

    messages
        .update_status("s1", "MSG1", MessageStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(
        messages.get("s1", "MSG1").await.unwrap().unwrap().status,
        MessageStatus::Delivered
    );

    messages
        .update_status("s1", "MSG1", MessageStatus::Read)
        .await
        .unwrap();
    // A late delivered receipt after read must not regress.
    messages
        .update_status("s1", "MSG1", MessageStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(
        messages.get("s1", "MSG1").await.unwrap().unwrap().status,
        MessageStatus::Read
    );
}

#[tokio::test]
async fn test_message_media_columns() {
    let store = test_store().await;
    let messages: &dyn MessageRepository = &store;
    let chat = chat_jid();
    messages
        .insert(&make_message("s1", "MSG1", &chat, Direction::Inbound))
        .await
        .unwrap();

    assert!(!messages.has_media("s1", "MSG1").await.unwrap());
    messages
        .set_media("s1", "MSG1", "s1/c/inbound/MSG1.jpg", "image/jpeg", 1234)
        .await
        .unwrap();
    assert!(messages.has_media("s1", "MSG1").await.unwrap());

    let got = messages.get("s1", "MSG1").await.unwrap().unwrap();
    assert_eq!(got.media_path.as_deref(), Some("s1/c/inbound/MSG1.jpg"));
    assert_eq!(got.media_size, Some(1234));
}

#[tokio::test]
async fn test_chat_counters_track_messages() {
    let store = test_store().await;
    let chats: &dyn ChatRepository = &store;
    let chat = chat_jid();
    let now = Utc::now();

    // Three inbound (unread) and one outbound.
    for (i, unread) in [(1i64, true), (2, true), (3, true), (4, false)] {
        chats
            .apply_message(
                "s1",
                &chat,
                ChatKind::Individual,
                "Alice",
                now + Duration::seconds(i),
                unread,
            )
            .await
            .unwrap();
    }

    let got = chats.get("s1", &chat).await.unwrap().unwrap();
    assert_eq!(got.message_count, 4);
    assert_eq!(got.unread_count, 3);
    assert_eq!(got.name, "Alice");

    chats.mark_read("s1", &chat).await.unwrap();
    let got = chats.get("s1", &chat).await.unwrap().unwrap();
    assert_eq!(got.unread_count, 0);
    assert_eq!(got.message_count, 4);
}

#[tokio::test]
async fn test_chat_name_first_nonempty_wins() {
    let store = test_store().await;
    let chats: &dyn ChatRepository = &store;
    let chat = chat_jid();
    let now = Utc::now();

    chats
        .apply_message("s1", &chat, ChatKind::Individual, "", now, true)
        .await
        .unwrap();
    chats
        .apply_message("s1", &chat, ChatKind::Individual, "Alice", now, true)
        .await
        .unwrap();
    chats
        .apply_message("s1", &chat, ChatKind::Individual, "Bob", now, true)
        .await
        .unwrap();

    let got = chats.get("s1", &chat).await.unwrap().unwrap();
    assert_eq!(got.name, "Alice");
}

#[tokio::test]
async fn test_chat_last_message_at_monotonic() {
    let store = test_store().await;
    let chats: &dyn ChatRepository = &store;
    let chat = chat_jid();
    let newer = Utc::now();
    let older = newer - Duration::days(3);

    chats
        .apply_message("s1", &chat, ChatKind::Individual, "", newer, true)
        .await
        .unwrap();
    // History backfill replays an older message afterwards.
    chats
        .apply_message("s1", &chat, ChatKind::Individual, "", older, false)
        .await
        .unwrap();

    let got = chats.get("s1", &chat).await.unwrap().unwrap();
    let last = got.last_message_at.unwrap();
    assert!((last - newer).num_milliseconds().abs() < 5);
    assert_eq!(got.message_count, 2);
}

#[tokio::test]
async fn test_chat_flags() {
    let store = test_store().await;
    let chats: &dyn ChatRepository = &store;
    let chat = chat_jid();
    chats
        .apply_message("s1", &chat, ChatKind::Individual, "", Utc::now(), false)
        .await
        .unwrap();

    let until = Utc::now() + Duration::hours(8);
    chats.set_muted("s1", &chat, true, Some(until)).await.unwrap();
    chats.set_pinned("s1", &chat, true).await.unwrap();
    chats.set_archived("s1", &chat, true).await.unwrap();
    chats.rename("s1", &chat, "Work").await.unwrap();

    let got = chats.get("s1", &chat).await.unwrap().unwrap();
    assert!(got.muted);
    assert!(got.muted_until.is_some());
    assert!(got.pinned);
    assert!(got.archived);
    assert_eq!(got.name, "Work");

    chats.set_muted("s1", &chat, false, None).await.unwrap();
    let got = chats.get("s1", &chat).await.unwrap().unwrap();
    assert!(!got.muted);
    assert!(got.muted_until.is_none());
}

#[tokio::test]
async fn test_chat_flags_create_row_on_first_sight() {
    let store = test_store().await;
    let chats: &dyn ChatRepository = &store;
    let chat = chat_jid();

    // No message has ever been seen for this chat.
    chats.set_archived("s1", &chat, true).await.unwrap();

    let got = chats.get("s1", &chat).await.unwrap().unwrap();
    assert!(got.archived);
    assert_eq!(got.kind, ChatKind::Individual);
    assert_eq!(got.message_count, 0);
    assert_eq!(got.unread_count, 0);
}

#[tokio::test]
async fn test_contact_partial_update_never_blanks() {
    let store = test_store().await;
    let contacts: &dyn ContactRepository = &store;
    let jid = chat_jid();

    contacts
        .upsert(
            "s1",
            &jid,
            &ContactPatch {
                push_name: Some("Alice".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // A later event carrying only a full name must keep the push name.
    contacts
        .upsert(
            "s1",
            &jid,
            &ContactPatch {
                full_name: Some("Alice Smith".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // And an empty patch must not blank anything.
    contacts
        .upsert("s1", &jid, &ContactPatch::default())
        .await
        .unwrap();

    let got = contacts.get("s1", &jid).await.unwrap().unwrap();
    assert_eq!(got.push_name, "Alice");
    assert_eq!(got.full_name, "Alice Smith");
}

#[tokio::test]
async fn test_contact_picture_and_last_seen() {
    let store = test_store().await;
    let contacts: &dyn ContactRepository = &store;
    let jid = chat_jid();
    let seen = Utc::now();

    contacts
        .upsert(
            "s1",
            &jid,
            &ContactPatch {
                picture_id: Some("pic-9".to_string()),
                last_seen_at: Some(seen),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let got = contacts.get("s1", &jid).await.unwrap().unwrap();
    assert_eq!(got.picture_id, "pic-9");
    assert!(got.last_seen_at.is_some());
    assert_eq!(contacts.list("s1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_enqueue_and_pending() {
    let store = test_store().await;
    let webhooks: &dyn WebhookRepository = &store;
    webhooks.enqueue(&make_event("w1", "s1")).await.unwrap();
    webhooks.enqueue(&make_event("w2", "s1")).await.unwrap();

    let pending = webhooks.pending_events(10).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].status, WebhookStatus::Pending);
    assert_eq!(pending[0].payload, serde_json::json!({"k": "v"}));
}

#[tokio::test]
async fn test_webhook_retry_readiness() {
    let store = test_store().await;
    let webhooks: &dyn WebhookRepository = &store;
    webhooks.enqueue(&make_event("w1", "s1")).await.unwrap();

    // First failed attempt schedules a retry 30s out.
    let mut ev = webhooks.get("w1").await.unwrap().unwrap();
    ev.status = WebhookStatus::Retry;
    ev.attempts = 1;
    ev.next_retry_at = Some(Utc::now() + Duration::seconds(30));
    ev.last_error = Some("connect refused".to_string());
    webhooks.record_attempt(&ev).await.unwrap();

    // Not due yet.
    assert!(webhooks
        .retryable_events(Utc::now(), 10)
        .await
        .unwrap()
        .is_empty());
    // Due once the clock passes next_retry_at.
    let later = Utc::now() + Duration::seconds(31);
    assert_eq!(webhooks.retryable_events(later, 10).await.unwrap().len(), 1);

    // Exhausted attempts drop out even when due.
    ev.attempts = ev.max_attempts;
    webhooks.record_attempt(&ev).await.unwrap();
    assert!(webhooks.retryable_events(later, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_terminal_states_not_retried() {
    let store = test_store().await;
    let webhooks: &dyn WebhookRepository = &store;
    webhooks.enqueue(&make_event("w1", "s1")).await.unwrap();
    webhooks.enqueue(&make_event("w2", "s1")).await.unwrap();

    let mut sent = webhooks.get("w1").await.unwrap().unwrap();
    sent.status = WebhookStatus::Sent;
    sent.attempts = 1;
    sent.delivered_at = Some(Utc::now());
    sent.http_status = Some(200);
    webhooks.record_attempt(&sent).await.unwrap();

    let mut failed = webhooks.get("w2").await.unwrap().unwrap();
    failed.status = WebhookStatus::Failed;
    failed.attempts = 3;
    webhooks.record_attempt(&failed).await.unwrap();

    let later = Utc::now() + Duration::hours(1);
    assert!(webhooks.retryable_events(later, 10).await.unwrap().is_empty());
    assert!(webhooks.pending_events(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_cleanup_spares_undelivered() {
    let store = test_store().await;
    let webhooks: &dyn WebhookRepository = &store;

    let mut old_sent = make_event("w1", "s1");
    old_sent.status = WebhookStatus::Sent;
    old_sent.created_at = Utc::now() - Duration::days(40);
    webhooks.enqueue(&old_sent).await.unwrap();

    let mut old_pending = make_event("w2", "s1");
    old_pending.created_at = Utc::now() - Duration::days(40);
    webhooks.enqueue(&old_pending).await.unwrap();

    webhooks.enqueue(&make_event("w3", "s1")).await.unwrap();

    let removed = webhooks
        .cleanup_old(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(webhooks.get("w1").await.unwrap().is_none());
    assert!(webhooks.get("w2").await.unwrap().is_some());
    assert!(webhooks.get("w3").await.unwrap().is_some());
}

#[tokio::test]
async fn test_delivery_stats() {
    let store = test_store().await;
    let webhooks: &dyn WebhookRepository = &store;

    for (id, status, latency) in [
        ("w1", WebhookStatus::Sent, Some(100)),
        ("w2", WebhookStatus::Sent, Some(200)),
        ("w3", WebhookStatus::Failed, None),
        ("w4", WebhookStatus::Pending, None),
    ] {
        let mut ev = make_event(id, "s1");
        ev.status = status;
        ev.last_latency_ms = latency;
        webhooks.enqueue(&ev).await.unwrap();
    }
    let mut other = make_event("w5", "s2");
    other.status = WebhookStatus::Sent;
    webhooks.enqueue(&other).await.unwrap();

    let since = Utc::now() - Duration::hours(1);
    let stats = webhooks.delivery_stats(Some("s1"), since).await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 1);
    assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
    assert!((stats.avg_latency_ms - 150.0).abs() < f64::EPSILON);

    let all = webhooks.delivery_stats(None, since).await.unwrap();
    assert_eq!(all.total, 5);
    assert_eq!(all.sent, 3);
}
