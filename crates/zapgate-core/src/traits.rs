//! Collaborator contracts consumed by the gateway core.
//!
//! The protocol client and object store are black boxes behind these traits;
//! the repositories are implemented by `zapgate-store`.

use crate::chat::{Chat, ChatKind, Contact, ContactPatch};
use crate::error::Result;
use crate::event::{ProtocolEvent, QrEvent};
use crate::jid::Jid;
use crate::media::{MediaContent, MediaKind};
use crate::message::{Direction, Message, MessageStatus};
use crate::outbound::{MediaUpload, OutboundContent, SendResult};
use crate::session::{Session, SessionStatus};
use crate::webhook::{DeliveryStats, WebhookEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Where a client pushes its event stream. Unbounded so the protocol read
/// loop is never back-pressured by slow ingestion.
pub type EventSink = mpsc::UnboundedSender<ProtocolEvent>;

/// One per-device protocol connection. Implementations wrap an actual
/// WhatsApp client library; tests substitute fakes.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Open the transport and authenticate. For an unpaired device this
    /// starts emitting QR events on the channel from [`qr_channel`].
    ///
    /// [`qr_channel`]: ProtocolClient::qr_channel
    async fn connect(&self) -> Result<()>;

    /// Close the transport. Idempotent.
    async fn disconnect(&self);

    /// Unlink this device from the account on the provider side. The
    /// credential is unusable afterwards.
    async fn logout(&self) -> Result<()>;

    /// Cheap liveness probe of the underlying transport.
    fn is_connected(&self) -> bool;

    /// Obtain the QR pairing stream. Must be called before `connect` so no
    /// code event is lost.
    async fn qr_channel(&self) -> Result<mpsc::Receiver<QrEvent>>;

    /// Request a one-time phone-number link code instead of a QR scan.
    async fn pair_phone(&self, phone: &str) -> Result<String>;

    async fn send_message(&self, to: &Jid, content: &OutboundContent) -> Result<SendResult>;

    /// Encrypt-and-upload media to the provider, returning the reference an
    /// outbound message embeds.
    async fn upload(&self, data: Vec<u8>, kind: MediaKind) -> Result<MediaUpload>;

    /// Typed download for a live message — the client still holds the
    /// decryption context for it.
    async fn download(&self, media: &MediaContent) -> Result<Vec<u8>>;

    /// Decrypt-and-download by explicit cryptographic metadata, used for
    /// historical messages.
    #[allow(clippy::too_many_arguments)]
    async fn download_by_path(
        &self,
        direct_path: &str,
        media_key: &[u8],
        file_enc_sha256: &[u8],
        file_sha256: &[u8],
        file_length: u64,
        kind: MediaKind,
    ) -> Result<Vec<u8>>;
}

/// Builds protocol clients. `resume` reuses a persisted device credential;
/// `fresh` mints a new device for first-time pairing.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn resume(
        &self,
        session_id: &str,
        device_jid: &str,
        events: EventSink,
    ) -> Result<Arc<dyn ProtocolClient>>;

    async fn fresh(&self, session_id: &str, events: EventSink)
        -> Result<Arc<dyn ProtocolClient>>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Session>>;
    async fn list(&self) -> Result<Vec<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn update_status(&self, id: &str, status: SessionStatus) -> Result<()>;
    /// Persist the device binding learned from pairing; empty unbinds.
    async fn update_device_jid(&self, id: &str, device_jid: &str) -> Result<()>;
    async fn set_qr(&self, id: &str, code: &str, png_data_uri: &str) -> Result<()>;
    async fn clear_qr(&self, id: &str) -> Result<()>;
    /// Sessions with a bound device — the startup reconnection set.
    async fn bound_sessions(&self) -> Result<Vec<Session>>;
    async fn set_webhook(&self, id: &str, url: &str, events: &[String]) -> Result<()>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert if absent. Returns false when `(session_id, msg_id)` already
    /// exists — the idempotence seam for replayed events.
    async fn insert(&self, message: &Message) -> Result<bool>;
    async fn exists(&self, session_id: &str, msg_id: &str) -> Result<bool>;
    async fn get(&self, session_id: &str, msg_id: &str) -> Result<Option<Message>>;
    /// Forward-only status update; a lower-ranked status is a no-op.
    async fn update_status(
        &self,
        session_id: &str,
        msg_id: &str,
        status: MessageStatus,
    ) -> Result<()>;
    async fn set_media(
        &self,
        session_id: &str,
        msg_id: &str,
        path: &str,
        mime_type: &str,
        size: i64,
    ) -> Result<()>;
    /// Whether media has already been resolved for this message.
    async fn has_media(&self, session_id: &str, msg_id: &str) -> Result<bool>;
    async fn list_for_chat(
        &self,
        session_id: &str,
        chat_jid: &Jid,
        limit: i64,
    ) -> Result<Vec<Message>>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Create-if-absent and fold one message into the projection: bump
    /// `message_count`, bump `unread_count` when `count_unread`, refresh
    /// `last_message_at`, keep the earliest non-empty name.
    #[allow(clippy::too_many_arguments)]
    async fn apply_message(
        &self,
        session_id: &str,
        jid: &Jid,
        kind: ChatKind,
        name: &str,
        at: DateTime<Utc>,
        count_unread: bool,
    ) -> Result<()>;
    async fn get(&self, session_id: &str, jid: &Jid) -> Result<Option<Chat>>;
    async fn list(&self, session_id: &str) -> Result<Vec<Chat>>;
    /// Zero `unread_count`; `message_count` is untouched.
    async fn mark_read(&self, session_id: &str, jid: &Jid) -> Result<()>;
    async fn set_muted(
        &self,
        session_id: &str,
        jid: &Jid,
        muted: bool,
        until: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn set_archived(&self, session_id: &str, jid: &Jid, archived: bool) -> Result<()>;
    async fn set_pinned(&self, session_id: &str, jid: &Jid, pinned: bool) -> Result<()>;
    async fn rename(&self, session_id: &str, jid: &Jid, name: &str) -> Result<()>;
}

#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Create-if-absent, then apply only the populated patch fields.
    async fn upsert(&self, session_id: &str, jid: &Jid, patch: &ContactPatch) -> Result<()>;
    async fn get(&self, session_id: &str, jid: &Jid) -> Result<Option<Contact>>;
    async fn list(&self, session_id: &str) -> Result<Vec<Contact>>;
}

#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn enqueue(&self, event: &WebhookEvent) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<WebhookEvent>>;
    /// Persist the full post-attempt state of an event.
    async fn record_attempt(&self, event: &WebhookEvent) -> Result<()>;
    async fn pending_events(&self, limit: i64) -> Result<Vec<WebhookEvent>>;
    /// Events eligible and due as of `now`, oldest first.
    async fn retryable_events(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<WebhookEvent>>;
    async fn delivery_stats(
        &self,
        session_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<DeliveryStats>;
    /// Delete terminal events older than the cutoff; returns rows removed.
    async fn cleanup_old(&self, older_than: DateTime<Utc>) -> Result<u64>;
}

/// Where a media object lands in durable storage. `object_path` is a
/// contract shared with external consumers and must stay bit-exact.
#[derive(Debug, Clone)]
pub struct MediaPlacement<'a> {
    pub session_id: &'a str,
    pub chat_jid: &'a Jid,
    pub direction: Direction,
    pub message_id: &'a str,
    pub content_type: &'a str,
    pub extension: &'a str,
}

impl MediaPlacement<'_> {
    /// `{sessionID}/{chatJID}/{direction}/{messageID}.{extension}`
    pub fn object_path(&self) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            self.session_id,
            self.chat_jid,
            self.direction.as_str(),
            self.message_id,
            self.extension
        )
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store the object and return its path.
    async fn upload(&self, data: &[u8], placement: &MediaPlacement<'_>) -> Result<String>;
    /// A URL a consumer can fetch the object from.
    async fn media_url(&self, object_path: &str) -> Result<String>;
    async fn delete(&self, object_path: &str) -> Result<()>;
}

/// Seam between ingestion and webhook delivery. Implementations must queue
/// and return quickly — never block the caller on network I/O.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn notify(&self, session: &Session, event_type: &str, payload: serde_json::Value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_convention() {
        let chat = Jid::parse("5511999887766@s.whatsapp.net").unwrap();
        let placement = MediaPlacement {
            session_id: "sess-1",
            chat_jid: &chat,
            direction: Direction::Inbound,
            message_id: "3EB0ABC123",
            content_type: "image/jpeg",
            extension: "jpg",
        };
        assert_eq!(
            placement.object_path(),
            "sess-1/5511999887766@s.whatsapp.net/inbound/3EB0ABC123.jpg"
        );
    }
}
