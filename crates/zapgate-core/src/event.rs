//! The tagged event stream emitted by a protocol client.
//!
//! Decoding from the wire happens inside the client adapter — by the time an
//! event reaches the router it is one of these closed variants with typed
//! payloads, never a raw key-value blob.

use crate::jid::Jid;
use crate::media::MediaContent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One event from a session's protocol stream.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    Message(MessageEvent),
    Undecryptable(UndecryptableEvent),
    Receipt(ReceiptEvent),
    Presence(PresenceEvent),
    ChatPresence(ChatPresenceEvent),
    Contact(ContactEvent),
    PushName(PushNameEvent),
    Picture(PictureEvent),
    Mute(MuteEvent),
    Archive(ArchiveEvent),
    Pin(PinEvent),
    GroupInfo(GroupInfoEvent),
    HistorySync(HistorySyncEvent),
    /// Transport is up and authenticated.
    Connected { device_jid: String },
    /// Transport dropped. The supervisor tears the session down.
    Disconnected,
    /// Device was unlinked remotely. Requires re-pairing.
    LoggedOut,
    /// First-time pairing completed.
    PairSuccess { device_jid: String },
    /// Forward-compatibility arm for kinds this build does not know.
    Unknown { kind: String },
}

impl ProtocolEvent {
    /// Stable kind string used for logging and webhook subscription filters.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::Message(_) => "message",
            ProtocolEvent::Undecryptable(_) => "message.undecryptable",
            ProtocolEvent::Receipt(_) => "receipt.update",
            ProtocolEvent::Presence(_) => "presence.update",
            ProtocolEvent::ChatPresence(_) => "presence.chat",
            ProtocolEvent::Contact(_) => "contact.update",
            ProtocolEvent::PushName(_) => "contact.push_name",
            ProtocolEvent::Picture(_) => "contact.picture",
            ProtocolEvent::Mute(_) => "chat.mute",
            ProtocolEvent::Archive(_) => "chat.archive",
            ProtocolEvent::Pin(_) => "chat.pin",
            ProtocolEvent::GroupInfo(_) => "chat.group_info",
            ProtocolEvent::HistorySync(_) => "history.sync",
            ProtocolEvent::Connected { .. } => "session.connected",
            ProtocolEvent::Disconnected => "session.disconnected",
            ProtocolEvent::LoggedOut => "session.logged_out",
            ProtocolEvent::PairSuccess { .. } => "session.paired",
            ProtocolEvent::Unknown { .. } => "unknown",
        }
    }
}

/// Decoded content of a live message. Exactly one variant is expected per
/// protocol message; anything unrecognized decodes as `Unknown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageContent {
    Text { body: String },
    Media(MediaContent),
    Location { latitude: f64, longitude: f64, name: String },
    ContactCard { display_name: String, vcard: String },
    /// List/buttons/template interactions, collapsed to a display summary.
    Interactive { summary: String },
    Unknown,
}

#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub msg_id: String,
    pub chat_jid: Jid,
    pub sender_jid: Jid,
    pub from_me: bool,
    pub is_group: bool,
    /// Sender's self-assigned display name. Often empty.
    pub push_name: String,
    pub timestamp: DateTime<Utc>,
    pub content: MessageContent,
    /// Raw payload snapshot as received, for the forensic column.
    pub raw: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct UndecryptableEvent {
    pub msg_id: String,
    pub chat_jid: Jid,
    pub sender_jid: Jid,
    pub timestamp: DateTime<Utc>,
    /// Protocol-reported reason, e.g. "unavailable".
    pub reason: String,
}

/// Receipt type tag. Unrecognized tags are carried for logging and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptKind {
    Delivered,
    Read,
    ReadSelf,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ReceiptEvent {
    pub chat_jid: Jid,
    pub sender_jid: Jid,
    /// All message IDs covered by this receipt.
    pub msg_ids: Vec<String>,
    pub kind: ReceiptKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PresenceEvent {
    pub jid: Jid,
    pub available: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ChatPresenceEvent {
    pub chat_jid: Jid,
    pub sender_jid: Jid,
    /// True while the remote party is composing.
    pub composing: bool,
}

#[derive(Debug, Clone)]
pub struct ContactEvent {
    pub jid: Jid,
    pub full_name: String,
    pub push_name: String,
}

#[derive(Debug, Clone)]
pub struct PushNameEvent {
    pub jid: Jid,
    pub push_name: String,
}

#[derive(Debug, Clone)]
pub struct PictureEvent {
    pub jid: Jid,
    pub picture_id: String,
    pub removed: bool,
}

#[derive(Debug, Clone)]
pub struct MuteEvent {
    pub chat_jid: Jid,
    pub muted: bool,
    pub muted_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ArchiveEvent {
    pub chat_jid: Jid,
    pub archived: bool,
}

#[derive(Debug, Clone)]
pub struct PinEvent {
    pub chat_jid: Jid,
    pub pinned: bool,
}

#[derive(Debug, Clone)]
pub struct GroupInfoEvent {
    pub chat_jid: Jid,
    pub name: String,
}

/// Bulk history backfill delivered after (re)authentication.
#[derive(Debug, Clone)]
pub struct HistorySyncEvent {
    pub conversations: Vec<HistoricalConversation>,
}

#[derive(Debug, Clone)]
pub struct HistoricalConversation {
    pub chat_jid: Jid,
    pub name: String,
    pub messages: Vec<HistoricalMessage>,
}

/// One historical message, decoded once at the adapter boundary.
#[derive(Debug, Clone)]
pub struct HistoricalMessage {
    pub msg_id: String,
    pub from_me: bool,
    /// Sender inside a group; absent for individual chats and own messages.
    pub participant: Option<Jid>,
    /// Embedded epoch timestamp; absent records default to now.
    pub timestamp: Option<DateTime<Utc>>,
    /// Numeric provider status code (1=sent, 2=delivered, 3/4=read).
    pub status_code: Option<i64>,
    pub content: MessageContent,
    pub raw: Option<serde_json::Value>,
}

/// Events on the dedicated QR pairing channel.
#[derive(Debug, Clone)]
pub enum QrEvent {
    /// A fresh QR payload. The provider rotates codes every ~20s.
    Code { code: String },
    /// Scan accepted; pairing complete.
    Success { device_jid: String },
    /// Provider-side timeout of the pairing window.
    Timeout,
    Error { message: String },
}
