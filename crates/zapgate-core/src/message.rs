//! Message — the immutable ledger entry per protocol message.

use crate::jid::Jid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Traffic direction relative to the session's own device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "outbound" => Direction::Outbound,
            _ => Direction::Inbound,
        }
    }
}

/// Delivery status. Only ever moves forward: `Sent → Delivered → Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            _ => MessageStatus::Sent,
        }
    }

    /// Ordering rank used to keep status transitions monotonic.
    pub fn rank(&self) -> i64 {
        match self {
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
        }
    }

    /// Map a history-sync numeric status code.
    pub fn from_history_code(code: i64) -> Self {
        match code {
            1 => MessageStatus::Sent,
            2 => MessageStatus::Delivered,
            3 | 4 => MessageStatus::Read,
            _ => MessageStatus::Delivered,
        }
    }
}

/// Classified message content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Contact,
    Interactive,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
            MessageKind::Sticker => "sticker",
            MessageKind::Location => "location",
            MessageKind::Contact => "contact",
            MessageKind::Interactive => "interactive",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "video" => MessageKind::Video,
            "audio" => MessageKind::Audio,
            "document" => MessageKind::Document,
            "sticker" => MessageKind::Sticker,
            "location" => MessageKind::Location,
            "contact" => MessageKind::Contact,
            "interactive" => MessageKind::Interactive,
            _ => MessageKind::Text,
        }
    }

    /// Whether this kind carries a downloadable media payload.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            MessageKind::Image
                | MessageKind::Video
                | MessageKind::Audio
                | MessageKind::Document
                | MessageKind::Sticker
        )
    }
}

/// One stored message. `(session_id, msg_id)` is the natural key; ingestion
/// is idempotent against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub session_id: String,
    /// Provider-assigned message ID.
    pub msg_id: String,
    pub chat_jid: Jid,
    pub sender_jid: Jid,
    pub direction: Direction,
    pub kind: MessageKind,
    /// Text body or media caption.
    pub content: String,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    /// Object-storage path, set asynchronously by the media pipeline.
    pub media_path: Option<String>,
    pub media_mime: Option<String>,
    pub media_size: Option<i64>,
    /// Raw event snapshot for forensic replay.
    pub raw_payload: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_rank_is_monotonic() {
        assert!(MessageStatus::Sent.rank() < MessageStatus::Delivered.rank());
        assert!(MessageStatus::Delivered.rank() < MessageStatus::Read.rank());
    }

    #[test]
    fn test_history_code_mapping() {
        assert_eq!(MessageStatus::from_history_code(1), MessageStatus::Sent);
        assert_eq!(
            MessageStatus::from_history_code(2),
            MessageStatus::Delivered
        );
        assert_eq!(MessageStatus::from_history_code(3), MessageStatus::Read);
        assert_eq!(MessageStatus::from_history_code(4), MessageStatus::Read);
        // Anything else is treated as delivered.
        assert_eq!(
            MessageStatus::from_history_code(0),
            MessageStatus::Delivered
        );
        assert_eq!(
            MessageStatus::from_history_code(99),
            MessageStatus::Delivered
        );
    }

    #[test]
    fn test_media_kinds() {
        assert!(MessageKind::Image.is_media());
        assert!(MessageKind::Sticker.is_media());
        assert!(!MessageKind::Text.is_media());
        assert!(!MessageKind::Location.is_media());
    }
}
