//! Outbound message construction.

use crate::media::MediaKind;
use crate::message::MessageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a protocol upload, referenced by outbound media messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUpload {
    pub url: String,
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub file_enc_sha256: Vec<u8>,
    pub file_sha256: Vec<u8>,
    pub file_length: u64,
}

/// What to send. Media variants carry the upload handle, not raw bytes —
/// the sender uploads first, then dispatches the reference.
#[derive(Debug, Clone)]
pub enum OutboundContent {
    Text {
        body: String,
    },
    Media {
        kind: MediaKind,
        upload: MediaUpload,
        mime_type: String,
        caption: String,
        /// Set for documents.
        file_name: String,
        /// Push-to-talk flag for voice notes.
        ptt: bool,
    },
}

impl OutboundContent {
    pub fn message_kind(&self) -> MessageKind {
        match self {
            OutboundContent::Text { .. } => MessageKind::Text,
            OutboundContent::Media { kind, .. } => kind.message_kind(),
        }
    }

    /// Text stored in the message ledger for this content.
    pub fn ledger_content(&self) -> String {
        match self {
            OutboundContent::Text { body } => body.clone(),
            OutboundContent::Media {
                caption, file_name, ..
            } => {
                if !caption.is_empty() {
                    caption.clone()
                } else {
                    file_name.clone()
                }
            }
        }
    }
}

/// Returned by a successful protocol send.
#[derive(Debug, Clone)]
pub struct SendResult {
    /// Provider-assigned message ID.
    pub msg_id: String,
    pub timestamp: DateTime<Utc>,
}
