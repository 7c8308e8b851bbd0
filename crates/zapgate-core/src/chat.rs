//! Chat and Contact — per-session projections built from the event stream.

use crate::jid::Jid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Individual,
    Group,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Individual => "individual",
            ChatKind::Group => "group",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "group" => ChatKind::Group,
            _ => ChatKind::Individual,
        }
    }
}

/// Per-(session, remote party) conversation projection.
///
/// Counters only ever increase, except `unread_count` which is zeroed by
/// mark-as-read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub session_id: String,
    pub jid: Jid,
    pub kind: ChatKind,
    pub name: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: i64,
    pub unread_count: i64,
    pub muted: bool,
    pub muted_until: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub archived: bool,
    pub metadata: serde_json::Value,
}

/// Per-(session, JID) identity projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub session_id: String,
    pub jid: Jid,
    pub push_name: String,
    pub full_name: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub picture_id: String,
    pub metadata: serde_json::Value,
}

/// Partial update for a Contact. Only populated fields are written, so a
/// sparse event can never blank out data we learned earlier.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub push_name: Option<String>,
    pub full_name: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub picture_id: Option<String>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.push_name.is_none()
            && self.full_name.is_none()
            && self.last_seen_at.is_none()
            && self.picture_id.is_none()
    }
}
