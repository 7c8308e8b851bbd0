//! Session — the tenant-scoped connection identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection lifecycle status.
///
/// `Disconnected → Connecting → {QrPending → Connected} | Connected`;
/// the resume path skips `QrPending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    QrPending,
    Connected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::QrPending => "qr_pending",
            SessionStatus::Connected => "connected",
        }
    }

    /// Parse a stored status string. Unknown values read as `Disconnected`
    /// so a schema drift never wedges a session row.
    pub fn from_db(s: &str) -> Self {
        match s {
            "connecting" => SessionStatus::Connecting,
            "qr_pending" => SessionStatus::QrPending,
            "connected" => SessionStatus::Connected,
            _ => SessionStatus::Disconnected,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant session. One row per managed WhatsApp device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Human label, unique per deployment.
    pub name: String,
    /// Bound device identifier. Empty until first successful pairing;
    /// cleared again on logout.
    pub device_jid: String,
    pub status: SessionStatus,
    /// Last raw QR payload while pairing is in progress.
    pub qr_code: Option<String>,
    /// Rendered QR as a `data:image/png;base64,` URI, kept alongside the raw
    /// payload so API consumers can display it without re-encoding.
    pub qr_png: Option<String>,
    /// Target URL for webhook notifications. Empty disables delivery.
    pub webhook_url: String,
    /// Event kinds this session subscribes to. Empty means all.
    pub webhook_events: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh unpaired session row.
    pub fn new(id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
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

    /// Whether this session has completed pairing at least once.
    pub fn is_bound(&self) -> bool {
        !self.device_jid.is_empty()
    }

    /// Whether a notification of `event_type` should be delivered to this
    /// session's webhook.
    pub fn wants_event(&self, event_type: &str) -> bool {
        self.webhook_events.is_empty()
            || self.webhook_events.iter().any(|e| e == event_type)
    }
}
