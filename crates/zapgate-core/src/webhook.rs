//! WebhookEvent — a durable delivery intent with its retry state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery state machine:
/// `Pending → Sent`, or `Pending → Retry → … → Sent | Failed`.
/// `Sent` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    Pending,
    Sent,
    Failed,
    Retry,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::Pending => "pending",
            WebhookStatus::Sent => "sent",
            WebhookStatus::Failed => "failed",
            WebhookStatus::Retry => "retry",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "sent" => WebhookStatus::Sent,
            "failed" => WebhookStatus::Failed,
            "retry" => WebhookStatus::Retry,
            _ => WebhookStatus::Pending,
        }
    }
}

/// One notification queued for delivery to a tenant webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub session_id: String,
    /// Kind string, e.g. "message" or "session.disconnected".
    pub event_type: String,
    pub url: String,
    pub payload: serde_json::Value,
    pub status: WebhookStatus,
    /// Completed delivery attempts so far.
    pub attempts: i64,
    pub max_attempts: i64,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub http_status: Option<i64>,
    /// Truncated response body snapshot from the last attempt.
    pub response_body: Option<String>,
    pub last_latency_ms: Option<i64>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Whether another attempt is permitted at all.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
            && matches!(self.status, WebhookStatus::Pending | WebhookStatus::Retry)
    }

    /// Whether the event is due now. Eligibility (`can_retry`) is separate:
    /// an event can be eligible but still waiting out its backoff.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.can_retry() && self.next_retry_at.map_or(true, |at| at <= now)
    }
}

/// Backoff before the attempt after `attempts` completed failures:
/// `min(2^attempts, 8) × 30s` — 30s, 60s, 120s, then capped at 240s.
pub fn retry_delay(attempts: i64) -> Duration {
    let factor = 2u64
        .checked_pow(attempts.clamp(0, 32) as u32)
        .unwrap_or(u64::MAX)
        .min(8);
    Duration::from_secs(factor * 30)
}

/// Read-side aggregation over a delivery window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
    /// Sent over total, 0.0 when the window is empty.
    pub success_rate: f64,
    /// Mean latency of successful deliveries in the window, milliseconds.
    pub avg_latency_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(retry_delay(0), Duration::from_secs(30));
        assert_eq!(retry_delay(1), Duration::from_secs(60));
        assert_eq!(retry_delay(2), Duration::from_secs(120));
        assert_eq!(retry_delay(3), Duration::from_secs(240));
        // Capped from here on.
        assert_eq!(retry_delay(4), Duration::from_secs(240));
        assert_eq!(retry_delay(40), Duration::from_secs(240));
    }

    fn event(status: WebhookStatus, attempts: i64) -> WebhookEvent {
        WebhookEvent {
            id: "w1".into(),
            session_id: "s1".into(),
            event_type: "message".into(),
            url: "https://example.com/hook".into(),
            payload: serde_json::json!({}),
            status,
            attempts,
            max_attempts: 3,
            next_retry_at: None,
            last_error: None,
            http_status: None,
            response_body: None,
            last_latency_ms: None,
            delivered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_retry_eligibility() {
        assert!(event(WebhookStatus::Pending, 0).can_retry());
        assert!(event(WebhookStatus::Retry, 2).can_retry());
        // Attempt ceiling.
        assert!(!event(WebhookStatus::Retry, 3).can_retry());
        // Terminal states.
        assert!(!event(WebhookStatus::Sent, 0).can_retry());
        assert!(!event(WebhookStatus::Failed, 1).can_retry());
    }

    #[test]
    fn test_readiness_respects_backoff() {
        let now = Utc::now();
        let mut ev = event(WebhookStatus::Retry, 1);
        assert!(ev.is_ready(now), "no schedule means ready");
        ev.next_retry_at = Some(now + chrono::Duration::seconds(60));
        assert!(!ev.is_ready(now));
        ev.next_retry_at = Some(now - chrono::Duration::seconds(1));
        assert!(ev.is_ready(now));
    }
}
