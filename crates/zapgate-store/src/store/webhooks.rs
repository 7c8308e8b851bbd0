//! Outbound webhook delivery queue and stats.

use super::{fmt_ts, fmt_ts_opt, parse_ts, parse_ts_opt, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use zapgate_core::traits::WebhookRepository;
use zapgate_core::webhook::{DeliveryStats, WebhookEvent, WebhookStatus};
use zapgate_core::{GatewayError, Result};

type WebhookRow = (
    String,         // id
    String,         // session_id
    String,         // event_type
    String,         // url
    String,         // payload
    String,         // status
    i64,            // attempts
    i64,            // max_attempts
    Option<String>, // next_retry_at
    Option<String>, // last_error
    Option<i64>,    // http_status
    Option<String>, // response_body
    Option<i64>,    // last_latency_ms
    Option<String>, // delivered_at
    String,         // created_at
    String,         // updated_at
);

const WEBHOOK_COLS: &str = "id, session_id, event_type, url, payload, status, attempts, \
                            max_attempts, next_retry_at, last_error, http_status, \
                            response_body, last_latency_ms, delivered_at, created_at, updated_at";

fn from_row(row: WebhookRow) -> Result<WebhookEvent> {
    let payload = serde_json::from_str(&row.4)
        .map_err(|e| GatewayError::Storage(format!("bad webhook payload: {e}")))?;
    Ok(WebhookEvent {
        id: row.0,
        session_id: row.1,
        event_type: row.2,
        url: row.3,
        payload,
        status: WebhookStatus::from_db(&row.5),
        attempts: row.6,
        max_attempts: row.7,
        next_retry_at: parse_ts_opt(row.8)?,
        last_error: row.9,
        http_status: row.10,
        response_body: row.11,
        last_latency_ms: row.12,
        delivered_at: parse_ts_opt(row.13)?,
        created_at: parse_ts(&row.14)?,
        updated_at: parse_ts(&row.15)?,
    })
}

#[async_trait]
impl WebhookRepository for Store {
    async fn enqueue(&self, event: &WebhookEvent) -> Result<()> {
        let payload = serde_json::to_string(&event.payload)
            .map_err(|e| GatewayError::Storage(format!("serialize payload failed: {e}")))?;
        sqlx::query(
            "INSERT INTO webhook_events (id, session_id, event_type, url, payload, status, \
             attempts, max_attempts, next_retry_at, last_error, http_status, response_body, \
             last_latency_ms, delivered_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.session_id)
        .bind(&event.event_type)
        .bind(&event.url)
        .bind(payload)
        .bind(event.status.as_str())
        .bind(event.attempts)
        .bind(event.max_attempts)
        .bind(fmt_ts_opt(&event.next_retry_at))
        .bind(&event.last_error)
        .bind(event.http_status)
        .bind(&event.response_body)
        .bind(event.last_latency_ms)
        .bind(fmt_ts_opt(&event.delivered_at))
        .bind(fmt_ts(&event.created_at))
        .bind(fmt_ts(&event.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("webhook enqueue failed: {e}")))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<WebhookEvent>> {
        let row: Option<WebhookRow> = sqlx::query_as(&format!(
            "SELECT {WEBHOOK_COLS} FROM webhook_events WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("webhook get failed: {e}")))?;
        row.map(from_row).transpose()
    }

    async fn record_attempt(&self, event: &WebhookEvent) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_events SET status = ?, attempts = ?, next_retry_at = ?, \
             last_error = ?, http_status = ?, response_body = ?, last_latency_ms = ?, \
             delivered_at = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(event.status.as_str())
        .bind(event.attempts)
        .bind(fmt_ts_opt(&event.next_retry_at))
        .bind(&event.last_error)
        .bind(event.http_status)
        .bind(&event.response_body)
        .bind(event.last_latency_ms)
        .bind(fmt_ts_opt(&event.delivered_at))
        .bind(fmt_ts(&Utc::now()))
        .bind(&event.id)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("webhook update failed: {e}")))?;
        Ok(())
    }

    async fn pending_events(&self, limit: i64) -> Result<Vec<WebhookEvent>> {
        let rows: Vec<WebhookRow> = sqlx::query_as(&format!(
            "SELECT {WEBHOOK_COLS} FROM webhook_events \
             WHERE status = 'pending' ORDER BY created_at LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("pending list failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }

    async fn retryable_events(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<WebhookEvent>> {
        let rows: Vec<WebhookRow> = sqlx::query_as(&format!(
            "SELECT {WEBHOOK_COLS} FROM webhook_events \
             WHERE status IN ('pending', 'retry') \
             AND attempts < max_attempts \
             AND (next_retry_at IS NULL OR next_retry_at <= ?) \
             ORDER BY created_at LIMIT ?"
        ))
        .bind(fmt_ts(&now))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("retryable list failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }

    async fn delivery_stats(
        &self,
        session_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<DeliveryStats> {
        let base = "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN status = 'sent' THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN status IN ('pending', 'retry') THEN 1 ELSE 0 END), 0), \
                    AVG(CASE WHEN status = 'sent' THEN last_latency_ms END) \
                    FROM webhook_events WHERE created_at >= ?";

        let row: (i64, i64, i64, i64, Option<f64>) = if let Some(sid) = session_id {
            sqlx::query_as(&format!("{base} AND session_id = ?"))
                .bind(fmt_ts(&since))
                .bind(sid)
                .fetch_one(&self.pool)
                .await
        } else {
            sqlx::query_as(base)
                .bind(fmt_ts(&since))
                .fetch_one(&self.pool)
                .await
        }
        .map_err(|e| GatewayError::Storage(format!("stats query failed: {e}")))?;

        let (total, sent, failed, pending, avg_latency) = row;
        Ok(DeliveryStats {
            total,
            sent,
            failed,
            pending,
            success_rate: if total > 0 {
                sent as f64 / total as f64
            } else {
                0.0
            },
            avg_latency_ms: avg_latency.unwrap_or(0.0),
        })
    }

    async fn cleanup_old(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM webhook_events \
             WHERE status IN ('sent', 'failed') AND created_at < ?",
        )
        .bind(fmt_ts(&older_than))
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("webhook cleanup failed: {e}")))?;
        Ok(result.rows_affected())
    }
}
