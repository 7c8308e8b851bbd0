//! The dispatcher: enqueue, attempt, schedule retries, sweep.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zapgate_core::config::WebhookConfig;
use zapgate_core::session::Session;
use zapgate_core::traits::{EventNotifier, WebhookRepository};
use zapgate_core::webhook::{retry_delay, DeliveryStats, WebhookEvent, WebhookStatus};
use zapgate_core::{GatewayError, Result};

/// Response bodies are stored truncated; a webhook endpoint echoing a
/// megabyte of HTML must not bloat the queue table.
const RESPONSE_SNIPPET_CHARS: usize = 512;

pub struct WebhookDispatcher {
    repo: Arc<dyn WebhookRepository>,
    http: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookDispatcher {
    pub fn new(repo: Arc<dyn WebhookRepository>, config: WebhookConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Config(format!("http client build failed: {e}")))?;
        Ok(Self { repo, http, config })
    }

    /// Queue a notification for the session's webhook. Returns `None` when
    /// the session has no webhook URL or its subscription filter excludes
    /// this event type — nothing is persisted in that case.
    pub async fn enqueue(
        &self,
        session: &Session,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<Option<WebhookEvent>> {
        if session.webhook_url.is_empty() {
            return Ok(None);
        }
        if !session.wants_event(event_type) {
            debug!(
                "Session {}: event {event_type} filtered out by subscription",
                session.id
            );
            return Ok(None);
        }

        let now = Utc::now();
        let event = WebhookEvent {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            event_type: event_type.to_string(),
            url: session.webhook_url.clone(),
            payload,
            status: WebhookStatus::Pending,
            attempts: 0,
            max_attempts: self.config.max_attempts,
            next_retry_at: None,
            last_error: None,
            http_status: None,
            response_body: None,
            last_latency_ms: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };
        self.repo.enqueue(&event).await?;
        Ok(Some(event))
    }

    /// Enqueue and attempt delivery inline. The returned event carries the
    /// outcome of the attempt; a failed POST is not an `Err`.
    pub async fn send(
        &self,
        session: &Session,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<Option<WebhookEvent>> {
        let Some(mut event) = self.enqueue(session, event_type, payload).await? else {
            return Ok(None);
        };
        Self::attempt(&self.http, self.repo.as_ref(), &mut event).await;
        Ok(Some(event))
    }

    /// Enqueue, then attempt delivery on a detached task. The caller blocks
    /// only on the queue insert, never on the network — this is the variant
    /// the ingestion path uses.
    pub async fn send_async(
        &self,
        session: &Session,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let Some(mut event) = self.enqueue(session, event_type, payload).await? else {
            return Ok(());
        };
        let http = self.http.clone();
        let repo = Arc::clone(&self.repo);
        tokio::spawn(async move {
            Self::attempt(&http, repo.as_ref(), &mut event).await;
        });
        Ok(())
    }

    /// One delivery attempt. Mutates the event into its post-attempt state
    /// and persists it; all failures are captured on the event itself.
    async fn attempt(
        http: &reqwest::Client,
        repo: &dyn WebhookRepository,
        event: &mut WebhookEvent,
    ) {
        let envelope = json!({
            "id": event.id,
            "session_id": event.session_id,
            "type": event.event_type,
            "created_at": event.created_at.to_rfc3339(),
            "data": event.payload,
        });

        let started = Instant::now();
        let outcome = http.post(&event.url).json(&envelope).send().await;
        event.last_latency_ms = Some(started.elapsed().as_millis() as i64);

        match outcome {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                event.http_status = Some(i64::from(status.as_u16()));
                event.response_body = Some(snippet(&body));
                if status.is_success() {
                    event.status = WebhookStatus::Sent;
                    event.delivered_at = Some(Utc::now());
                    event.next_retry_at = None;
                    event.last_error = None;
                    debug!(
                        "Webhook {}: delivered {} in {}ms",
                        event.id,
                        event.event_type,
                        event.last_latency_ms.unwrap_or(0)
                    );
                } else {
                    schedule_retry(event, format!("endpoint returned {status}"));
                }
            }
            Err(e) => {
                event.http_status = None;
                event.response_body = None;
                schedule_retry(event, format!("request failed: {e}"));
            }
        }

        if let Err(e) = repo.record_attempt(event).await {
            warn!("Webhook {}: recording attempt failed: {e}", event.id);
        }
    }

    /// Sweep the queue once: attempt every event that is eligible and due.
    /// Events are processed independently; one bad endpoint never blocks the
    /// rest of the batch. Returns how many were delivered.
    pub async fn process_pending(&self) -> Result<usize> {
        let due = self
            .repo
            .retryable_events(Utc::now(), self.config.sweep_batch)
            .await?;
        if due.is_empty() {
            return Ok(0);
        }
        debug!("Webhook sweep: {} events due", due.len());

        let mut delivered = 0usize;
        for mut event in due {
            Self::attempt(&self.http, self.repo.as_ref(), &mut event).await;
            if event.status == WebhookStatus::Sent {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Periodic retry sweep, running until cancelled.
    pub async fn run_sweeper(self: Arc<Self>, cancel: CancellationToken) {
        let interval = self.config.sweep_interval();
        info!("Webhook sweeper running every {interval:?}");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            match self.process_pending().await {
                Ok(0) => {}
                Ok(n) => info!("Webhook sweep delivered {n} events"),
                Err(e) => warn!("Webhook sweep failed: {e}"),
            }
        }
        info!("Webhook sweeper stopped");
    }

    /// Delivery aggregates over a window, optionally scoped to one session.
    pub async fn stats(
        &self,
        session_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<DeliveryStats> {
        self.repo.delivery_stats(session_id, since).await
    }

    /// Retention pass: drop terminal events older than the configured
    /// retention window. Returns how many rows were removed.
    pub async fn cleanup_old_events(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(self.config.retention_days);
        let removed = self.repo.cleanup_old(cutoff).await?;
        if removed > 0 {
            info!("Webhook retention removed {removed} terminal events");
        }
        Ok(removed)
    }
}

/// Move a failed event to its next state. The backoff is computed from the
/// attempt count before this failure is added, so the schedule runs 30s,
/// 60s, 120s, then caps at 240s.
fn schedule_retry(event: &mut WebhookEvent, error: String) {
    let delay = retry_delay(event.attempts);
    event.attempts += 1;
    event.last_error = Some(error);

    if event.attempts >= event.max_attempts {
        event.status = WebhookStatus::Failed;
        event.next_retry_at = None;
        warn!(
            "Webhook {}: giving up on {} after {} attempts: {}",
            event.id,
            event.event_type,
            event.attempts,
            event.last_error.as_deref().unwrap_or("")
        );
    } else {
        event.status = WebhookStatus::Retry;
        event.next_retry_at = Some(Utc::now() + Duration::seconds(delay.as_secs() as i64));
        debug!(
            "Webhook {}: attempt {} failed, retrying in {delay:?}",
            event.id, event.attempts
        );
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(RESPONSE_SNIPPET_CHARS).collect()
}

#[async_trait]
impl EventNotifier for WebhookDispatcher {
    async fn notify(&self, session: &Session, event_type: &str, payload: serde_json::Value) {
        if let Err(e) = self.send_async(session, event_type, payload).await {
            warn!(
                "Session {}: webhook enqueue for {event_type} failed: {e}",
                session.id
            );
        }
    }
}
