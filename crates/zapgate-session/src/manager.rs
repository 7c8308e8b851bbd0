//! Session lifecycle: connect, pairing, logout, teardown.

use crate::ingest::EventIngestor;
use crate::qr;
use crate::registry::{Phase, SessionRegistry};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zapgate_core::config::SessionConfig;
use zapgate_core::session::{Session, SessionStatus};
use zapgate_core::traits::{ClientFactory, SessionRepository};
use zapgate_core::{GatewayError, Result};

/// Outcome of the startup reconnection sweep.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub attempted: usize,
    pub connected: usize,
    pub failed: Vec<(String, String)>,
}

pub struct SessionManager {
    pub(crate) sessions: Arc<dyn SessionRepository>,
    pub(crate) registry: Arc<SessionRegistry>,
    factory: Arc<dyn ClientFactory>,
    pub(crate) ingestor: EventIngestor,
    pub(crate) config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        registry: Arc<SessionRegistry>,
        factory: Arc<dyn ClientFactory>,
        ingestor: EventIngestor,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions,
            registry,
            factory,
            ingestor,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Establish the session's connection. For a bound session this resumes
    /// the stored credential; otherwise it drives QR pairing and resolves
    /// once the code is scanned or the window expires.
    ///
    /// Holds the registry claim for the whole attempt, so a second connect
    /// for the same session fails immediately with `AlreadyConnected`.
    pub async fn connect(self: &Arc<Self>, session_id: &str) -> Result<Session> {
        let session = self.require(session_id).await?;
        let cancel = self.registry.claim(session_id)?;
        info!("Session {session_id}: connecting");

        match self.establish(&session, cancel).await {
            Ok(session) => Ok(session),
            Err(e) => {
                // Roll the half-built attempt back before surfacing the error.
                if let Err(te) = self.teardown(session_id).await {
                    warn!("Session {session_id}: rollback teardown failed: {te}");
                }
                Err(e)
            }
        }
    }

    async fn establish(
        self: &Arc<Self>,
        session: &Session,
        cancel: CancellationToken,
    ) -> Result<Session> {
        let id = &session.id;
        self.sessions
            .update_status(id, SessionStatus::Connecting)
            .await?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Resume the stored credential when bound; a failed resume falls
        // back to fresh pairing rather than wedging the session.
        let (client, pairing) = if session.is_bound() {
            match self
                .factory
                .resume(id, &session.device_jid, events_tx.clone())
                .await
            {
                Ok(client) => (client, false),
                Err(e) => {
                    warn!("Session {id}: resume failed ({e}), falling back to fresh pairing");
                    (self.factory.fresh(id, events_tx.clone()).await?, true)
                }
            }
        } else {
            (self.factory.fresh(id, events_tx.clone()).await?, true)
        };

        self.registry.attach_client(id, client.clone())?;

        // The QR stream must exist before connect so no code is lost.
        let qr_rx = if pairing {
            Some(client.qr_channel().await?)
        } else {
            None
        };

        tokio::select! {
            result = client.connect() => result?,
            _ = cancel.cancelled() => {
                return Err(GatewayError::Protocol("connect cancelled".to_string()));
            }
        }

        let device_jid = if let Some(qr_rx) = qr_rx {
            self.registry.set_phase(id, Phase::QrPending)?;
            self.sessions
                .update_status(id, SessionStatus::QrPending)
                .await?;
            let device_jid = qr::wait_for_pairing(
                id,
                self.sessions.as_ref(),
                qr_rx,
                self.config.qr_timeout(),
                &cancel,
            )
            .await?;
            self.sessions.update_device_jid(id, &device_jid).await?;
            self.sessions.clear_qr(id).await?;
            device_jid
        } else {
            // Give a resumed transport a moment to settle, then verify it.
            tokio::select! {
                _ = tokio::time::sleep(self.config.resume_settle()) => {}
                _ = cancel.cancelled() => {
                    return Err(GatewayError::Protocol("connect cancelled".to_string()));
                }
            }
            if !client.is_connected() {
                return Err(GatewayError::Protocol(
                    "connection did not settle".to_string(),
                ));
            }
            session.device_jid.clone()
        };

        self.registry.set_phase(id, Phase::Connected)?;
        self.sessions
            .update_status(id, SessionStatus::Connected)
            .await?;

        // Re-read so the snapshot handed to the pump carries the binding.
        let connected = self.require(id).await?;
        self.spawn_session_tasks(connected.clone(), client, events_rx, cancel);
        info!("Session {id}: connected as {device_jid}");
        Ok(connected)
    }

    pub async fn disconnect(&self, session_id: &str) -> Result<()> {
        self.require(session_id).await?;
        info!("Session {session_id}: disconnecting");
        self.teardown(session_id).await
    }

    /// Unlink the device. Best-effort on the provider side, then the local
    /// binding is dropped so the next connect starts a fresh pairing.
    pub async fn logout(&self, session_id: &str) -> Result<()> {
        self.require(session_id).await?;
        if let Some(client) = self.registry.client(session_id) {
            if let Err(e) = client.logout().await {
                warn!("Session {session_id}: provider logout failed: {e}");
            }
        }
        self.teardown(session_id).await?;
        self.sessions.update_device_jid(session_id, "").await?;
        info!("Session {session_id}: logged out, device unbound");
        Ok(())
    }

    /// Request a phone-number link code for a session that is mid-pairing.
    pub async fn pair_phone(&self, session_id: &str, phone: &str) -> Result<String> {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 7 {
            return Err(GatewayError::InvalidInput(format!(
                "phone number too short: {phone:?}"
            )));
        }
        let client = self
            .registry
            .client(session_id)
            .ok_or_else(|| GatewayError::NotConnected(session_id.to_string()))?;
        let code = client.pair_phone(&digits).await?;
        info!("Session {session_id}: phone link code issued");
        Ok(code)
    }

    /// Session snapshot with the live status. The registry is the truth for
    /// status — the persisted row can claim `connected` after a crash.
    pub async fn status(&self, session_id: &str) -> Result<Session> {
        let mut session = self.require(session_id).await?;
        session.status = self.registry.status(session_id);
        Ok(session)
    }

    /// Tear a session down. Every step tolerates the previous one having
    /// already happened, so concurrent disconnects and supervisor-triggered
    /// teardowns converge on the same end state.
    pub async fn teardown(&self, session_id: &str) -> Result<()> {
        if let Some((client, cancel)) = self.registry.take(session_id) {
            cancel.cancel();
            if let Some(client) = client {
                client.disconnect().await;
            }
        }
        self.sessions.clear_qr(session_id).await?;
        self.sessions
            .update_status(session_id, SessionStatus::Disconnected)
            .await?;
        Ok(())
    }

    /// Reconnect every bound session in parallel, staggered by a random
    /// jitter so a fleet restart does not stampede the provider.
    pub async fn connect_on_startup(self: &Arc<Self>) -> Result<StartupReport> {
        if !self.config.reconnect_on_startup {
            return Ok(StartupReport::default());
        }
        let bound = self.sessions.bound_sessions().await?;
        if bound.is_empty() {
            return Ok(StartupReport::default());
        }
        info!("Reconnecting {} bound session(s)", bound.len());

        let max_jitter = self.config.startup_max_jitter_ms;
        let mut handles = Vec::with_capacity(bound.len());
        for session in bound {
            let manager = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                let jitter = if max_jitter > 0 {
                    rand::thread_rng().gen_range(0..=max_jitter)
                } else {
                    0
                };
                tokio::time::sleep(Duration::from_millis(jitter)).await;
                let result = manager.connect(&session.id).await;
                (session.id, result)
            }));
        }

        let mut report = StartupReport {
            attempted: handles.len(),
            ..Default::default()
        };
        for handle in handles {
            match handle.await {
                Ok((_, Ok(_))) => report.connected += 1,
                Ok((id, Err(e))) => {
                    warn!("Session {id}: startup reconnect failed: {e}");
                    report.failed.push((id, e.to_string()));
                }
                Err(e) => warn!("Startup reconnect task panicked: {e}"),
            }
        }
        info!(
            "Startup reconnect finished: {}/{} connected",
            report.connected, report.attempted
        );
        Ok(report)
    }

    /// Tear down every live session. Used on process shutdown.
    pub async fn shutdown(&self) {
        for session_id in self.registry.live_sessions() {
            if let Err(e) = self.teardown(&session_id).await {
                warn!("Session {session_id}: shutdown teardown failed: {e}");
            }
        }
    }

    pub(crate) async fn require(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("session {session_id}")))
    }
}
