//! Per-session background tasks: the event pump and the health watch.
//!
//! Both tasks share the session's cancellation token. Teardown cancels it,
//! so either task ending the session also stops the other one.

use crate::manager::SessionManager;
use crate::router::{self, Flow};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zapgate_core::event::ProtocolEvent;
use zapgate_core::session::Session;
use zapgate_core::traits::ProtocolClient;

impl SessionManager {
    pub(crate) fn spawn_session_tasks(
        self: &Arc<Self>,
        session: Session,
        client: Arc<dyn ProtocolClient>,
        events: UnboundedReceiver<ProtocolEvent>,
        cancel: CancellationToken,
    ) {
        let session_id = session.id.clone();
        let pump = Arc::clone(self);
        tokio::spawn(pump.pump_events(session, Arc::clone(&client), events, cancel.clone()));
        let watch = Arc::clone(self);
        tokio::spawn(watch.watch_health(session_id, client, cancel));
    }

    /// Drain protocol events until the stream closes, the token is
    /// cancelled, or the router signals the end of the connection.
    async fn pump_events(
        self: Arc<Self>,
        session: Session,
        client: Arc<dyn ProtocolClient>,
        mut events: UnboundedReceiver<ProtocolEvent>,
        cancel: CancellationToken,
    ) {
        let session_id = session.id.clone();
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                // Producer dropped the channel: the client is gone.
                warn!("Session {session_id}: event stream closed");
                if let Err(e) = self.teardown(&session_id).await {
                    warn!("Session {session_id}: teardown failed: {e}");
                }
                break;
            };
            match router::dispatch(&self.ingestor, &session, &client, event).await {
                Flow::Continue => {}
                Flow::Disconnect => {
                    info!("Session {session_id}: provider closed the connection");
                    if let Err(e) = self.teardown(&session_id).await {
                        warn!("Session {session_id}: teardown failed: {e}");
                    }
                    break;
                }
                Flow::LoggedOut => {
                    info!("Session {session_id}: logged out by the provider");
                    if let Err(e) = self.teardown(&session_id).await {
                        warn!("Session {session_id}: teardown failed: {e}");
                    }
                    // The credential is dead; drop the binding so the next
                    // connect starts a fresh pairing.
                    if let Err(e) = self.sessions.update_device_jid(&session_id, "").await {
                        warn!("Session {session_id}: failed to unbind device: {e}");
                    }
                    break;
                }
            }
        }
    }

    /// Periodically verify the transport is still up; tear the session down
    /// when it silently dies so its status never lies.
    async fn watch_health(
        self: Arc<Self>,
        session_id: String,
        client: Arc<dyn ProtocolClient>,
        cancel: CancellationToken,
    ) {
        let interval = self.config.health_interval();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if !client.is_connected() {
                warn!("Session {session_id}: transport lost, tearing down");
                if let Err(e) = self.teardown(&session_id).await {
                    warn!("Session {session_id}: teardown failed: {e}");
                }
                break;
            }
        }
    }
}
