//! Gateway facade — wires the store, session manager, ingestion pipeline,
//! and webhook dispatcher into one startable unit.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use zapgate_core::config::Config;
use zapgate_core::session::Session;
use zapgate_core::traits::{
    ChatRepository, ClientFactory, ContactRepository, MediaStore, MessageRepository,
    SessionRepository, WebhookRepository,
};
use zapgate_core::{GatewayError, Result};
use zapgate_session::ingest::EventIngestor;
use zapgate_session::{MediaPipeline, MessageSender, SessionManager, SessionRegistry, StartupReport};
use zapgate_store::{FsMediaStore, Store};
use zapgate_webhook::WebhookDispatcher;

/// The assembled gateway. [`Gateway::new`] wires every component,
/// [`Gateway::start`] brings background work up, and [`Gateway::shutdown`]
/// tears it all down. The protocol implementation is supplied by the
/// embedder as a [`ClientFactory`].
pub struct Gateway {
    config: Config,
    sessions: Arc<dyn SessionRepository>,
    messages: Arc<dyn MessageRepository>,
    chats: Arc<dyn ChatRepository>,
    contacts: Arc<dyn ContactRepository>,
    webhooks: Arc<dyn WebhookRepository>,
    manager: Arc<SessionManager>,
    sender: MessageSender,
    dispatcher: Arc<WebhookDispatcher>,
    cancel: CancellationToken,
}

impl Gateway {
    /// Build the full stack from configuration: open and migrate the
    /// database, prepare the media root, and wire sessions through
    /// ingestion to webhooks. Nothing connects yet — that is
    /// [`Gateway::start`]'s job.
    pub async fn new(config: Config, factory: Arc<dyn ClientFactory>) -> Result<Self> {
        let store = Arc::new(Store::new(&config.database).await?);
        let media_store: Arc<dyn MediaStore> = Arc::new(FsMediaStore::new(&config.media)?);

        let sessions: Arc<dyn SessionRepository> = store.clone();
        let messages: Arc<dyn MessageRepository> = store.clone();
        let chats: Arc<dyn ChatRepository> = store.clone();
        let contacts: Arc<dyn ContactRepository> = store.clone();
        let webhooks: Arc<dyn WebhookRepository> = store.clone();

        let dispatcher = Arc::new(WebhookDispatcher::new(
            webhooks.clone(),
            config.webhook.clone(),
        )?);
        let pipeline = Arc::new(MediaPipeline::new(
            messages.clone(),
            media_store,
            &config.media,
            config.session.history_media_cutoff_days,
        )?);
        let ingestor = EventIngestor::new(
            messages.clone(),
            chats.clone(),
            contacts.clone(),
            pipeline.clone(),
            dispatcher.clone(),
        );
        let manager = Arc::new(SessionManager::new(
            sessions.clone(),
            Arc::new(SessionRegistry::new()),
            factory,
            ingestor,
            config.session.clone(),
        ));
        let sender = MessageSender::new(
            manager.registry().clone(),
            sessions.clone(),
            messages.clone(),
            chats.clone(),
            pipeline,
        );

        Ok(Self {
            config,
            sessions,
            messages,
            chats,
            contacts,
            webhooks,
            manager,
            sender,
            dispatcher,
            cancel: CancellationToken::new(),
        })
    }

    /// Bring background work up: the webhook retry sweeper, then
    /// reconnection of every previously bound session.
    pub async fn start(&self) -> Result<StartupReport> {
        info!("Gateway {} starting", self.config.gateway.name);
        tokio::spawn(
            self.dispatcher
                .clone()
                .run_sweeper(self.cancel.child_token()),
        );
        self.manager.connect_on_startup().await
    }

    /// Stop background tasks and disconnect every live session.
    pub async fn shutdown(&self) {
        info!("Gateway {} shutting down", self.config.gateway.name);
        self.cancel.cancel();
        self.manager.shutdown().await;
    }

    /// Create a session. The name is the operator-facing handle and must
    /// be unique; the returned row carries the generated id.
    pub async fn create_session(&self, name: &str) -> Result<Session> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::InvalidInput(
                "session name is empty".to_string(),
            ));
        }
        if self.sessions.get_by_name(name).await?.is_some() {
            return Err(GatewayError::AlreadyExists(format!("session name {name:?}")));
        }
        let session = Session::new(&uuid::Uuid::new_v4().to_string(), name);
        self.sessions.create(&session).await?;
        info!("Created session {} ({name})", session.id);
        Ok(session)
    }

    /// Delete a session, tearing down its live connection first. Messages,
    /// chats, and contacts stored for the session go with it.
    pub async fn remove_session(&self, session_id: &str) -> Result<()> {
        self.manager.teardown(session_id).await?;
        self.sessions.delete(session_id).await?;
        info!("Removed session {session_id}");
        Ok(())
    }

    /// Point the session's webhook at `url`, delivering only the listed
    /// event kinds (an empty list means everything).
    pub async fn set_webhook(&self, session_id: &str, url: &str, events: &[String]) -> Result<()> {
        self.sessions.set_webhook(session_id, url, events).await
    }

    /// The pending QR payload for a pairing session as `(raw code, PNG
    /// data URI)`, or `None` when no pairing is in progress.
    pub async fn qr_code(&self, session_id: &str) -> Result<Option<(String, String)>> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("session {session_id}")))?;
        Ok(session.qr_code.zip(session.qr_png))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connection lifecycle: connect, disconnect, logout, status.
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Outbound messaging and chat state changes.
    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    pub fn dispatcher(&self) -> &Arc<WebhookDispatcher> {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &Arc<dyn SessionRepository> {
        &self.sessions
    }

    pub fn messages(&self) -> &Arc<dyn MessageRepository> {
        &self.messages
    }

    pub fn chats(&self) -> &Arc<dyn ChatRepository> {
        &self.chats
    }

    pub fn contacts(&self) -> &Arc<dyn ContactRepository> {
        &self.contacts
    }

    pub fn webhooks(&self) -> &Arc<dyn WebhookRepository> {
        &self.webhooks
    }
}
