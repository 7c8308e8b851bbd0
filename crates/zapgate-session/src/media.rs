//! Media pipeline: download, store, and record media objects.
//!
//! Media is always secondary to the message row: every failure in here is
//! logged and swallowed so a broken blob never loses a message.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use zapgate_core::config::MediaConfig;
use zapgate_core::jid::Jid;
use zapgate_core::media::{extension_from_mime, MediaContent, MediaKind};
use zapgate_core::message::Direction;
use zapgate_core::traits::{MediaPlacement, MediaStore, MessageRepository, ProtocolClient};
use zapgate_core::{GatewayError, Result};

pub struct MediaPipeline {
    messages: Arc<dyn MessageRepository>,
    store: Arc<dyn MediaStore>,
    http: reqwest::Client,
    /// History messages older than this many days skip media download.
    cutoff_days: i64,
}

impl MediaPipeline {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        store: Arc<dyn MediaStore>,
        config: &MediaConfig,
        cutoff_days: i64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            messages,
            store,
            http,
            cutoff_days,
        })
    }

    /// Resolve media for a live message. The client still holds the
    /// decryption context, so this is the typed download path.
    pub async fn process_live(
        &self,
        session_id: &str,
        client: &Arc<dyn ProtocolClient>,
        chat_jid: &Jid,
        direction: Direction,
        msg_id: &str,
        content: &MediaContent,
    ) {
        match self.already_resolved(session_id, msg_id).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(_) => return,
        }

        let data = match client.download(content).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Session {session_id}: media download for {msg_id} failed: {e}");
                return;
            }
        };

        if let Err(e) = self
            .store_and_record(session_id, chat_jid, direction, msg_id, content, &data)
            .await
        {
            warn!("Session {session_id}: media store for {msg_id} failed: {e}");
        }
    }

    /// Resolve media for a history-sync message. Stale messages are skipped
    /// outright; the rest go through the cryptographic-metadata download,
    /// with a degraded plain-URL fetch as the last resort.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_historical(
        &self,
        session_id: &str,
        client: &Arc<dyn ProtocolClient>,
        chat_jid: &Jid,
        direction: Direction,
        msg_id: &str,
        timestamp: DateTime<Utc>,
        content: &MediaContent,
    ) {
        if Utc::now() - timestamp > Duration::days(self.cutoff_days) {
            debug!("Session {session_id}: history media for {msg_id} past cutoff, skipped");
            return;
        }
        match self.already_resolved(session_id, msg_id).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(_) => return,
        }

        let data = match self.download_historical(session_id, client, msg_id, content).await {
            Some(data) => data,
            None => return,
        };

        if let Err(e) = self
            .store_and_record(session_id, chat_jid, direction, msg_id, content, &data)
            .await
        {
            warn!("Session {session_id}: media store for {msg_id} failed: {e}");
        }
    }

    /// Mirror an outbound media payload into the object store.
    pub async fn store_outbound(
        &self,
        session_id: &str,
        chat_jid: &Jid,
        msg_id: &str,
        kind: MediaKind,
        mime_type: &str,
        data: &[u8],
    ) {
        let extension = extension_from_mime(mime_type, kind);
        if let Err(e) = self
            .upload_and_record(
                session_id,
                chat_jid,
                Direction::Outbound,
                msg_id,
                mime_type,
                &extension,
                data,
            )
            .await
        {
            warn!("Session {session_id}: outbound media mirror for {msg_id} failed: {e}");
        }
    }

    async fn already_resolved(&self, session_id: &str, msg_id: &str) -> Result<bool> {
        match self.messages.has_media(session_id, msg_id).await {
            Ok(resolved) => Ok(resolved),
            Err(e) => {
                warn!("Session {session_id}: media check for {msg_id} failed: {e}");
                Err(e)
            }
        }
    }

    async fn download_historical(
        &self,
        session_id: &str,
        client: &Arc<dyn ProtocolClient>,
        msg_id: &str,
        content: &MediaContent,
    ) -> Option<Vec<u8>> {
        let mref = &content.media_ref;
        if mref.has_crypto_metadata() {
            let result = client
                .download_by_path(
                    mref.direct_path.as_deref().unwrap_or(""),
                    mref.media_key.as_deref().unwrap_or(&[]),
                    mref.file_enc_sha256.as_deref().unwrap_or(&[]),
                    mref.file_sha256.as_deref().unwrap_or(&[]),
                    mref.file_length.unwrap_or(0),
                    content.kind,
                )
                .await;
            match result {
                Ok(data) => return Some(data),
                Err(e) => {
                    warn!("Session {session_id}: history media download for {msg_id} failed: {e}");
                }
            }
        }

        // Degraded path: fetch whatever the direct URL serves. No decryption
        // metadata, so the object may be the raw encrypted blob.
        let url = mref.url.as_deref()?;
        warn!("Session {session_id}: degraded direct-URL media fetch for {msg_id}");
        match self.fetch_url(url).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Session {session_id}: direct-URL fetch for {msg_id} failed: {e}");
                None
            }
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::Media(format!("fetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| GatewayError::Media(format!("fetch failed: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Media(format!("fetch body failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn store_and_record(
        &self,
        session_id: &str,
        chat_jid: &Jid,
        direction: Direction,
        msg_id: &str,
        content: &MediaContent,
        data: &[u8],
    ) -> Result<()> {
        let extension = extension_from_mime(&content.mime_type, content.kind);
        self.upload_and_record(
            session_id,
            chat_jid,
            direction,
            msg_id,
            &content.mime_type,
            &extension,
            data,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_and_record(
        &self,
        session_id: &str,
        chat_jid: &Jid,
        direction: Direction,
        msg_id: &str,
        mime_type: &str,
        extension: &str,
        data: &[u8],
    ) -> Result<()> {
        let placement = MediaPlacement {
            session_id,
            chat_jid,
            direction,
            message_id: msg_id,
            content_type: mime_type,
            extension,
        };
        let path = self.store.upload(data, &placement).await?;
        self.messages
            .set_media(session_id, msg_id, &path, mime_type, data.len() as i64)
            .await?;
        debug!("Session {session_id}: media for {msg_id} stored at {path}");
        Ok(())
    }
}
