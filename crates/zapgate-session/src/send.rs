//! Outbound messaging: validate, dispatch, mirror into the ledger.
//!
//! Validation happens before any provider I/O, so a bad recipient or an
//! oversized payload never costs an upload. The ledger write after a
//! successful send is best-effort — the provider accepted the message, and
//! that result is returned even when the local mirror fails.

use crate::media::MediaPipeline;
use crate::registry::SessionRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use zapgate_core::chat::ChatKind;
use zapgate_core::jid::Jid;
use zapgate_core::media::{validate_media, MediaKind};
use zapgate_core::message::{Direction, Message, MessageStatus};
use zapgate_core::outbound::{OutboundContent, SendResult};
use zapgate_core::session::Session;
use zapgate_core::traits::{ChatRepository, MessageRepository, SessionRepository};
use zapgate_core::{GatewayError, Result};

pub struct MessageSender {
    registry: Arc<SessionRegistry>,
    sessions: Arc<dyn SessionRepository>,
    messages: Arc<dyn MessageRepository>,
    chats: Arc<dyn ChatRepository>,
    media: Arc<MediaPipeline>,
}

impl MessageSender {
    pub fn new(
        registry: Arc<SessionRegistry>,
        sessions: Arc<dyn SessionRepository>,
        messages: Arc<dyn MessageRepository>,
        chats: Arc<dyn ChatRepository>,
        media: Arc<MediaPipeline>,
    ) -> Self {
        Self {
            registry,
            sessions,
            messages,
            chats,
            media,
        }
    }

    pub async fn send_text(&self, session_id: &str, to: &str, body: &str) -> Result<SendResult> {
        if body.trim().is_empty() {
            return Err(GatewayError::InvalidInput(
                "message body is empty".to_string(),
            ));
        }
        let jid = Jid::normalize(to)?;
        let session = self.require(session_id).await?;
        let client = self.registry.connected_client(session_id)?;

        let content = OutboundContent::Text {
            body: body.to_string(),
        };
        let result = client.send_message(&jid, &content).await?;
        debug!("Session {session_id}: sent text {} to {jid}", result.msg_id);

        self.record_outbound(&session, &jid, &content, &result).await;
        Ok(result)
    }

    /// Upload the payload to the provider, send the referencing message,
    /// then mirror the bytes into the local object store.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_media(
        &self,
        session_id: &str,
        to: &str,
        kind: MediaKind,
        data: Vec<u8>,
        mime_type: &str,
        caption: &str,
        file_name: &str,
        ptt: bool,
    ) -> Result<SendResult> {
        validate_media(kind, mime_type, data.len())?;
        let jid = Jid::normalize(to)?;
        let session = self.require(session_id).await?;
        let client = self.registry.connected_client(session_id)?;

        let upload = client.upload(data.clone(), kind).await?;
        let content = OutboundContent::Media {
            kind,
            upload,
            mime_type: mime_type.to_string(),
            caption: caption.to_string(),
            file_name: file_name.to_string(),
            ptt,
        };
        let result = client.send_message(&jid, &content).await?;
        debug!(
            "Session {session_id}: sent {} {} to {jid}",
            kind.as_str(),
            result.msg_id
        );

        self.record_outbound(&session, &jid, &content, &result).await;
        self.media
            .store_outbound(session_id, &jid, &result.msg_id, kind, mime_type, &data)
            .await;
        Ok(result)
    }

    pub async fn send_image(
        &self,
        session_id: &str,
        to: &str,
        data: Vec<u8>,
        mime_type: &str,
        caption: &str,
    ) -> Result<SendResult> {
        self.send_media(
            session_id,
            to,
            MediaKind::Image,
            data,
            mime_type,
            caption,
            "",
            false,
        )
        .await
    }

    /// `voice_note` marks the message as push-to-talk, which renders as a
    /// voice bubble instead of an audio file.
    pub async fn send_audio(
        &self,
        session_id: &str,
        to: &str,
        data: Vec<u8>,
        mime_type: &str,
        voice_note: bool,
    ) -> Result<SendResult> {
        self.send_media(
            session_id,
            to,
            MediaKind::Audio,
            data,
            mime_type,
            "",
            "",
            voice_note,
        )
        .await
    }

    pub async fn send_video(
        &self,
        session_id: &str,
        to: &str,
        data: Vec<u8>,
        mime_type: &str,
        caption: &str,
    ) -> Result<SendResult> {
        self.send_media(
            session_id,
            to,
            MediaKind::Video,
            data,
            mime_type,
            caption,
            "",
            false,
        )
        .await
    }

    pub async fn send_document(
        &self,
        session_id: &str,
        to: &str,
        data: Vec<u8>,
        mime_type: &str,
        file_name: &str,
    ) -> Result<SendResult> {
        if file_name.is_empty() {
            return Err(GatewayError::InvalidInput(
                "document file name is empty".to_string(),
            ));
        }
        self.send_media(
            session_id,
            to,
            MediaKind::Document,
            data,
            mime_type,
            "",
            file_name,
            false,
        )
        .await
    }

    pub async fn send_sticker(
        &self,
        session_id: &str,
        to: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<SendResult> {
        self.send_media(
            session_id,
            to,
            MediaKind::Sticker,
            data,
            mime_type,
            "",
            "",
            false,
        )
        .await
    }

    pub async fn mark_chat_read(&self, session_id: &str, chat: &str) -> Result<()> {
        let jid = Jid::normalize(chat)?;
        self.chats.mark_read(session_id, &jid).await
    }

    pub async fn set_chat_muted(
        &self,
        session_id: &str,
        chat: &str,
        muted: bool,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let jid = Jid::normalize(chat)?;
        self.chats.set_muted(session_id, &jid, muted, until).await
    }

    pub async fn set_chat_pinned(&self, session_id: &str, chat: &str, pinned: bool) -> Result<()> {
        let jid = Jid::normalize(chat)?;
        self.chats.set_pinned(session_id, &jid, pinned).await
    }

    pub async fn set_chat_archived(
        &self,
        session_id: &str,
        chat: &str,
        archived: bool,
    ) -> Result<()> {
        let jid = Jid::normalize(chat)?;
        self.chats.set_archived(session_id, &jid, archived).await
    }

    async fn require(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("session {session_id}")))
    }

    /// Mirror a sent message into the ledger and fold it into the chat
    /// projection. Failures are logged, not surfaced — the send happened.
    async fn record_outbound(
        &self,
        session: &Session,
        to: &Jid,
        content: &OutboundContent,
        result: &SendResult,
    ) {
        let sender_jid = match Jid::parse(&session.device_jid) {
            Ok(jid) => jid,
            Err(e) => {
                warn!(
                    "Session {}: cannot record outbound {}: {e}",
                    session.id, result.msg_id
                );
                return;
            }
        };
        let message = Message {
            session_id: session.id.clone(),
            msg_id: result.msg_id.clone(),
            chat_jid: to.clone(),
            sender_jid,
            direction: Direction::Outbound,
            kind: content.message_kind(),
            content: content.ledger_content(),
            status: MessageStatus::Sent,
            timestamp: result.timestamp,
            media_path: None,
            media_mime: None,
            media_size: None,
            raw_payload: None,
        };
        if let Err(e) = self.messages.insert(&message).await {
            warn!(
                "Session {}: outbound ledger write for {} failed: {e}",
                session.id, result.msg_id
            );
        }
        let kind = if to.is_group() {
            ChatKind::Group
        } else {
            ChatKind::Individual
        };
        if let Err(e) = self
            .chats
            .apply_message(&session.id, to, kind, "", result.timestamp, false)
            .await
        {
            warn!(
                "Session {}: chat projection for outbound {} failed: {e}",
                session.id, result.msg_id
            );
        }
    }
}
