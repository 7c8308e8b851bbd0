//! Live message persistence and its side effects.

use super::{content_summary, EventIngestor};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use zapgate_core::chat::{ChatKind, ContactPatch};
use zapgate_core::event::{MessageContent, MessageEvent, UndecryptableEvent};
use zapgate_core::message::{Direction, Message, MessageKind, MessageStatus};
use zapgate_core::session::Session;
use zapgate_core::traits::ProtocolClient;
use zapgate_core::Result;

impl EventIngestor {
    /// Persist one live message. The insert is the commit point: a replayed
    /// `(session, msg_id)` stops here and produces no side effects.
    pub(crate) async fn handle_message(
        &self,
        session: &Session,
        client: &Arc<dyn ProtocolClient>,
        ev: MessageEvent,
    ) -> Result<()> {
        let direction = if ev.from_me {
            Direction::Outbound
        } else {
            Direction::Inbound
        };
        let (kind, content) = content_summary(&ev.content);

        let message = Message {
            session_id: session.id.clone(),
            msg_id: ev.msg_id.clone(),
            chat_jid: ev.chat_jid.clone(),
            sender_jid: ev.sender_jid.clone(),
            direction,
            kind,
            content,
            status: MessageStatus::Sent,
            timestamp: ev.timestamp,
            media_path: None,
            media_mime: None,
            media_size: None,
            raw_payload: ev.raw.clone(),
        };

        if !self.messages.insert(&message).await? {
            debug!(
                "Session {}: duplicate message {} ignored",
                session.id, ev.msg_id
            );
            return Ok(());
        }

        // Chat projection. Inbound messages bump the unread counter; our own
        // echoes never do.
        let chat_kind = if ev.is_group {
            ChatKind::Group
        } else {
            ChatKind::Individual
        };
        let chat_name = if !ev.is_group && direction == Direction::Inbound {
            ev.push_name.as_str()
        } else {
            ""
        };
        if let Err(e) = self
            .chats
            .apply_message(
                &session.id,
                &ev.chat_jid,
                chat_kind,
                chat_name,
                ev.timestamp,
                direction == Direction::Inbound,
            )
            .await
        {
            warn!("Session {}: chat update failed: {e}", session.id);
        }

        if direction == Direction::Inbound && !ev.push_name.is_empty() {
            let patch = ContactPatch {
                push_name: Some(ev.push_name.clone()),
                ..Default::default()
            };
            if let Err(e) = self.contacts.upsert(&session.id, &ev.sender_jid, &patch).await {
                warn!("Session {}: contact update failed: {e}", session.id);
            }
        }

        if let MessageContent::Media(mc) = &ev.content {
            self.media
                .process_live(&session.id, client, &ev.chat_jid, direction, &ev.msg_id, mc)
                .await;
        }

        self.notify(
            session,
            "message",
            json!({
                "msg_id": ev.msg_id,
                "chat_jid": ev.chat_jid,
                "sender_jid": ev.sender_jid,
                "direction": message.direction.as_str(),
                "type": message.kind.as_str(),
                "content": message.content,
                "timestamp": ev.timestamp.to_rfc3339(),
                "is_group": ev.is_group,
                "push_name": ev.push_name,
            }),
        )
        .await;

        Ok(())
    }

    /// A message that arrived but could not be decrypted. A placeholder row
    /// keeps the ledger complete; there is nothing to extract media from.
    pub(crate) async fn handle_undecryptable(
        &self,
        session: &Session,
        ev: UndecryptableEvent,
    ) -> Result<()> {
        warn!(
            "Session {}: undecryptable message {} from {} ({})",
            session.id, ev.msg_id, ev.sender_jid, ev.reason
        );

        let reason = if ev.reason.is_empty() {
            "unknown"
        } else {
            ev.reason.as_str()
        };
        let message = Message {
            session_id: session.id.clone(),
            msg_id: ev.msg_id.clone(),
            chat_jid: ev.chat_jid.clone(),
            sender_jid: ev.sender_jid.clone(),
            direction: Direction::Inbound,
            kind: MessageKind::Text,
            content: format!("[undecryptable message: {reason}]"),
            status: MessageStatus::Sent,
            timestamp: ev.timestamp,
            media_path: None,
            media_mime: None,
            media_size: None,
            raw_payload: None,
        };
        if !self.messages.insert(&message).await? {
            debug!(
                "Session {}: duplicate undecryptable {} ignored",
                session.id, ev.msg_id
            );
            return Ok(());
        }

        self.notify(
            session,
            "message.undecryptable",
            json!({
                "msg_id": ev.msg_id,
                "chat_jid": ev.chat_jid,
                "sender_jid": ev.sender_jid,
                "timestamp": ev.timestamp.to_rfc3339(),
                "reason": ev.reason,
            }),
        )
        .await;
        Ok(())
    }
}
