//! History-sync backfill batches.

use super::{content_summary, EventIngestor};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use zapgate_core::chat::ChatKind;
use zapgate_core::event::{HistorySyncEvent, MessageContent};
use zapgate_core::jid::Jid;
use zapgate_core::message::{Direction, Message, MessageStatus};
use zapgate_core::session::Session;
use zapgate_core::traits::ProtocolClient;
use zapgate_core::Result;

impl EventIngestor {
    /// Backfill one history-sync batch. Each message is processed in
    /// isolation; a bad record is skipped, never the whole batch. Backfilled
    /// messages never touch unread counters — they were part of the account
    /// before the gateway saw it.
    pub(crate) async fn handle_history_sync(
        &self,
        session: &Session,
        client: &Arc<dyn ProtocolClient>,
        ev: HistorySyncEvent,
    ) -> Result<()> {
        let conversations = ev.conversations.len();
        let mut stored = 0usize;
        let mut skipped = 0usize;

        for conv in &ev.conversations {
            let chat_kind = if conv.chat_jid.is_group() {
                ChatKind::Group
            } else {
                ChatKind::Individual
            };

            for hmsg in &conv.messages {
                if hmsg.msg_id.is_empty() {
                    skipped += 1;
                    continue;
                }
                match self
                    .backfill_message(session, client, &conv.chat_jid, chat_kind, &conv.name, hmsg)
                    .await
                {
                    Ok(true) => stored += 1,
                    Ok(false) => skipped += 1,
                    Err(e) => {
                        skipped += 1;
                        warn!(
                            "Session {}: history message {} failed: {e}",
                            session.id, hmsg.msg_id
                        );
                    }
                }
            }
        }

        info!(
            "Session {}: history sync applied ({conversations} chats, {stored} stored, \
             {skipped} skipped)",
            session.id
        );

        self.notify(
            session,
            "history.sync",
            json!({
                "conversations": conversations,
                "stored": stored,
                "skipped": skipped,
            }),
        )
        .await;

        Ok(())
    }

    async fn backfill_message(
        &self,
        session: &Session,
        client: &Arc<dyn ProtocolClient>,
        chat_jid: &Jid,
        chat_kind: ChatKind,
        chat_name: &str,
        hmsg: &zapgate_core::event::HistoricalMessage,
    ) -> Result<bool> {
        if self.messages.exists(&session.id, &hmsg.msg_id).await? {
            return Ok(false);
        }

        let direction = if hmsg.from_me {
            Direction::Outbound
        } else {
            Direction::Inbound
        };
        let sender_jid = hmsg
            .participant
            .clone()
            .unwrap_or_else(|| chat_jid.clone());
        let timestamp = hmsg.timestamp.unwrap_or_else(chrono::Utc::now);
        let status = hmsg
            .status_code
            .map(MessageStatus::from_history_code)
            .unwrap_or(MessageStatus::Sent);
        let (kind, content) = content_summary(&hmsg.content);

        let message = Message {
            session_id: session.id.clone(),
            msg_id: hmsg.msg_id.clone(),
            chat_jid: chat_jid.clone(),
            sender_jid,
            direction,
            kind,
            content,
            status,
            timestamp,
            media_path: None,
            media_mime: None,
            media_size: None,
            raw_payload: hmsg.raw.clone(),
        };

        if !self.messages.insert(&message).await? {
            return Ok(false);
        }

        if let Err(e) = self
            .chats
            .apply_message(&session.id, chat_jid, chat_kind, chat_name, timestamp, false)
            .await
        {
            warn!("Session {}: chat update failed: {e}", session.id);
        }

        if let MessageContent::Media(mc) = &hmsg.content {
            self.media
                .process_historical(
                    &session.id,
                    client,
                    chat_jid,
                    direction,
                    &hmsg.msg_id,
                    timestamp,
                    mc,
                )
                .await;
        }

        Ok(true)
    }
}
