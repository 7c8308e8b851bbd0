//! Event ingestion: persists the protocol event stream.
//!
//! Split into focused submodules:
//! - `message` — live message persistence and its side effects
//! - `receipt` — delivery/read receipt application
//! - `history` — history-sync backfill batches
//! - `state` — presence, contact, and chat-state updates
//!
//! Every handler follows the same contract: the primary write decides
//! success, secondary projections are best-effort, and one bad event never
//! stops the pump.

mod history;
mod message;
mod receipt;
mod state;

use crate::media::MediaPipeline;
use std::sync::Arc;
use zapgate_core::event::MessageContent;
use zapgate_core::message::MessageKind;
use zapgate_core::session::Session;
use zapgate_core::traits::{
    ChatRepository, ContactRepository, EventNotifier, MessageRepository,
};

pub struct EventIngestor {
    pub(crate) messages: Arc<dyn MessageRepository>,
    pub(crate) chats: Arc<dyn ChatRepository>,
    pub(crate) contacts: Arc<dyn ContactRepository>,
    pub(crate) media: Arc<MediaPipeline>,
    pub(crate) notifier: Arc<dyn EventNotifier>,
}

impl EventIngestor {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        chats: Arc<dyn ChatRepository>,
        contacts: Arc<dyn ContactRepository>,
        media: Arc<MediaPipeline>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            messages,
            chats,
            contacts,
            media,
            notifier,
        }
    }

    /// Fan an event out to the webhook queue.
    pub(crate) async fn notify(
        &self,
        session: &Session,
        event_type: &str,
        payload: serde_json::Value,
    ) {
        self.notifier.notify(session, event_type, payload).await;
    }
}

/// Reduce decoded content to the (kind, ledger text) pair stored on the
/// message row.
pub(crate) fn content_summary(content: &MessageContent) -> (MessageKind, String) {
    match content {
        MessageContent::Text { body } => (MessageKind::Text, body.clone()),
        MessageContent::Media(mc) => {
            let text = if !mc.caption.is_empty() {
                mc.caption.clone()
            } else {
                mc.file_name.clone()
            };
            (mc.kind.message_kind(), text)
        }
        MessageContent::Location {
            latitude,
            longitude,
            name,
        } => {
            let text = if name.is_empty() {
                format!("{latitude},{longitude}")
            } else {
                format!("{latitude},{longitude} ({name})")
            };
            (MessageKind::Location, text)
        }
        MessageContent::ContactCard { display_name, .. } => {
            (MessageKind::Contact, display_name.clone())
        }
        MessageContent::Interactive { summary } => (MessageKind::Interactive, summary.clone()),
        // Unrecognized content still gets a ledger row; the raw payload
        // preserves whatever it was.
        MessageContent::Unknown => (MessageKind::Text, String::new()),
    }
}
