//! Presence, contact, and chat-state updates.

use super::EventIngestor;
use serde_json::json;
use tracing::warn;
use zapgate_core::chat::ContactPatch;
use zapgate_core::event::{
    ArchiveEvent, ChatPresenceEvent, ContactEvent, GroupInfoEvent, MuteEvent, PictureEvent,
    PinEvent, PresenceEvent, PushNameEvent,
};
use zapgate_core::session::Session;
use zapgate_core::Result;

impl EventIngestor {
    pub(crate) async fn handle_presence(&self, session: &Session, ev: PresenceEvent) -> Result<()> {
        if ev.last_seen.is_some() {
            let patch = ContactPatch {
                last_seen_at: ev.last_seen,
                ..Default::default()
            };
            if let Err(e) = self.contacts.upsert(&session.id, &ev.jid, &patch).await {
                warn!("Session {}: presence update failed: {e}", session.id);
            }
        }
        self.notify(
            session,
            "presence.update",
            json!({
                "jid": ev.jid,
                "available": ev.available,
                "last_seen": ev.last_seen.map(|t| t.to_rfc3339()),
            }),
        )
        .await;
        Ok(())
    }

    /// Typing indicators are ephemeral — forwarded, never persisted.
    pub(crate) async fn handle_chat_presence(
        &self,
        session: &Session,
        ev: ChatPresenceEvent,
    ) -> Result<()> {
        self.notify(
            session,
            "presence.chat",
            json!({
                "chat_jid": ev.chat_jid,
                "sender_jid": ev.sender_jid,
                "composing": ev.composing,
            }),
        )
        .await;
        Ok(())
    }

    pub(crate) async fn handle_contact(&self, session: &Session, ev: ContactEvent) -> Result<()> {
        let patch = ContactPatch {
            push_name: (!ev.push_name.is_empty()).then(|| ev.push_name.clone()),
            full_name: (!ev.full_name.is_empty()).then(|| ev.full_name.clone()),
            ..Default::default()
        };
        if !patch.is_empty() {
            if let Err(e) = self.contacts.upsert(&session.id, &ev.jid, &patch).await {
                warn!("Session {}: contact update failed: {e}", session.id);
            }
        }
        self.notify(
            session,
            "contact.update",
            json!({
                "jid": ev.jid,
                "full_name": ev.full_name,
                "push_name": ev.push_name,
            }),
        )
        .await;
        Ok(())
    }

    pub(crate) async fn handle_push_name(
        &self,
        session: &Session,
        ev: PushNameEvent,
    ) -> Result<()> {
        if !ev.push_name.is_empty() {
            let patch = ContactPatch {
                push_name: Some(ev.push_name.clone()),
                ..Default::default()
            };
            if let Err(e) = self.contacts.upsert(&session.id, &ev.jid, &patch).await {
                warn!("Session {}: push name update failed: {e}", session.id);
            }
        }
        self.notify(
            session,
            "contact.push_name",
            json!({ "jid": ev.jid, "push_name": ev.push_name }),
        )
        .await;
        Ok(())
    }

    pub(crate) async fn handle_picture(&self, session: &Session, ev: PictureEvent) -> Result<()> {
        // Only a new picture id is recorded; a removal keeps the last known
        // id, consistent with partial-update semantics elsewhere.
        if !ev.removed && !ev.picture_id.is_empty() {
            let patch = ContactPatch {
                picture_id: Some(ev.picture_id.clone()),
                ..Default::default()
            };
            if let Err(e) = self.contacts.upsert(&session.id, &ev.jid, &patch).await {
                warn!("Session {}: picture update failed: {e}", session.id);
            }
        }
        self.notify(
            session,
            "contact.picture",
            json!({
                "jid": ev.jid,
                "picture_id": ev.picture_id,
                "removed": ev.removed,
            }),
        )
        .await;
        Ok(())
    }

    pub(crate) async fn handle_mute(&self, session: &Session, ev: MuteEvent) -> Result<()> {
        if let Err(e) = self
            .chats
            .set_muted(&session.id, &ev.chat_jid, ev.muted, ev.muted_until)
            .await
        {
            warn!("Session {}: mute update failed: {e}", session.id);
        }
        self.notify(
            session,
            "chat.mute",
            json!({
                "chat_jid": ev.chat_jid,
                "muted": ev.muted,
                "muted_until": ev.muted_until.map(|t| t.to_rfc3339()),
            }),
        )
        .await;
        Ok(())
    }

    pub(crate) async fn handle_archive(&self, session: &Session, ev: ArchiveEvent) -> Result<()> {
        if let Err(e) = self
            .chats
            .set_archived(&session.id, &ev.chat_jid, ev.archived)
            .await
        {
            warn!("Session {}: archive update failed: {e}", session.id);
        }
        self.notify(
            session,
            "chat.archive",
            json!({ "chat_jid": ev.chat_jid, "archived": ev.archived }),
        )
        .await;
        Ok(())
    }

    pub(crate) async fn handle_pin(&self, session: &Session, ev: PinEvent) -> Result<()> {
        if let Err(e) = self
            .chats
            .set_pinned(&session.id, &ev.chat_jid, ev.pinned)
            .await
        {
            warn!("Session {}: pin update failed: {e}", session.id);
        }
        self.notify(
            session,
            "chat.pin",
            json!({ "chat_jid": ev.chat_jid, "pinned": ev.pinned }),
        )
        .await;
        Ok(())
    }

    pub(crate) async fn handle_group_info(
        &self,
        session: &Session,
        ev: GroupInfoEvent,
    ) -> Result<()> {
        if !ev.name.is_empty() {
            if let Err(e) = self.chats.rename(&session.id, &ev.chat_jid, &ev.name).await {
                warn!("Session {}: group rename failed: {e}", session.id);
            }
        }
        self.notify(
            session,
            "chat.group_info",
            json!({ "chat_jid": ev.chat_jid, "name": ev.name }),
        )
        .await;
        Ok(())
    }
}
