//! Routes protocol events to their ingestion handlers.

use crate::ingest::EventIngestor;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use zapgate_core::event::ProtocolEvent;
use zapgate_core::session::Session;
use zapgate_core::traits::ProtocolClient;

/// What the pump should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Transport reported itself gone; tear the session down.
    Disconnect,
    /// Device unlinked remotely; tear down and drop the binding.
    LoggedOut,
}

/// Dispatch one event. Handler failures are logged here — one bad event
/// never stops the pump.
pub async fn dispatch(
    ingestor: &EventIngestor,
    session: &Session,
    client: &Arc<dyn ProtocolClient>,
    event: ProtocolEvent,
) -> Flow {
    let kind = event.kind();
    let result = match event {
        ProtocolEvent::Message(ev) => ingestor.handle_message(session, client, ev).await,
        ProtocolEvent::Undecryptable(ev) => ingestor.handle_undecryptable(session, ev).await,
        ProtocolEvent::Receipt(ev) => ingestor.handle_receipt(session, ev).await,
        ProtocolEvent::Presence(ev) => ingestor.handle_presence(session, ev).await,
        ProtocolEvent::ChatPresence(ev) => ingestor.handle_chat_presence(session, ev).await,
        ProtocolEvent::Contact(ev) => ingestor.handle_contact(session, ev).await,
        ProtocolEvent::PushName(ev) => ingestor.handle_push_name(session, ev).await,
        ProtocolEvent::Picture(ev) => ingestor.handle_picture(session, ev).await,
        ProtocolEvent::Mute(ev) => ingestor.handle_mute(session, ev).await,
        ProtocolEvent::Archive(ev) => ingestor.handle_archive(session, ev).await,
        ProtocolEvent::Pin(ev) => ingestor.handle_pin(session, ev).await,
        ProtocolEvent::GroupInfo(ev) => ingestor.handle_group_info(session, ev).await,
        ProtocolEvent::HistorySync(ev) => {
            ingestor.handle_history_sync(session, client, ev).await
        }
        ProtocolEvent::Connected { device_jid } => {
            ingestor
                .notify(session, kind, json!({ "device_jid": device_jid }))
                .await;
            Ok(())
        }
        ProtocolEvent::PairSuccess { device_jid } => {
            ingestor
                .notify(session, kind, json!({ "device_jid": device_jid }))
                .await;
            Ok(())
        }
        ProtocolEvent::Disconnected => {
            ingestor.notify(session, kind, json!({})).await;
            return Flow::Disconnect;
        }
        ProtocolEvent::LoggedOut => {
            ingestor.notify(session, kind, json!({})).await;
            return Flow::LoggedOut;
        }
        ProtocolEvent::Unknown { kind } => {
            debug!("Session {}: unhandled event kind {kind:?}", session.id);
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Session {}: {kind} handler failed: {e}", session.id);
    }
    Flow::Continue
}
