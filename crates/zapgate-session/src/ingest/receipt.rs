//! Delivery/read receipt application.

use super::EventIngestor;
use serde_json::json;
use tracing::{debug, warn};
use zapgate_core::event::{ReceiptEvent, ReceiptKind};
use zapgate_core::message::MessageStatus;
use zapgate_core::session::Session;
use zapgate_core::Result;

fn receipt_kind_str(kind: &ReceiptKind) -> &str {
    match kind {
        ReceiptKind::Delivered => "delivered",
        ReceiptKind::Read => "read",
        ReceiptKind::ReadSelf => "read-self",
        ReceiptKind::Other(s) => s.as_str(),
    }
}

impl EventIngestor {
    /// Apply one receipt to every message it covers. Receipts for unknown
    /// message ids are no-ops, and a failure on one id never blocks the rest
    /// of the batch.
    pub(crate) async fn handle_receipt(&self, session: &Session, ev: ReceiptEvent) -> Result<()> {
        let status = match &ev.kind {
            ReceiptKind::Delivered => Some(MessageStatus::Delivered),
            ReceiptKind::Read | ReceiptKind::ReadSelf => Some(MessageStatus::Read),
            ReceiptKind::Other(kind) => {
                debug!("Session {}: ignoring receipt kind {kind:?}", session.id);
                None
            }
        };

        if let Some(status) = status {
            for msg_id in &ev.msg_ids {
                if let Err(e) = self.messages.update_status(&session.id, msg_id, status).await {
                    warn!(
                        "Session {}: receipt update for {msg_id} failed: {e}",
                        session.id
                    );
                }
            }
        }

        self.notify(
            session,
            "receipt.update",
            json!({
                "chat_jid": ev.chat_jid,
                "sender_jid": ev.sender_jid,
                "msg_ids": ev.msg_ids,
                "receipt": receipt_kind_str(&ev.kind),
                "timestamp": ev.timestamp.to_rfc3339(),
            }),
        )
        .await;

        Ok(())
    }
}
