//! Idempotent message ledger with forward-only receipt status.

use super::{fmt_ts, parse_ts, Store};
use async_trait::async_trait;
use chrono::Utc;
use zapgate_core::jid::Jid;
use zapgate_core::message::{Direction, Message, MessageKind, MessageStatus};
use zapgate_core::traits::MessageRepository;
use zapgate_core::{GatewayError, Result};

type MessageRow = (
    String,         // session_id
    String,         // msg_id
    String,         // chat_jid
    String,         // sender_jid
    String,         // direction
    String,         // msg_type
    String,         // content
    String,         // status
    String,         // timestamp
    Option<String>, // media_path
    Option<String>, // media_mime
    Option<i64>,    // media_size
    Option<String>, // raw_payload
);

const MESSAGE_COLS: &str = "session_id, msg_id, chat_jid, sender_jid, direction, msg_type, \
                            content, status, timestamp, media_path, media_mime, media_size, \
                            raw_payload";

fn from_row(row: MessageRow) -> Result<Message> {
    let raw_payload = row
        .12
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| GatewayError::Storage(format!("bad raw_payload: {e}")))?;
    Ok(Message {
        session_id: row.0,
        msg_id: row.1,
        chat_jid: Jid::parse(&row.2)?,
        sender_jid: Jid::parse(&row.3)?,
        direction: Direction::from_db(&row.4),
        kind: MessageKind::from_db(&row.5),
        content: row.6,
        status: MessageStatus::from_db(&row.7),
        timestamp: parse_ts(&row.8)?,
        media_path: row.9,
        media_mime: row.10,
        media_size: row.11,
        raw_payload,
    })
}

#[async_trait]
impl MessageRepository for Store {
    async fn insert(&self, message: &Message) -> Result<bool> {
        let raw_payload = message
            .raw_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| GatewayError::Storage(format!("serialize raw_payload failed: {e}")))?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO messages (session_id, msg_id, chat_jid, sender_jid, \
             direction, msg_type, content, status, timestamp, media_path, media_mime, \
             media_size, raw_payload, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.session_id)
        .bind(&message.msg_id)
        .bind(message.chat_jid.as_str())
        .bind(message.sender_jid.as_str())
        .bind(message.direction.as_str())
        .bind(message.kind.as_str())
        .bind(&message.content)
        .bind(message.status.as_str())
        .bind(fmt_ts(&message.timestamp))
        .bind(&message.media_path)
        .bind(&message.media_mime)
        .bind(message.media_size)
        .bind(raw_payload)
        .bind(fmt_ts(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("message insert failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, session_id: &str, msg_id: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE session_id = ? AND msg_id = ?",
        )
        .bind(session_id)
        .bind(msg_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("message exists check failed: {e}")))?;
        Ok(count.0 > 0)
    }

    async fn get(&self, session_id: &str, msg_id: &str) -> Result<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLS} FROM messages WHERE session_id = ? AND msg_id = ?"
        ))
        .bind(session_id)
        .bind(msg_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("message get failed: {e}")))?;
        row.map(from_row).transpose()
    }

    async fn update_status(
        &self,
        session_id: &str,
        msg_id: &str,
        status: MessageStatus,
    ) -> Result<()> {
        // Rank guard lives inside the UPDATE so an out-of-order receipt is a
        // no-op without a read-modify-write race.
        sqlx::query(
            "UPDATE messages SET status = ? \
             WHERE session_id = ? AND msg_id = ? \
             AND (CASE status WHEN 'sent' THEN 1 WHEN 'delivered' THEN 2 \
                  WHEN 'read' THEN 3 ELSE 0 END) < ?",
        )
        .bind(status.as_str())
        .bind(session_id)
        .bind(msg_id)
        .bind(status.rank())
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("status update failed: {e}")))?;
        Ok(())
    }

    async fn set_media(
        &self,
        session_id: &str,
        msg_id: &str,
        path: &str,
        mime_type: &str,
        size: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE messages SET media_path = ?, media_mime = ?, media_size = ? \
             WHERE session_id = ? AND msg_id = ?",
        )
        .bind(path)
        .bind(mime_type)
        .bind(size)
        .bind(session_id)
        .bind(msg_id)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("media update failed: {e}")))?;
        Ok(())
    }

    async fn has_media(&self, session_id: &str, msg_id: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages \
             WHERE session_id = ? AND msg_id = ? AND media_path IS NOT NULL",
        )
        .bind(session_id)
        .bind(msg_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("media check failed: {e}")))?;
        Ok(count.0 > 0)
    }

    async fn list_for_chat(
        &self,
        session_id: &str,
        chat_jid: &Jid,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLS} FROM messages \
             WHERE session_id = ? AND chat_jid = ? \
             ORDER BY timestamp DESC LIMIT ?"
        ))
        .bind(session_id)
        .bind(chat_jid.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("message list failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }
}
