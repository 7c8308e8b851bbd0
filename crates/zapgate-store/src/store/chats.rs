//! Chat projection: counters, naming, mute/pin/archive flags.

use super::{fmt_ts, fmt_ts_opt, parse_ts_opt, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use zapgate_core::chat::{Chat, ChatKind};
use zapgate_core::jid::Jid;
use zapgate_core::traits::ChatRepository;
use zapgate_core::{GatewayError, Result};

type ChatRow = (
    String,         // session_id
    String,         // jid
    String,         // chat_type
    String,         // name
    Option<String>, // last_message_at
    i64,            // message_count
    i64,            // unread_count
    i64,            // muted
    Option<String>, // muted_until
    i64,            // pinned
    i64,            // archived
    String,         // metadata
);

const CHAT_COLS: &str = "session_id, jid, chat_type, name, last_message_at, message_count, \
                         unread_count, muted, muted_until, pinned, archived, metadata";

fn from_row(row: ChatRow) -> Result<Chat> {
    let metadata = serde_json::from_str(&row.11)
        .map_err(|e| GatewayError::Storage(format!("bad chat metadata: {e}")))?;
    Ok(Chat {
        session_id: row.0,
        jid: Jid::parse(&row.1)?,
        kind: ChatKind::from_db(&row.2),
        name: row.3,
        last_message_at: parse_ts_opt(row.4)?,
        message_count: row.5,
        unread_count: row.6,
        muted: row.7 != 0,
        muted_until: parse_ts_opt(row.8)?,
        pinned: row.9 != 0,
        archived: row.10 != 0,
        metadata,
    })
}

#[async_trait]
impl ChatRepository for Store {
    async fn apply_message(
        &self,
        session_id: &str,
        jid: &Jid,
        kind: ChatKind,
        name: &str,
        at: DateTime<Utc>,
        count_unread: bool,
    ) -> Result<()> {
        let now = fmt_ts(&Utc::now());
        // Single upsert: history backfill can deliver messages out of order,
        // so last_message_at only moves forward and the first non-empty name
        // sticks.
        sqlx::query(
            "INSERT INTO chats (session_id, jid, chat_type, name, last_message_at, \
             message_count, unread_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?) \
             ON CONFLICT(session_id, jid) DO UPDATE SET \
               message_count = message_count + 1, \
               unread_count = unread_count + excluded.unread_count, \
               last_message_at = CASE \
                 WHEN last_message_at IS NULL OR excluded.last_message_at > last_message_at \
                 THEN excluded.last_message_at ELSE last_message_at END, \
               name = CASE WHEN name = '' THEN excluded.name ELSE name END, \
               updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(jid.as_str())
        .bind(kind.as_str())
        .bind(name)
        .bind(fmt_ts(&at))
        .bind(i64::from(count_unread))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("chat upsert failed: {e}")))?;
        Ok(())
    }

    async fn get(&self, session_id: &str, jid: &Jid) -> Result<Option<Chat>> {
        let row: Option<ChatRow> = sqlx::query_as(&format!(
            "SELECT {CHAT_COLS} FROM chats WHERE session_id = ? AND jid = ?"
        ))
        .bind(session_id)
        .bind(jid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("chat get failed: {e}")))?;
        row.map(from_row).transpose()
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Chat>> {
        let rows: Vec<ChatRow> = sqlx::query_as(&format!(
            "SELECT {CHAT_COLS} FROM chats WHERE session_id = ? \
             ORDER BY last_message_at DESC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("chat list failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }

    async fn mark_read(&self, session_id: &str, jid: &Jid) -> Result<()> {
        sqlx::query(
            "UPDATE chats SET unread_count = 0, updated_at = ? \
             WHERE session_id = ? AND jid = ?",
        )
        .bind(fmt_ts(&Utc::now()))
        .bind(session_id)
        .bind(jid.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("mark read failed: {e}")))?;
        Ok(())
    }

    // Flag events can arrive before the chat's first message, so each
    // setter creates the row on first sight.

    async fn set_muted(
        &self,
        session_id: &str,
        jid: &Jid,
        muted: bool,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = fmt_ts(&Utc::now());
        sqlx::query(
            "INSERT INTO chats (session_id, jid, chat_type, muted, muted_until, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(session_id, jid) DO UPDATE SET \
               muted = excluded.muted, \
               muted_until = excluded.muted_until, \
               updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(jid.as_str())
        .bind(kind_of(jid).as_str())
        .bind(i64::from(muted))
        .bind(fmt_ts_opt(&until))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("mute update failed: {e}")))?;
        Ok(())
    }

    async fn set_archived(&self, session_id: &str, jid: &Jid, archived: bool) -> Result<()> {
        let now = fmt_ts(&Utc::now());
        sqlx::query(
            "INSERT INTO chats (session_id, jid, chat_type, archived, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(session_id, jid) DO UPDATE SET \
               archived = excluded.archived, \
               updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(jid.as_str())
        .bind(kind_of(jid).as_str())
        .bind(i64::from(archived))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("archive update failed: {e}")))?;
        Ok(())
    }

    async fn set_pinned(&self, session_id: &str, jid: &Jid, pinned: bool) -> Result<()> {
        let now = fmt_ts(&Utc::now());
        sqlx::query(
            "INSERT INTO chats (session_id, jid, chat_type, pinned, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(session_id, jid) DO UPDATE SET \
               pinned = excluded.pinned, \
               updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(jid.as_str())
        .bind(kind_of(jid).as_str())
        .bind(i64::from(pinned))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("pin update failed: {e}")))?;
        Ok(())
    }

    async fn rename(&self, session_id: &str, jid: &Jid, name: &str) -> Result<()> {
        let now = fmt_ts(&Utc::now());
        sqlx::query(
            "INSERT INTO chats (session_id, jid, chat_type, name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(session_id, jid) DO UPDATE SET \
               name = excluded.name, \
               updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(jid.as_str())
        .bind(kind_of(jid).as_str())
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("chat rename failed: {e}")))?;
        Ok(())
    }
}

fn kind_of(jid: &Jid) -> ChatKind {
    if jid.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Individual
    }
}
