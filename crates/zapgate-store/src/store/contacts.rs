//! Contact book with partial-update semantics.

use super::{fmt_ts, fmt_ts_opt, parse_ts_opt, Store};
use async_trait::async_trait;
use chrono::Utc;
use zapgate_core::chat::{Contact, ContactPatch};
use zapgate_core::jid::Jid;
use zapgate_core::traits::ContactRepository;
use zapgate_core::{GatewayError, Result};

type ContactRow = (
    String,         // session_id
    String,         // jid
    String,         // push_name
    String,         // full_name
    Option<String>, // last_seen_at
    String,         // picture_id
    String,         // metadata
);

const CONTACT_COLS: &str =
    "session_id, jid, push_name, full_name, last_seen_at, picture_id, metadata";

fn from_row(row: ContactRow) -> Result<Contact> {
    let metadata = serde_json::from_str(&row.6)
        .map_err(|e| GatewayError::Storage(format!("bad contact metadata: {e}")))?;
    Ok(Contact {
        session_id: row.0,
        jid: Jid::parse(&row.1)?,
        push_name: row.2,
        full_name: row.3,
        last_seen_at: parse_ts_opt(row.4)?,
        picture_id: row.5,
        metadata,
    })
}

#[async_trait]
impl ContactRepository for Store {
    async fn upsert(&self, session_id: &str, jid: &Jid, patch: &ContactPatch) -> Result<()> {
        let now = fmt_ts(&Utc::now());
        // Absent patch fields must never blank out what an earlier event
        // already recorded.
        sqlx::query(
            "INSERT INTO contacts (session_id, jid, push_name, full_name, last_seen_at, \
             picture_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(session_id, jid) DO UPDATE SET \
               push_name = CASE WHEN excluded.push_name != '' \
                 THEN excluded.push_name ELSE push_name END, \
               full_name = CASE WHEN excluded.full_name != '' \
                 THEN excluded.full_name ELSE full_name END, \
               last_seen_at = COALESCE(excluded.last_seen_at, last_seen_at), \
               picture_id = CASE WHEN excluded.picture_id != '' \
                 THEN excluded.picture_id ELSE picture_id END, \
               updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(jid.as_str())
        .bind(patch.push_name.as_deref().unwrap_or(""))
        .bind(patch.full_name.as_deref().unwrap_or(""))
        .bind(fmt_ts_opt(&patch.last_seen_at))
        .bind(patch.picture_id.as_deref().unwrap_or(""))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("contact upsert failed: {e}")))?;
        Ok(())
    }

    async fn get(&self, session_id: &str, jid: &Jid) -> Result<Option<Contact>> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLS} FROM contacts WHERE session_id = ? AND jid = ?"
        ))
        .bind(session_id)
        .bind(jid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("contact get failed: {e}")))?;
        row.map(from_row).transpose()
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Contact>> {
        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLS} FROM contacts WHERE session_id = ? ORDER BY jid"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("contact list failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }
}
