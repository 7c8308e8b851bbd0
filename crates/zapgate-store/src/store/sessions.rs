//! Session records, device bindings, and QR persistence.

use super::{fmt_ts, parse_ts, Store};
use async_trait::async_trait;
use chrono::Utc;
use zapgate_core::session::{Session, SessionStatus};
use zapgate_core::traits::SessionRepository;
use zapgate_core::{GatewayError, Result};

type SessionRow = (
    String,         // id
    String,         // name
    String,         // device_jid
    String,         // status
    Option<String>, // qr_code
    Option<String>, // qr_png
    String,         // webhook_url
    String,         // webhook_events
    String,         // created_at
    String,         // updated_at
);

const SESSION_COLS: &str = "id, name, device_jid, status, qr_code, qr_png, \
                            webhook_url, webhook_events, created_at, updated_at";

fn from_row(row: SessionRow) -> Result<Session> {
    Ok(Session {
        id: row.0,
        name: row.1,
        device_jid: row.2,
        status: SessionStatus::from_db(&row.3),
        qr_code: row.4,
        qr_png: row.5,
        webhook_url: row.6,
        webhook_events: split_events(&row.7),
        created_at: parse_ts(&row.8)?,
        updated_at: parse_ts(&row.9)?,
    })
}

fn split_events(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn join_events(events: &[String]) -> String {
    events.join(",")
}

#[async_trait]
impl SessionRepository for Store {
    async fn create(&self, session: &Session) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO sessions (id, name, device_jid, status, qr_code, qr_png, \
             webhook_url, webhook_events, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.name)
        .bind(&session.device_jid)
        .bind(session.status.as_str())
        .bind(&session.qr_code)
        .bind(&session.qr_png)
        .bind(&session.webhook_url)
        .bind(join_events(&session.webhook_events))
        .bind(fmt_ts(&session.created_at))
        .bind(fmt_ts(&session.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                GatewayError::AlreadyExists(format!("session name {:?} taken", session.name)),
            ),
            Err(e) => Err(GatewayError::Storage(format!("session insert failed: {e}"))),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {SESSION_COLS} FROM sessions WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| GatewayError::Storage(format!("session get failed: {e}")))?;
        row.map(from_row).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLS} FROM sessions WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("session lookup failed: {e}")))?;
        row.map(from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLS} FROM sessions ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("session list failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("session delete failed: {e}")))?;
        Ok(())
    }

    async fn update_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        sqlx::query("UPDATE sessions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(fmt_ts(&Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("status update failed: {e}")))?;
        Ok(())
    }

    async fn update_device_jid(&self, id: &str, device_jid: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET device_jid = ?, updated_at = ? WHERE id = ?")
            .bind(device_jid)
            .bind(fmt_ts(&Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("device update failed: {e}")))?;
        Ok(())
    }

    async fn set_qr(&self, id: &str, code: &str, png_data_uri: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET qr_code = ?, qr_png = ?, updated_at = ? WHERE id = ?")
            .bind(code)
            .bind(png_data_uri)
            .bind(fmt_ts(&Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("qr update failed: {e}")))?;
        Ok(())
    }

    async fn clear_qr(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET qr_code = NULL, qr_png = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(fmt_ts(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("qr clear failed: {e}")))?;
        Ok(())
    }

    async fn bound_sessions(&self) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLS} FROM sessions WHERE device_jid != '' ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("bound session list failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }

    async fn set_webhook(&self, id: &str, url: &str, events: &[String]) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET webhook_url = ?, webhook_events = ?, updated_at = ? WHERE id = ?",
        )
        .bind(url)
        .bind(join_events(events))
        .bind(fmt_ts(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("webhook update failed: {e}")))?;
        Ok(())
    }
}
