//! In-memory registry of live session connections.
//!
//! One entry per session holds the connection phase, the protocol client
//! handle, and the cancellation token shared by every task spawned for that
//! session. The single `claim` gate is what enforces at most one live
//! connection per session; everything else is bookkeeping around it.
//!
//! Guards are never held across an `.await` — every method takes the lock,
//! works on the map, and returns.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use zapgate_core::session::SessionStatus;
use zapgate_core::traits::ProtocolClient;
use zapgate_core::{GatewayError, Result};

/// Where a live entry is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    QrPending,
    Connected,
}

impl Phase {
    pub fn status(&self) -> SessionStatus {
        match self {
            Phase::Connecting => SessionStatus::Connecting,
            Phase::QrPending => SessionStatus::QrPending,
            Phase::Connected => SessionStatus::Connected,
        }
    }
}

struct Entry {
    phase: Phase,
    client: Option<Arc<dyn ProtocolClient>>,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve the single live slot for a session. Fails while any connect
    /// attempt or established connection occupies it.
    pub fn claim(&self, session_id: &str) -> Result<CancellationToken> {
        let mut map = self.write();
        if map.contains_key(session_id) {
            return Err(GatewayError::AlreadyConnected(session_id.to_string()));
        }
        let cancel = CancellationToken::new();
        map.insert(
            session_id.to_string(),
            Entry {
                phase: Phase::Connecting,
                client: None,
                cancel: cancel.clone(),
            },
        );
        Ok(cancel)
    }

    /// Attach the client handle to a claimed slot. Fails if the slot was
    /// torn down while the client was being built.
    pub fn attach_client(&self, session_id: &str, client: Arc<dyn ProtocolClient>) -> Result<()> {
        let mut map = self.write();
        match map.get_mut(session_id) {
            Some(entry) => {
                entry.client = Some(client);
                Ok(())
            }
            None => Err(GatewayError::NotConnected(session_id.to_string())),
        }
    }

    pub fn set_phase(&self, session_id: &str, phase: Phase) -> Result<()> {
        let mut map = self.write();
        match map.get_mut(session_id) {
            Some(entry) => {
                entry.phase = phase;
                Ok(())
            }
            None => Err(GatewayError::NotConnected(session_id.to_string())),
        }
    }

    pub fn phase(&self, session_id: &str) -> Option<Phase> {
        self.read().get(session_id).map(|e| e.phase)
    }

    /// Live status as the registry sees it; `Disconnected` when no entry.
    pub fn status(&self, session_id: &str) -> SessionStatus {
        self.phase(session_id)
            .map(|p| p.status())
            .unwrap_or(SessionStatus::Disconnected)
    }

    /// The client handle regardless of phase. Used by pairing, which needs
    /// the client before the session reaches `Connected`.
    pub fn client(&self, session_id: &str) -> Option<Arc<dyn ProtocolClient>> {
        self.read().get(session_id).and_then(|e| e.client.clone())
    }

    /// The client handle of an established connection.
    pub fn connected_client(&self, session_id: &str) -> Result<Arc<dyn ProtocolClient>> {
        let map = self.read();
        match map.get(session_id) {
            Some(entry) if entry.phase == Phase::Connected => entry
                .client
                .clone()
                .ok_or_else(|| GatewayError::NotConnected(session_id.to_string())),
            _ => Err(GatewayError::NotConnected(session_id.to_string())),
        }
    }

    /// Remove the entry, returning its client and cancel token for teardown.
    /// Safe to call when no entry exists.
    pub fn take(
        &self,
        session_id: &str,
    ) -> Option<(Option<Arc<dyn ProtocolClient>>, CancellationToken)> {
        self.write()
            .remove(session_id)
            .map(|e| (e.client, e.cancel))
    }

    pub fn is_live(&self, session_id: &str) -> bool {
        self.read().contains_key(session_id)
    }

    pub fn live_sessions(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
