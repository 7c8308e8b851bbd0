use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type for Zapgate.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Session/chat/contact/message absent — expected, caller decides.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate create of an existing entity.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A live connection handle already exists for this session.
    #[error("session already connected: {0}")]
    AlreadyConnected(String),

    /// No live connection handle exists for this session.
    #[error("session not connected: {0}")]
    NotConnected(String),

    /// Malformed JID, unsupported mime type, oversized payload — rejected
    /// before any I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// QR pairing window elapsed without a scan.
    #[error("qr code expired, retry connect")]
    QrExpired,

    /// Error from the protocol client (network, handshake, send).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Media download/upload error.
    #[error("media error: {0}")]
    Media(String),

    /// Webhook delivery machinery error (never a failed delivery itself —
    /// that is recorded on the event).
    #[error("webhook error: {0}")]
    Webhook(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Protocol logout or corrupted device credential — requires re-pairing.
    #[error("unrecoverable: {0}")]
    Unrecoverable(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GatewayError {
    /// Whether retrying the same operation later could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Protocol(_)
                | GatewayError::Storage(_)
                | GatewayError::Media(_)
                | GatewayError::Webhook(_)
                | GatewayError::Io(_)
        )
    }
}
