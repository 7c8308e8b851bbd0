mod defaults;


use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::GatewayError;
use defaults::*;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path. Empty = stderr only.
    #[serde(default)]
    pub log_file: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_file: String::new(),
        }
    }
}

/// SQLite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

/// Media object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Root directory for stored media objects.
    #[serde(default = "default_media_dir")]
    pub dir: String,
    /// Public base URL prefix for media objects. Empty = serve local paths.
    #[serde(default)]
    pub base_url: String,
    /// Timeout for the direct-URL download fallback.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
            base_url: String::new(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

/// Session lifecycle timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long an unscanned QR code stays valid before the pairing attempt
    /// is torn down.
    #[serde(default = "default_qr_timeout")]
    pub qr_timeout_secs: u64,
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
    /// Grace period after a resumed connect before verifying liveness.
    #[serde(default = "default_resume_settle_ms")]
    pub resume_settle_ms: u64,
    /// Upper bound of the random per-session delay during startup reconnect.
    #[serde(default = "default_startup_jitter_ms")]
    pub startup_max_jitter_ms: u64,
    /// History-sync messages older than this many days skip media download.
    #[serde(default = "default_history_cutoff_days")]
    pub history_media_cutoff_days: i64,
    #[serde(default = "default_true")]
    pub reconnect_on_startup: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            qr_timeout_secs: default_qr_timeout(),
            health_interval_secs: default_health_interval(),
            resume_settle_ms: default_resume_settle_ms(),
            startup_max_jitter_ms: default_startup_jitter_ms(),
            history_media_cutoff_days: default_history_cutoff_days(),
            reconnect_on_startup: true,
        }
    }
}

impl SessionConfig {
    pub fn qr_timeout(&self) -> Duration {
        Duration::from_secs(self.qr_timeout_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn resume_settle(&self) -> Duration {
        Duration::from_millis(self.resume_settle_ms)
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Events picked up per sweep pass.
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch: i64,
    /// Terminal events older than this are deleted by the retention pass.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout(),
            max_attempts: default_max_attempts(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_batch: default_sweep_batch(),
            retention_days: default_retention_days(),
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, GatewayError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| GatewayError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| GatewayError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
