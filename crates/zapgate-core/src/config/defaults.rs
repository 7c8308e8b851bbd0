//! Default value functions referenced by serde attributes.

pub fn default_name() -> String {
    "zapgate".to_string()
}

pub fn default_data_dir() -> String {
    "~/.zapgate".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_db_path() -> String {
    "~/.zapgate/data/gateway.db".to_string()
}

pub fn default_max_connections() -> u32 {
    5
}

pub fn default_busy_timeout() -> u64 {
    5
}

pub fn default_media_dir() -> String {
    "~/.zapgate/media".to_string()
}

pub fn default_download_timeout() -> u64 {
    30
}

pub fn default_qr_timeout() -> u64 {
    30
}

pub fn default_health_interval() -> u64 {
    30
}

pub fn default_resume_settle_ms() -> u64 {
    1500
}

pub fn default_startup_jitter_ms() -> u64 {
    2000
}

pub fn default_history_cutoff_days() -> i64 {
    7
}

pub fn default_true() -> bool {
    true
}

pub fn default_webhook_timeout() -> u64 {
    30
}

pub fn default_max_attempts() -> i64 {
    5
}

pub fn default_sweep_interval() -> u64 {
    60
}

pub fn default_sweep_batch() -> i64 {
    100
}

pub fn default_retention_days() -> i64 {
    30
}
