//! Tracing setup for the binary.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use zapgate_core::config::{shellexpand, GatewayConfig};
use zapgate_core::{GatewayError, Result};

/// Initialize the global tracing subscriber. `RUST_LOG` wins over the
/// configured level. With `log_file` set, output goes through a
/// non-blocking daily-rolling appender; hold the returned guard for the
/// process lifetime or buffered lines are lost on exit.
pub fn init(config: &GatewayConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let path = PathBuf::from(shellexpand(&config.log_file));
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "zapgate.log".to_string());
    std::fs::create_dir_all(dir)
        .map_err(|e| GatewayError::Config(format!("failed to create log dir: {e}")))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}
