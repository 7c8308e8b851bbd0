//! Filesystem-backed media object store.
//!
//! Objects are laid out exactly as their object path dictates, rooted at the
//! configured media directory. The path convention is shared with external
//! consumers, so it is produced by [`MediaPlacement::object_path`] and taken
//! at face value here, modulo traversal checks.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;
use zapgate_core::config::{shellexpand, MediaConfig};
use zapgate_core::traits::{MediaPlacement, MediaStore};
use zapgate_core::{GatewayError, Result};

pub struct FsMediaStore {
    root: PathBuf,
    base_url: String,
}

impl FsMediaStore {
    pub fn new(config: &MediaConfig) -> Result<Self> {
        let root = PathBuf::from(shellexpand(&config.dir));
        std::fs::create_dir_all(&root)
            .map_err(|e| GatewayError::Media(format!("failed to create media dir: {e}")))?;
        Ok(Self {
            root,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Map an object path onto the filesystem, rejecting anything that could
    /// escape the media root.
    fn resolve(&self, object_path: &str) -> Result<PathBuf> {
        if object_path.is_empty() || object_path.starts_with('/') {
            return Err(GatewayError::InvalidInput(format!(
                "bad object path {object_path:?}"
            )));
        }
        for part in object_path.split('/') {
            if part.is_empty() || part == "." || part == ".." || part.contains('\\') {
                return Err(GatewayError::InvalidInput(format!(
                    "bad object path {object_path:?}"
                )));
            }
        }
        Ok(self.root.join(object_path))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn upload(&self, data: &[u8], placement: &MediaPlacement<'_>) -> Result<String> {
        let object_path = placement.object_path();
        let full = self.resolve(&object_path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GatewayError::Media(format!("failed to create object dir: {e}")))?;
        }
        tokio::fs::write(&full, data)
            .await
            .map_err(|e| GatewayError::Media(format!("write {object_path} failed: {e}")))?;
        debug!("Stored media object {object_path} ({} bytes)", data.len());
        Ok(object_path)
    }

    async fn media_url(&self, object_path: &str) -> Result<String> {
        let full = self.resolve(object_path)?;
        if self.base_url.is_empty() {
            return Ok(full.to_string_lossy().into_owned());
        }
        Ok(format!("{}/{object_path}", self.base_url))
    }

    async fn delete(&self, object_path: &str) -> Result<()> {
        let full = self.resolve(object_path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::Media(format!(
                "delete {object_path} failed: {e}"
            ))),
        }
    }
}
