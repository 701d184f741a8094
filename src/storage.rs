//! Attachment storage on the local filesystem.
//!
//! Blobs live at `<root>/<key>/<filename>`. The key is random and doubles as the
//! public handle in attachment URLs.

use base64::Engine;
use rand::Rng;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid blob key or filename")]
    InvalidPath,
    #[error("blob not found")]
    NotFound,
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it is missing.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Generate a fresh random blob key (16 bytes, base64url)
    pub fn generate_key() -> String {
        let bytes: [u8; 16] = rand::rng().random();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Store data under `key`, replacing anything already there.
    pub async fn put(&self, key: &str, filename: &str, data: &[u8]) -> Result<(), StorageError> {
        let full_path = self.blob_path(key, filename)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, data).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str, filename: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.blob_path(key, filename)?;
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a blob and its key directory. Missing blobs are not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let dir = self.key_dir(key)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn key_dir(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_segment(key) {
            return Err(StorageError::InvalidPath);
        }
        Ok(self.root.join(key))
    }

    fn blob_path(&self, key: &str, filename: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_segment(filename) {
            return Err(StorageError::InvalidPath);
        }
        Ok(self.key_dir(key)?.join(filename))
    }
}

/// Single path segment with no traversal
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

/// Reduce an uploaded filename to something safe to keep on disk and in URLs.
///
/// Directory components are dropped; anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}
