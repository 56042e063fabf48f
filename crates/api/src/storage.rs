//! Local filesystem storage for uploaded videos.

use std::path::{Path, PathBuf};

use vidintel_core::error::CoreError;
use vidintel_core::types::new_id;

/// Writes uploads to `<root>/<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `data` under a fresh name and return its storage path.
    pub async fn save(&self, extension: &str, data: &[u8]) -> Result<String, CoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to create upload dir: {e}")))?;

        let path = self.root.join(format!("{}.{extension}", new_id()));
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to write upload: {e}")))?;

        tracing::debug!(path = %path.display(), bytes = data.len(), "Upload stored");
        Ok(path.to_string_lossy().into_owned())
    }

    /// Best-effort removal of a stored upload.
    pub async fn remove(&self, storage_path: &str) {
        if let Err(e) = tokio::fs::remove_file(storage_path).await {
            tracing::warn!(path = storage_path, error = %e, "Failed to remove stored upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_writes_under_root_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested"));

        let path = storage.save("mp4", b"video-bytes").await.unwrap();
        assert!(path.ends_with(".mp4"));
        assert!(Path::new(&path).starts_with(storage.root()));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"video-bytes");

        storage.remove(&path).await;
        assert!(!Path::new(&path).exists());
    }
}
