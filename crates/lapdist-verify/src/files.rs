//! Local-disk [`FileStore`] and upload naming helpers.

use std::path::{Component, Path, PathBuf};

use lapdist_core::error::{LapdistError, LapdistResult};
use lapdist_core::storage::FileStore;
use sha2::{Digest, Sha256};

use crate::error::VerifyError;

/// File extension for an accepted image content type.
pub fn image_extension(content_type: &str) -> Result<&'static str, VerifyError> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => Err(VerifyError::InvalidFormat(format!(
            "unsupported image type `{other}`"
        ))),
    }
}

/// `<prefix>/<sha256 of bytes>.<ext>`; identical uploads share a path.
pub fn content_path(prefix: &str, bytes: &[u8], extension: &str) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    format!("{prefix}/{digest}.{extension}")
}

/// Files under a root directory; references are root-relative paths.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> LapdistResult<PathBuf> {
        let relative = Path::new(reference);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if reference.is_empty() || !safe {
            return Err(LapdistError::Storage(format!(
                "invalid file reference `{reference}`"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl FileStore for LocalFileStore {
    async fn save(&self, bytes: Vec<u8>, path: String) -> LapdistResult<String> {
        let target = self.resolve(&path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LapdistError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| LapdistError::Storage(e.to_string()))?;
        Ok(path)
    }

    async fn read(&self, reference: &str) -> LapdistResult<Vec<u8>> {
        let target = self.resolve(reference)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LapdistError::NotFound {
                entity: "file".into(),
                id: reference.to_string(),
            }),
            Err(e) => Err(LapdistError::Storage(e.to_string())),
        }
    }

    async fn delete(&self, reference: &str) -> LapdistResult<()> {
        let target = self.resolve(reference)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LapdistError::Storage(e.to_string())),
        }
    }

    async fn exists(&self, reference: &str) -> LapdistResult<bool> {
        let target = self.resolve(reference)?;
        tokio::fs::try_exists(&target)
            .await
            .map_err(|e| LapdistError::Storage(e.to_string()))
    }
}
