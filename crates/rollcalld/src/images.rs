//! Content-addressed storage for captured face images.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Writes images as `<sha256>.jpg` under a single directory. Identical
/// captures share one file.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

/// A saved image. `created` is set when this call wrote the file rather
/// than finding it already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub name: String,
    pub created: bool,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `bytes` and return the file name recorded alongside the row.
    pub async fn save(&self, bytes: &[u8]) -> std::io::Result<StoredImage> {
        let name = format!("{:x}.jpg", Sha256::digest(bytes));
        let path = self.dir.join(&name);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(file = %name, "image already stored");
            return Ok(StoredImage { name, created: false });
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        // Write then rename so a reader never sees a partial file. Each
        // writer gets its own temp file; concurrent renames of identical
        // content onto the same name all succeed.
        let tmp = self.dir.join(format!("{name}.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }
        tracing::debug!(file = %name, size = bytes.len(), "image stored");
        Ok(StoredImage { name, created: true })
    }

    /// Delete a stored image. A file that is already gone is not an error.
    pub async fn remove(&self, name: &str) -> std::io::Result<()> {
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}
