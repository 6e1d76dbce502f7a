//! Loader reading artifacts from a local directory

use crate::error::{CacheError, CacheResult};
use crate::loader::ArtifactLoader;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Artifact bytes read from disk
#[derive(Debug, Clone)]
pub struct FileArtifact {
    /// Name the artifact was requested under
    pub name: String,

    /// Raw contents
    pub bytes: Vec<u8>,

    /// Hex SHA256 of `bytes`
    pub sha256: String,
}

impl FileArtifact {
    /// Wrap loaded bytes, computing their digest
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let sha256 = hex::encode(Sha256::digest(&bytes));
        Self {
            name: name.into(),
            bytes,
            sha256,
        }
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// [`ArtifactLoader`] serving `<dir>/<flattened name>`
pub struct FsLoader {
    dir: PathBuf,
}

impl FsLoader {
    /// Create a loader rooted at `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Get the artifact directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File an artifact name maps to
    ///
    /// Path separators are flattened so `github.com/acme/api` becomes
    /// `github.com_acme_api`. Names that could escape the directory are rejected.
    pub fn artifact_path(&self, name: &str) -> CacheResult<PathBuf> {
        if name.is_empty() || name.split(['/', '\\']).any(|part| part == "..") {
            return Err(CacheError::load(name, "invalid artifact name"));
        }

        let file_name = name.replace(['/', '\\', ':'], "_");
        Ok(self.dir.join(file_name))
    }
}

#[async_trait]
impl ArtifactLoader<FileArtifact> for FsLoader {
    async fn load(&self, name: &str) -> CacheResult<FileArtifact> {
        let path = self.artifact_path(name)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|e| CacheError::load(name, format!("reading {}: {}", path.display(), e)))?;

        debug!("Loaded {} bytes for {} from {}", bytes.len(), name, path.display());
        Ok(FileArtifact::new(name, bytes))
    }
}
