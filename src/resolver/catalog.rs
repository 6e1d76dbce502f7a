//! File-backed resolver over a JSON catalog of artifacts and builds
//!
//! The catalog is re-read on every lookup so that a build finishing (or an
//! artifact being renamed) is visible to the very next request.

use crate::error::{CacheError, CacheResult};
use crate::resolver::{ArtifactId, Resolver, VersionStamp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Lifecycle state of a build record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Queued,
    Processing,
    Completed,
    Errored,
    Failed,
}

/// Named artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    pub name: String,
}

/// One build of an artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub artifact_id: ArtifactId,
    pub state: BuildState,

    /// Set once the build stops running
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Contents of a catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub artifacts: Vec<ArtifactRecord>,
    pub builds: Vec<BuildRecord>,
}

impl Catalog {
    /// Read and parse a catalog file
    pub async fn load(path: &Path) -> CacheResult<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            CacheError::store(
                "reading catalog",
                format!("{}: {}", path.display(), e),
            )
        })?;

        serde_json::from_str(&content).map_err(|e| {
            CacheError::store(
                "parsing catalog",
                format!("{}: {}", path.display(), e),
            )
        })
    }

    /// Find an artifact by name
    pub fn find_by_name(&self, name: &str) -> Option<&ArtifactRecord> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Find an artifact by identity
    pub fn find_by_id(&self, id: ArtifactId) -> Option<&ArtifactRecord> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    /// Finish time of the newest completed build of `id`
    pub fn last_completed(&self, id: ArtifactId) -> Option<DateTime<Utc>> {
        self.builds
            .iter()
            .filter(|b| b.artifact_id == id && b.state == BuildState::Completed)
            .filter_map(|b| b.finished_at)
            .max()
    }
}

/// [`Resolver`] reading a [`Catalog`] file on every call
pub struct CatalogResolver {
    path: PathBuf,
}

impl CatalogResolver {
    /// Create a resolver over the catalog at `path`
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the catalog file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Resolver for CatalogResolver {
    async fn resolve_identity(&self, name: &str) -> CacheResult<ArtifactId> {
        let catalog = Catalog::load(&self.path).await?;
        let record = catalog
            .find_by_name(name)
            .ok_or_else(|| CacheError::NameNotFound(name.to_string()))?;

        debug!("Resolved {} to {}", name, record.id);
        Ok(record.id)
    }

    async fn latest_version(&self, id: ArtifactId) -> CacheResult<VersionStamp> {
        let catalog = Catalog::load(&self.path).await?;
        let record = catalog
            .find_by_id(id)
            .ok_or_else(|| CacheError::NameNotFound(id.to_string()))?;

        catalog
            .last_completed(id)
            .map(VersionStamp)
            .ok_or_else(|| CacheError::NoCompletedBuild {
                name: record.name.clone(),
            })
    }
}
