//! Identity and freshness lookups
//!
//! Resolves a human-facing artifact name to its stable identity, and an
//! identity to the completion time of its most recent build. Neither lookup
//! is cached: staleness decisions always use current store contents.

mod catalog;

pub use catalog::{ArtifactRecord, BuildRecord, BuildState, Catalog, CatalogResolver};

use crate::error::CacheResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable backing identifier of an artifact
///
/// Renaming an artifact keeps its identity, so the cache entry and build
/// history follow the rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub i64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact#{}", self.0)
    }
}

/// Marker of which build an artifact was produced from
///
/// Two stamps are either the same build or not; ordering is never consulted
/// when deciding whether a cached copy is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStamp(pub DateTime<Utc>);

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Read-only view over the stores that know artifacts and their builds
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Map a name to its identity
    ///
    /// Fails with `NameNotFound` when no artifact has that name.
    async fn resolve_identity(&self, name: &str) -> CacheResult<ArtifactId>;

    /// Completion stamp of the newest completed build of `id`
    ///
    /// Fails with `NoCompletedBuild` when the artifact exists but nothing
    /// has finished building yet.
    async fn latest_version(&self, id: ArtifactId) -> CacheResult<VersionStamp>;
}
