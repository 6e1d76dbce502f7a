//! Artifact loading
//!
//! The loader performs the expensive fetch. It is called at most once per
//! key at a time by the cache, but may be called again after failures or
//! version changes, so implementations must tolerate repeated calls.

mod fs;

pub use fs::{FileArtifact, FsLoader};

use crate::error::CacheResult;
use async_trait::async_trait;

/// Fetches the artifact published under a name
#[async_trait]
pub trait ArtifactLoader<A>: Send + Sync {
    /// Load the current artifact for `name`
    async fn load(&self, name: &str) -> CacheResult<A>;
}
