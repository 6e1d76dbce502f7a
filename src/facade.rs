//! Name-based entry point tying resolver, loader, and versioned cache together

use crate::cache::{CacheStats, VersionedCache};
use crate::error::CacheResult;
use crate::loader::ArtifactLoader;
use crate::resolver::{ArtifactId, Resolver, VersionStamp};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Process-scoped artifact cache
///
/// Every [`get`](ArtifactCache::get) resolves the name and the latest
/// completed build afresh, then lets the versioned cache decide between
/// serving the stored copy and loading a new one.
pub struct ArtifactCache<A> {
    resolver: Arc<dyn Resolver>,
    loader: Arc<dyn ArtifactLoader<A>>,
    cache: VersionedCache<ArtifactId, VersionStamp, A>,
}

impl<A> Clone for ArtifactCache<A> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            loader: Arc::clone(&self.loader),
            cache: self.cache.clone(),
        }
    }
}

impl<A: Send + Sync + 'static> ArtifactCache<A> {
    /// Create an empty cache over the given collaborators
    pub fn new(resolver: Arc<dyn Resolver>, loader: Arc<dyn ArtifactLoader<A>>) -> Self {
        Self {
            resolver,
            loader,
            cache: VersionedCache::new(),
        }
    }

    /// Bound how long a request waits for another request's refresh of the same artifact
    pub fn with_lock_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cache = self.cache.with_lock_wait_timeout(timeout);
        self
    }

    /// Get the current artifact published under `name`
    ///
    /// Fails without touching the cache when the name is unknown or no build
    /// has completed. Otherwise returns the cached copy if it was built from
    /// the latest completed build, or loads exactly one fresh copy shared by
    /// every concurrent request for the same artifact.
    pub async fn get(&self, name: &str) -> CacheResult<Arc<A>> {
        let id = self.resolver.resolve_identity(name).await?;
        let version = self.resolver.latest_version(id).await?;
        debug!("{} resolved to {} at {}", name, id, version);

        let loader = Arc::clone(&self.loader);
        let name = name.to_string();
        self.cache
            .get(id, version, move || async move { loader.load(&name).await })
            .await
    }

    /// Snapshot of hit/miss counters
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
