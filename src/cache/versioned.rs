//! Per-key single-flight refresh over a concurrent map

use crate::cache::stats::{CacheStats, Counters};
use crate::error::{CacheError, CacheResult};
use dashmap::DashMap;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// A cached value together with the version it was built from
///
/// Entries are never mutated. A refresh builds a new one and swaps it in.
#[derive(Debug)]
pub struct Entry<S, V> {
    version: S,
    value: Arc<V>,
}

impl<S, V> Entry<S, V> {
    /// Version the value was built from
    pub fn version(&self) -> &S {
        &self.version
    }

    /// The cached value
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }
}

/// The most recent failed refresh of a key
struct FailedAttempt<S> {
    attempt: u64,
    version: S,
    error: Arc<CacheError>,
}

/// State guarded by the per-key lock
struct RefreshState<S> {
    last_failure: Option<FailedAttempt<S>>,
}

/// Per-key coordination handle, created once per key and never replaced
struct KeySlot<S> {
    /// Number of finished refresh attempts. Written only while `state` is held.
    completed: AtomicU64,
    state: Arc<Mutex<RefreshState<S>>>,
}

impl<S> KeySlot<S> {
    fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            state: Arc::new(Mutex::new(RefreshState { last_failure: None })),
        }
    }
}

/// In-memory cache whose entries are valid only for the version they were built from
///
/// Lookups for different keys never contend beyond a map shard. For a single
/// key at most one loader runs at a time, and callers that queued behind it
/// reuse its outcome instead of loading again.
pub struct VersionedCache<K, S, V> {
    entries: Arc<DashMap<K, Arc<Entry<S, V>>>>,

    /// One lock per key, installed atomically on first use
    slots: Arc<DashMap<K, Arc<KeySlot<S>>>>,

    counters: Arc<Counters>,

    /// Upper bound on waiting for another caller's refresh (None = wait forever)
    lock_wait_timeout: Option<Duration>,
}

impl<K, S, V> Clone for VersionedCache<K, S, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            slots: Arc::clone(&self.slots),
            counters: Arc::clone(&self.counters),
            lock_wait_timeout: self.lock_wait_timeout,
        }
    }
}

impl<K, S, V> VersionedCache<K, S, V>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    S: PartialEq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create an empty cache that waits indefinitely for in-flight refreshes
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            slots: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            lock_wait_timeout: None,
        }
    }

    /// Bound how long a caller waits for another caller's refresh of the same key
    ///
    /// Only the wait is bounded. The refresh being waited on keeps running.
    pub fn with_lock_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_wait_timeout = timeout;
        self
    }

    /// Return the value for `key` built from `version`, loading it if needed
    ///
    /// `loader` is only invoked when no entry for `version` is stored and no
    /// other caller finished refreshing it while this one waited. It runs on
    /// its own task that owns the key lock, so dropping this future does not
    /// interrupt a refresh other callers may be waiting on.
    ///
    /// # Errors
    ///
    /// Returns the loader's error wrapped in [`CacheError::Shared`], both to
    /// the caller that ran it and to callers that were waiting on it.
    /// Returns [`CacheError::LockTimeout`] if the configured wait elapses.
    pub async fn get<F, Fut>(&self, key: K, version: S, loader: F) -> CacheResult<Arc<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CacheResult<V>> + Send + 'static,
    {
        if let Some(value) = self.current(&key, &version) {
            debug!("Cache hit for {} at {:?}", key, version);
            self.counters.hit();
            return Ok(value);
        }

        let slot = self.slot(&key);
        let observed = slot.completed.load(Ordering::Acquire);
        let state = self.lock_slot(&key, &slot).await?;

        // Re-check: another caller may have refreshed this version while we waited
        if let Some(value) = self.current(&key, &version) {
            debug!("Refresh of {} finished while waiting", key);
            self.counters.hit();
            return Ok(value);
        }

        if let Some(failed) = state.last_failure.as_ref() {
            if failed.attempt > observed && failed.version == version {
                debug!("Refresh of {} failed while waiting: {}", key, failed.error);
                self.counters.shared_failure();
                return Err(CacheError::Shared(Arc::clone(&failed.error)));
            }
        }

        debug!("Refreshing {} for version {:?}", key, version);
        self.counters.miss();

        let entries = Arc::clone(&self.entries);
        let counters = Arc::clone(&self.counters);
        let task_key = key.clone();
        let refresh = tokio::spawn(async move {
            let mut state = state;
            // A panic still counts as a finished attempt so waiters share it
            let result = match AssertUnwindSafe(async move { loader().await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => Err(CacheError::Internal(format!(
                    "loader for {} panicked: {}",
                    task_key,
                    panic_message(panic.as_ref())
                ))),
            };
            let attempt = slot.completed.fetch_add(1, Ordering::AcqRel) + 1;

            match result {
                Ok(value) => {
                    let value = Arc::new(value);
                    let entry = Entry {
                        version: version.clone(),
                        value: Arc::clone(&value),
                    };
                    entries.insert(task_key.clone(), Arc::new(entry));
                    state.last_failure = None;
                    counters.refreshed();
                    info!("Refreshed {} at version {:?}", task_key, version);
                    Ok(value)
                }
                Err(e) => {
                    warn!("Refresh of {} failed: {}", task_key, e);
                    let error = Arc::new(e);
                    state.last_failure = Some(FailedAttempt {
                        attempt,
                        version,
                        error: Arc::clone(&error),
                    });
                    counters.failed();
                    Err(CacheError::Shared(error))
                }
            }
        });

        match refresh.await {
            Ok(result) => result,
            Err(e) => Err(CacheError::Internal(format!(
                "refresh of {} did not complete: {}",
                key, e
            ))),
        }
    }

    /// The stored entry for `key`, whatever its version
    pub fn peek(&self, key: &K) -> Option<Arc<Entry<S, V>>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of keys with a stored entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entry has been stored yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of hit/miss counters
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    fn current(&self, key: &K, version: &S) -> Option<Arc<V>> {
        self.entries
            .get(key)
            .filter(|entry| entry.version == *version)
            .map(|entry| Arc::clone(&entry.value))
    }

    fn slot(&self, key: &K) -> Arc<KeySlot<S>> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }

        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(KeySlot::new()));
        Arc::clone(slot.value())
    }

    async fn lock_slot(
        &self,
        key: &K,
        slot: &KeySlot<S>,
    ) -> CacheResult<OwnedMutexGuard<RefreshState<S>>> {
        let lock = Arc::clone(&slot.state);
        if let Ok(guard) = Arc::clone(&lock).try_lock_owned() {
            return Ok(guard);
        }

        debug!("Waiting for in-flight refresh of {}", key);
        match self.lock_wait_timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| {
                    warn!("Gave up waiting {:?} for refresh of {}", limit, key);
                    CacheError::LockTimeout {
                        key: key.to_string(),
                        waited: limit,
                    }
                }),
            None => Ok(lock.lock_owned().await),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

impl<K, S, V> Default for VersionedCache<K, S, V>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    S: PartialEq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
