//! Versioned in-memory cache with per-key single-flight refresh
//!
//! Every entry is stamped with the version it was built from. A lookup is a
//! hit only when the stored stamp equals the stamp the caller just obtained
//! from upstream; anything else triggers a refresh, and concurrent callers
//! for the same key share that one refresh.
//!
//! # Refresh States
//!
//! | Stored entry | Caller's stamp | Result |
//! |--------------|----------------|--------|
//! | none | any | refresh under the key lock |
//! | `(v, x)` | `v` | `x`, no lock taken |
//! | `(v, x)` | `w != v` | refresh under the key lock, entry replaced |
//!
//! Failed refreshes leave the stored entry untouched and are handed only to
//! the callers that were already waiting on them. The next caller retries.

mod stats;
mod versioned;

pub use stats::CacheStats;
pub use versioned::{Entry, VersionedCache};
