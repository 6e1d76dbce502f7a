//! artifact-cache - Versioned single-flight artifact cache
//!
//! Serves expensive precomputed artifacts by name. Each request resolves the
//! name to a stable identity and the latest completed build, then serves the
//! cached copy only if it was built from that exact build. Otherwise one
//! fresh copy is loaded and shared by every concurrent request for it.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod facade;
pub mod loader;
pub mod resolver;

pub use error::{CacheError, CacheResult};
pub use facade::ArtifactCache;
