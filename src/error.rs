//! Error types for the artifact cache
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for artifact cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur while serving an artifact
#[derive(Error, Debug)]
pub enum CacheError {
    // Not-found errors
    #[error("Artifact not found: {0}")]
    NameNotFound(String),

    #[error("Artifact {name} has no completed build yet")]
    NoCompletedBuild { name: String },

    // Transient errors
    #[error("Store lookup failed during {operation}: {reason}")]
    Store { operation: String, reason: String },

    #[error("Failed to load artifact {name}: {reason}")]
    Load { name: String, reason: String },

    #[error("Timed out after {waited:?} waiting for refresh of {key}")]
    LockTimeout { key: String, waited: Duration },

    /// A refresh this caller was waiting on failed; the original error is shared
    #[error(transparent)]
    Shared(Arc<CacheError>),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a store lookup error
    pub fn store(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an artifact load error
    pub fn load(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The error this one stands for, looking through shared wrappers
    pub fn root(&self) -> &CacheError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Check if the artifact (or a completed build of it) does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Self::NameNotFound(_) | Self::NoCompletedBuild { .. }
        )
    }

    /// Check if the error came from a store lookup, a load, or a lock wait
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root(),
            Self::Store { .. } | Self::Load { .. } | Self::LockTimeout { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::NameNotFound(_) => Some("Check the artifact name against the catalog"),
            Self::NoCompletedBuild { .. } => {
                Some("Wait for a build of this artifact to complete, then retry")
            }
            Self::LockTimeout { .. } => {
                Some("Raise cache.lock_wait_timeout_secs or set it to 0 to wait indefinitely")
            }
            Self::ConfigInvalid { .. } => Some("Run: artifact-cache config show"),
            _ => None,
        }
    }
}
