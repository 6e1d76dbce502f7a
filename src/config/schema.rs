//! Configuration schema for the artifact cache
//!
//! Configuration is stored at `~/.config/artifact-cache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Versioned cache settings
    pub cache: CacheConfig,

    /// Catalog resolver settings
    pub catalog: CatalogConfig,

    /// Artifact loader settings
    pub loader: LoaderConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Versioned cache settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Max seconds to wait for another request's refresh (0 = wait indefinitely)
    pub lock_wait_timeout_secs: u64,
}

impl CacheConfig {
    /// The lock wait bound, if any
    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        match self.lock_wait_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Catalog resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to the JSON catalog of artifacts and builds
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("catalog.json"),
        }
    }
}

/// Artifact loader settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory holding one file per artifact
    pub artifact_dir: PathBuf,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            artifact_dir: data_dir().join("artifacts"),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("artifact-cache")
}
