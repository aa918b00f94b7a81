//! Configuration for sync-client.
//!
//! Configuration is loaded from a TOML file (default: `soko-sync.toml`).
//! Every section is optional; missing values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_core::{default_providers, ProviderConfig, RetryPolicy};

/// Root configuration for sync-client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Drain behaviour.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Remote gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Payment providers (default: M-Pesa, Airtel Money, card).
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Drain behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Retry ceiling; unset means retry forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Remote gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the marketplace API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("soko-sync.db")
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            sync: SyncConfig::default(),
            gateway: GatewayConfig::default(),
            providers: default_providers(),
        }
    }
}

impl SyncConfig {
    /// Retry forever.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a retry ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// The retry policy this configuration describes.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self.max_attempts {
            Some(max) => RetryPolicy::with_ceiling(max),
            None => RetryPolicy::unbounded(),
        }
    }
}

impl GatewayConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Set the database path.
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.database = path.into();
        self
    }

    /// Set the drain behaviour.
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
