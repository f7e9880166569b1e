//! Configuration management for RuleStore

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Database used when neither the URI nor the configuration names one
pub const DEFAULT_DATABASE: &str = "casbin";

/// Collection holding one document per policy rule
pub const DEFAULT_COLLECTION: &str = "casbin_rule";

/// Upper bound for a single store request
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Main configuration structure for RuleStore
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Adapter configuration
    #[serde(default)]
    pub adapter: AdapterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML, YAML or JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse(&content, path.extension().and_then(|ext| ext.to_str()))
    }

    /// Parse configuration text, picking the format from a file extension
    pub fn parse(content: &str, extension: Option<&str>) -> Result<Self> {
        let config: Config = match extension {
            Some("toml") => toml::from_str(content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?,
            Some("yaml" | "yml") => serde_yaml::from_str(content)
                .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?,
            _ => serde_json::from_str(content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?,
        };

        config.adapter.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Store URI (`memory://` or `sled:///path`)
    pub uri: String,
    /// Database name; a database in the URI takes precedence
    pub database: Option<String>,
    /// Collection name
    pub collection: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Create the unique rule index when the adapter opens the store
    pub create_index: bool,
    /// Start in the filtered state so a full save is refused until a load
    pub filtered: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            uri: "memory://".to_string(),
            database: None,
            collection: DEFAULT_COLLECTION.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            create_index: true,
            filtered: false,
        }
    }
}

impl AdapterConfig {
    /// Config for a given store URI with every other field defaulted
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject values the adapter cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(Error::Config("adapter.uri must not be empty".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::Config(
                "adapter.collection must not be empty".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config(
                "adapter.timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Include the event target in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}
