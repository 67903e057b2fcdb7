//! Handler configuration.
//!
//! Loaded once at process start from an optional TOML file. Without a file
//! the stock defaults apply, which suit a deployed handler talking to S3
//! with credentials and region from the environment.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! backend = "s3"            # "s3" or "local"
//! # region = "us-east-1"    # Default: AWS provider chain
//! # endpoint = "http://localhost:9000"  # S3-compatible endpoint
//! force_path_style = false  # Path-style addressing (MinIO, LocalStack)
//! timeout_seconds = 60      # Per-operation S3 timeout
//! local_root = "buckets"    # Root directory for the "local" backend
//!
//! [logging]
//! level = "info"            # RUST_LOG overrides this
//! format = "compact"        # "compact" or "json"
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! There is no encode profile section. The profile is a constant.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Handler configuration loaded from a TOML file.
///
/// All fields have defaults; files need only the values they override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerConfig {
    /// Where objects are read from and written to.
    pub storage: StorageConfig,
    /// Log verbosity and output format.
    pub logging: LoggingConfig,
}

impl HandlerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = self
            .storage
            .endpoint
            .as_ref()
            .filter(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(ConfigError::Validation(format!(
                "storage.endpoint must be an http(s) URL, got {endpoint:?}"
            )));
        }
        if self.storage.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "storage.timeout_seconds must be non-zero".into(),
            ));
        }
        if self.storage.backend == StorageBackend::Local && self.storage.local_root.is_empty() {
            return Err(ConfigError::Validation(
                "storage.local_root must be set for the local backend".into(),
            ));
        }
        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of off, error, warn, info, debug, trace; got {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// AWS region. When absent the SDK's provider chain decides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom S3-compatible endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub timeout_seconds: u64,
    /// Directory holding one subdirectory per bucket (local backend only).
    pub local_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            region: None,
            endpoint: None,
            force_path_style: false,
            timeout_seconds: 60,
            local_root: "buckets".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Load and validate configuration.
///
/// `None` means no file was given and yields the validated defaults. A
/// given path must exist.
pub fn load_config(path: Option<&Path>) -> Result<HandlerConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => HandlerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# avif-transcoder configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# "s3" talks to AWS S3 (or an S3-compatible endpoint).
# "local" treats each bucket as a directory under local_root.
backend = "s3"

# AWS region. Omit to use the SDK provider chain (AWS_REGION, profile, IMDS).
# region = "us-east-1"

# Custom S3-compatible endpoint (MinIO, LocalStack, ...).
# endpoint = "http://localhost:9000"

# Use path-style addressing (bucket in the path, not the host name).
force_path_style = false

# Per-operation timeout for S3 calls, in seconds.
timeout_seconds = 60

# Root directory for the local backend.
local_root = "buckets"

# ---------------------------------------------------------------------------
# Logging (written to stderr; stdout carries results)
# ---------------------------------------------------------------------------
[logging]
# off, error, warn, info, debug, trace. RUST_LOG takes precedence.
level = "info"

# "compact" for humans, "json" for log pipelines.
format = "compact"
"##
}
