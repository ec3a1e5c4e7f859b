// round-core/src/config.rs

//! Configuration management for the round server.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values. Defaults match
//! the constants the server has always shipped with, so an empty file (or no
//! file at all) yields a working two-client, one-update round.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, RoundError};

/// Placeholder substituted with the client index in update artifact paths.
pub const INDEX_PLACEHOLDER: &str = "{index}";

// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub round: RoundConfig,
    pub storage: StorageConfig,
    pub artifacts: ArtifactConfig,
    pub aggregation: AggregationConfig,
}

/// Network listener options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Address to bind to.
    pub address: String,
    /// Port to listen on.
    pub port: u16,
}

/// Round admission and timing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Number of check-ins that forms the selection quorum.
    pub checkin_limit: u64,
    /// Number of finished updates that triggers aggregation.
    pub update_limit: u64,
    /// Waiting window (milliseconds) for the check-in quorum, measured from
    /// round start.
    pub round_timeout_ms: u64,
    /// Seconds a rejected or unselected client should wait before retrying.
    pub post_checkin_reconnection_secs: u64,
    /// Seconds a client should wait after submitting an update.
    pub post_update_reconnection_secs: u64,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base directory that relative artifact paths are resolved against.
    pub base_path: PathBuf,
    // Buffer size in bytes for file I/O.
    pub buffer_size: usize,
}

/// Artifact locations and transfer options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Shared checkpoint streamed to selected clients.
    pub checkpoint_path: PathBuf,
    /// Per-client update file path; must contain `{index}`.
    pub update_path_template: String,
    /// Model architecture handed to the aggregator.
    pub model_path: PathBuf,
    /// Chunk size in bytes for checkpoint streaming.
    pub chunk_size: usize,
}

/// External aggregation process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Interpreter or executable to launch.
    pub program: String,
    /// Script passed as the first argument to `program`.
    pub script: PathBuf,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 50051,
        }
    }
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            checkin_limit: 2,
            update_limit: 1,
            round_timeout_ms: 8_000,
            post_checkin_reconnection_secs: 8,
            post_update_reconnection_secs: 8,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data"),
            buffer_size: 64 * 1024, // 64 KB
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("fl_checkpoint"),
            update_path_template: format!("fl_checkpoint_update_{}", INDEX_PLACEHOLDER),
            model_path: PathBuf::from("./model/model.h5"),
            chunk_size: 64 * 1024, // 64 KB
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            script: PathBuf::from("federated_averaging.py"),
        }
    }
}

impl RoundConfig {
    /// The check-in waiting window as a `Duration`.
    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }
}

impl ArtifactConfig {
    /// Storage path of the update artifact for `client_index`.
    pub fn update_path(&self, client_index: u64) -> PathBuf {
        PathBuf::from(
            self.update_path_template
                .replace(INDEX_PLACEHOLDER, &client_index.to_string()),
        )
    }
}

impl FromStr for ServerConfig {
    type Err = RoundError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| RoundError::config_with_source("failed to parse TOML config", e))
    }
}

impl ServerConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RoundError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `FL_` and use underscores
    // to separate nested fields. For example:
    // - `FL_SERVER_PORT` overrides `server.port`
    // - `FL_ROUND_CHECKIN_LIMIT` overrides `round.checkin_limit`
    // - `FL_ROUND_TIMEOUT_MS` overrides `round.round_timeout_ms`
    // - `FL_ARTIFACTS_CHUNK_SIZE` overrides `artifacts.chunk_size`
    // - `FL_AGGREGATION_SCRIPT` overrides `aggregation.script`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(val) = std::env::var("FL_SERVER_ADDRESS") {
            self.server.address = val;
        }
        if let Ok(val) = std::env::var("FL_SERVER_PORT") {
            if let Ok(v) = val.parse() {
                self.server.port = v;
            }
        }

        // Round overrides
        if let Ok(val) = std::env::var("FL_ROUND_CHECKIN_LIMIT") {
            if let Ok(v) = val.parse() {
                self.round.checkin_limit = v;
            }
        }
        if let Ok(val) = std::env::var("FL_ROUND_UPDATE_LIMIT") {
            if let Ok(v) = val.parse() {
                self.round.update_limit = v;
            }
        }
        if let Ok(val) = std::env::var("FL_ROUND_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.round.round_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("FL_ROUND_POST_CHECKIN_RECONNECTION_SECS") {
            if let Ok(v) = val.parse() {
                self.round.post_checkin_reconnection_secs = v;
            }
        }
        if let Ok(val) = std::env::var("FL_ROUND_POST_UPDATE_RECONNECTION_SECS") {
            if let Ok(v) = val.parse() {
                self.round.post_update_reconnection_secs = v;
            }
        }

        // Storage overrides
        if let Ok(val) = std::env::var("FL_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FL_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }

        // Artifact overrides
        if let Ok(val) = std::env::var("FL_ARTIFACTS_CHECKPOINT_PATH") {
            self.artifacts.checkpoint_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FL_ARTIFACTS_UPDATE_PATH_TEMPLATE") {
            self.artifacts.update_path_template = val;
        }
        if let Ok(val) = std::env::var("FL_ARTIFACTS_MODEL_PATH") {
            self.artifacts.model_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FL_ARTIFACTS_CHUNK_SIZE") {
            if let Ok(v) = val.parse() {
                self.artifacts.chunk_size = v;
            }
        }

        // Aggregation overrides
        if let Ok(val) = std::env::var("FL_AGGREGATION_PROGRAM") {
            self.aggregation.program = val;
        }
        if let Ok(val) = std::env::var("FL_AGGREGATION_SCRIPT") {
            self.aggregation.script = PathBuf::from(val);
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Round validation
        if self.round.checkin_limit == 0 {
            return Err(RoundError::config(
                "round.checkin_limit must be greater than 0",
            ));
        }
        if self.round.update_limit == 0 {
            return Err(RoundError::config(
                "round.update_limit must be greater than 0",
            ));
        }
        if self.round.round_timeout_ms == 0 {
            return Err(RoundError::config(
                "round.round_timeout_ms must be greater than 0",
            ));
        }

        // Storage validation
        if self.storage.buffer_size == 0 {
            return Err(RoundError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        // Artifact validation
        if self.artifacts.chunk_size == 0 {
            return Err(RoundError::config(
                "artifacts.chunk_size must be greater than 0",
            ));
        }
        if self.artifacts.checkpoint_path.as_os_str().is_empty() {
            return Err(RoundError::config(
                "artifacts.checkpoint_path must not be empty",
            ));
        }
        if !self.artifacts.update_path_template.contains(INDEX_PLACEHOLDER) {
            return Err(RoundError::config(format!(
                "artifacts.update_path_template must contain '{}'",
                INDEX_PLACEHOLDER
            )));
        }

        // Aggregation validation
        if self.aggregation.program.is_empty() {
            return Err(RoundError::config(
                "aggregation.program must not be empty",
            ));
        }

        Ok(())
    }
}
