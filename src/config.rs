//! Segment configuration
//!
//! Resolution order: built-in defaults, then the JSON file, then
//! environment overrides. The result is validated once after all three
//! are applied.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

pub const ENV_CHUNK_ROWS: &str = "SEGCORE_CHUNK_ROWS";
pub const ENV_RETRIEVE_LIMIT_BYTES: &str = "SEGCORE_RETRIEVE_LIMIT_BYTES";
pub const ENV_SKIP_INDEX: &str = "SEGCORE_SKIP_INDEX";
pub const ENV_MAX_TOPK: &str = "SEGCORE_MAX_TOPK";
pub const ENV_LOG: &str = "SEGCORE_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables of a segment and its query paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegcoreConfig {
    /// Rows per chunk of a growing segment
    pub chunk_rows: usize,
    /// Byte budget used when a retrieve caller passes none
    pub default_retrieve_limit_bytes: i64,
    /// Consult the skip index during predicate evaluation
    pub skip_index_enabled: bool,
    /// Upper bound on a search's top-k
    pub max_topk: usize,
    /// `tracing` filter directive for the binary
    pub log_filter: String,
}

impl Default for SegcoreConfig {
    fn default() -> Self {
        Self {
            chunk_rows: 8192,
            default_retrieve_limit_bytes: 64 * 1024 * 1024,
            skip_index_enabled: true,
            max_topk: 16384,
            log_filter: "info".to_string(),
        }
    }
}

impl SegcoreConfig {
    /// Loads the file at `path`, applies process environment overrides and
    /// validates the result
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: SegcoreConfig = serde_json::from_str(&content)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        let chunk_rows = config.chunk_rows.to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", &path.display().to_string()),
                ("chunk_rows", &chunk_rows),
            ],
        );
        Ok(config)
    }

    /// Defaults plus process environment overrides
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides found through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_CHUNK_ROWS) {
            self.chunk_rows = parse(ENV_CHUNK_ROWS, &v)?;
        }
        if let Some(v) = lookup(ENV_RETRIEVE_LIMIT_BYTES) {
            self.default_retrieve_limit_bytes = parse(ENV_RETRIEVE_LIMIT_BYTES, &v)?;
        }
        if let Some(v) = lookup(ENV_SKIP_INDEX) {
            self.skip_index_enabled = parse_bool(ENV_SKIP_INDEX, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_TOPK) {
            self.max_topk = parse(ENV_MAX_TOPK, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG) {
            self.log_filter = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.chunk_rows == 0 {
            return Err(ConfigError::invalid("chunk_rows", "must be > 0"));
        }
        if self.max_topk == 0 {
            return Err(ConfigError::invalid("max_topk", "must be > 0"));
        }
        if self.default_retrieve_limit_bytes <= 0 {
            return Err(ConfigError::invalid(
                "default_retrieve_limit_bytes",
                "must be > 0",
            ));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("'{}' is not a boolean", other))),
    }
}
