//! Tuning knobs for ropes and documents

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::dim::FIELD_MAX;
use crate::rope_str::INLINE_CAP;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RopeConfig {
    /// Largest leaf built by chunked inserts
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Buffered `Doc` edits before an automatic flush
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// Snapshots kept for undo
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    /// Edits between compaction passes; 0 disables them
    #[serde(default = "default_compact_interval")]
    pub compact_interval: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_chunk_size() -> usize { 1024 }
fn default_flush_threshold() -> usize { 16 }
fn default_history_depth() -> usize { 100 }
fn default_compact_interval() -> usize { 64 }

impl Default for RopeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            flush_threshold: default_flush_threshold(),
            history_depth: default_history_depth(),
            compact_interval: default_compact_interval(),
        }
    }
}

impl RopeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RopeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no rope config found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded rope config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(INLINE_CAP + 1..=FIELD_MAX).contains(&self.chunk_size) {
            return Err(ConfigError::Invalid(format!(
                "chunk_size must be in {}..={}, got {}",
                INLINE_CAP + 1,
                FIELD_MAX,
                self.chunk_size
            )));
        }
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid(
                "flush_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RopeConfig::default();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.flush_threshold, 16);
        assert_eq!(config.history_depth, 100);
        assert_eq!(config.compact_interval, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = RopeConfig::from_toml_str("chunk_size = 256\n").unwrap();
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.flush_threshold, 16);

        let config = RopeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RopeConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            RopeConfig::from_toml_str("chunk_size = 16"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RopeConfig::from_toml_str("chunk_size = 4096"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RopeConfig::from_toml_str("flush_threshold = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RopeConfig::from_toml_str("chunk_size = \"big\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let config = RopeConfig::load("definitely/not/here/rope.toml").unwrap();
        assert_eq!(config, RopeConfig::default());
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join(format!("tiny-rope-config-{}.toml", std::process::id()));
        std::fs::write(&path, "history_depth = 5\ncompact_interval = 0\n").unwrap();
        let config = RopeConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.history_depth, 5);
        assert_eq!(config.compact_interval, 0);
    }
}
