//! Configuration management
//!
//! Loads the TOML configuration, applies `INKPAUSE_SECTION__KEY` environment
//! overrides and validates the result before anything else is constructed.

use crate::error::{InkpauseError, Result};
use crate::trigger::BatchTriggerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub trigger: TriggerConfig,
    pub audio: AudioConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub mode: String, // "offline" (fastembed) or "hash"
    pub dimension: usize,
}

/// Chunking and context assembly settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Documents shorter than this (in chars) are not indexed at all
    pub min_document_length: usize,
    /// Smallest chunk that may be stored
    pub min_chunk_size: usize,
    /// Target window size in chars
    pub chunk_size: usize,
    /// Chars shared between consecutive windows
    pub chunk_overlap: usize,
    /// Default token budget for `get_context`
    pub max_context_tokens: usize,
    /// Nearest neighbours fetched before filtering
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_document_length: 100,
            min_chunk_size: 100,
            chunk_size: 500,
            chunk_overlap: 100,
            max_context_tokens: 1500,
            top_k: 8,
        }
    }
}

/// Batch trigger timing, as duration strings ("3s", "500ms")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub interval: String,
    pub check_interval: String,
}

impl TriggerConfig {
    /// Parse into the runtime trigger configuration
    pub fn to_batch_config(&self) -> Result<BatchTriggerConfig> {
        let interval = parse_duration(&self.interval).ok_or_else(|| {
            InkpauseError::InvalidConfigValue {
                path: "trigger.interval".to_string(),
                message: format!("Cannot parse '{}' as a duration", self.interval),
            }
        })?;
        let check_interval = parse_duration(&self.check_interval).ok_or_else(|| {
            InkpauseError::InvalidConfigValue {
                path: "trigger.check_interval".to_string(),
                message: format!("Cannot parse '{}' as a duration", self.check_interval),
            }
        })?;
        Ok(BatchTriggerConfig::new(interval, check_interval))
    }
}

/// Audio playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub volume: f32,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InkpauseError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| InkpauseError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| InkpauseError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: INKPAUSE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("INKPAUSE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "EMBEDDING__MODE" => {
                self.embedding.mode = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "RETRIEVAL__MAX_CONTEXT_TOKENS" => {
                self.retrieval.max_context_tokens = parse_number(path, value)?;
            }
            "RETRIEVAL__TOP_K" => {
                self.retrieval.top_k = parse_number(path, value)?;
            }
            "TRIGGER__INTERVAL" => {
                self.trigger.interval = value.to_string();
            }
            "TRIGGER__CHECK_INTERVAL" => {
                self.trigger.check_interval = value.to_string();
            }
            "AUDIO__VOLUME" => {
                self.audio.volume = value.parse().map_err(|_| InkpauseError::InvalidConfigValue {
                    path: path.to_string(),
                    message: format!("Cannot parse '{}' as a number", value),
                })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| InkpauseError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("inkpause").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| InkpauseError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".inkpause"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.inkpause"),
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                mode: "offline".to_string(),
                dimension: 384,
            },
            retrieval: RetrievalConfig::default(),
            trigger: TriggerConfig {
                interval: "3s".to_string(),
                check_interval: "500ms".to_string(),
            },
            audio: AudioConfig { volume: 1.0 },
        }
    }
}

fn parse_number(path: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| InkpauseError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}' as an integer", value),
    })
}

/// Parse duration strings like "500ms", "3s", "2m", "1h" or a bare number of seconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let secs = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return None,
    };
    Some(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("4"), Some(Duration::from_secs(4)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("3 days"), None);
    }

    #[test]
    fn test_default_trigger_config() {
        let config = Config::default();
        let trigger = config.trigger.to_batch_config().unwrap();
        assert_eq!(trigger.interval(), Duration::from_secs(3));
        assert_eq!(trigger.check_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.retrieval.top_k = 4;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.top_k, 4);
        assert_eq!(loaded.embedding.model, "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_missing_config_file() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(InkpauseError::ConfigNotFound { .. })));
    }
}
