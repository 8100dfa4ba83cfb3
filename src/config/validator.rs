use crate::config::{parse_duration, Config};
use crate::error::{InkpauseError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_trigger(config, &mut errors);
        Self::validate_audio(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(InkpauseError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let mode = &config.embedding.mode;
        if mode != "offline" && mode != "hash" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'offline' or 'hash', got '{}'", mode),
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.min_chunk_size == 0 {
            errors.push(ValidationError::new(
                "retrieval.min_chunk_size",
                "Minimum chunk size must be greater than 0",
            ));
        }

        if retrieval.chunk_size < retrieval.min_chunk_size {
            errors.push(ValidationError::new(
                "retrieval.chunk_size",
                format!(
                    "Chunk size ({}) must be at least min_chunk_size ({})",
                    retrieval.chunk_size, retrieval.min_chunk_size
                ),
            ));
        }

        if retrieval.chunk_overlap >= retrieval.chunk_size {
            errors.push(ValidationError::new(
                "retrieval.chunk_overlap",
                format!(
                    "Chunk overlap ({}) must be smaller than chunk_size ({})",
                    retrieval.chunk_overlap, retrieval.chunk_size
                ),
            ));
        }

        if retrieval.max_context_tokens == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_context_tokens",
                "Token budget must be greater than 0",
            ));
        }

        if retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }
    }

    fn validate_trigger(config: &Config, errors: &mut Vec<ValidationError>) {
        let interval = parse_duration(&config.trigger.interval);
        let check_interval = parse_duration(&config.trigger.check_interval);

        match interval {
            None => errors.push(ValidationError::new(
                "trigger.interval",
                format!("Invalid duration format: {}", config.trigger.interval),
            )),
            Some(d) if d.is_zero() => errors.push(ValidationError::new(
                "trigger.interval",
                "Interval must be greater than 0",
            )),
            _ => {}
        }

        match check_interval {
            None => errors.push(ValidationError::new(
                "trigger.check_interval",
                format!("Invalid duration format: {}", config.trigger.check_interval),
            )),
            Some(d) if d.is_zero() => errors.push(ValidationError::new(
                "trigger.check_interval",
                "Check interval must be greater than 0",
            )),
            _ => {}
        }

        if let (Some(interval), Some(check)) = (interval, check_interval) {
            if check > interval {
                errors.push(ValidationError::new(
                    "trigger.check_interval",
                    "Check interval cannot be longer than the trigger interval",
                ));
            }
        }
    }

    fn validate_audio(config: &Config, errors: &mut Vec<ValidationError>) {
        let volume = config.audio.volume;
        if !(0.0..=1.0).contains(&volume) {
            errors.push(ValidationError::new(
                "audio.volume",
                format!("Volume must be between 0.0 and 1.0, got {}", volume),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_mode() {
        let mut config = Config::default();
        config.embedding.mode = "invalid".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_empty_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::new();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk() {
        let mut config = Config::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_check_interval_longer_than_interval() {
        let mut config = Config::default();
        config.trigger.interval = "1s".to_string();
        config.trigger.check_interval = "2s".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::default();
        config.audio.volume = 3.0;
        config.retrieval.top_k = 0;
        config.trigger.interval = "later".to_string();

        match ConfigValidator::validate(&config) {
            Err(InkpauseError::ConfigValidation { errors }) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.iter().any(|e| e.path == "audio.volume"));
                assert!(errors.iter().any(|e| e.path == "retrieval.top_k"));
                assert!(errors.iter().any(|e| e.path == "trigger.interval"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
