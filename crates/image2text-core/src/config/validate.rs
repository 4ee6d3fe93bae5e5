//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.max_length == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_length must be > 0".into(),
            ));
        }
        if self.generation.num_beams == 0 {
            return Err(ConfigError::ValidationError(
                "generation.num_beams must be >= 1".into(),
            ));
        }
        if !(self.generation.temperature > 0.0 && self.generation.temperature <= 1.0) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be in (0.0, 1.0]".into(),
            ));
        }
        if self.safety.caution_threshold > self.safety.block_threshold {
            return Err(ConfigError::ValidationError(
                "safety.caution_threshold must not exceed safety.block_threshold".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.safety.block_threshold) {
            return Err(ConfigError::ValidationError(
                "safety.block_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.seo.meta_max_chars < 4 {
            return Err(ConfigError::ValidationError(
                "seo.meta_max_chars must be >= 4".into(),
            ));
        }
        if self.batch.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "batch.parallel_workers must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.caption_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.caption_timeout_ms must be > 0".into(),
            ));
        }
        if self.models.safety.labels.is_empty() {
            return Err(ConfigError::ValidationError(
                "models.safety.labels must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel_workers() {
        let mut config = Config::default();
        config.batch.parallel_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel_workers"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.caption_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("caption_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_invalid_temperature() {
        let mut config = Config::default();
        config.generation.temperature = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));

        config.generation.temperature = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.safety.caution_threshold = 0.95;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("caution_threshold"));
    }
}
