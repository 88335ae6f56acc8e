//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caption.num_beams == 0 {
            return Err(ConfigError::ValidationError(
                "caption.num_beams must be > 0".into(),
            ));
        }
        if self.caption.max_length == 0 {
            return Err(ConfigError::ValidationError(
                "caption.max_length must be > 0".into(),
            ));
        }
        if self.caption.min_length > self.caption.max_length {
            return Err(ConfigError::ValidationError(
                "caption.min_length must not exceed caption.max_length".into(),
            ));
        }
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "logging.level must be one of error/warn/info/debug/trace, got {other:?}"
                )));
            }
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "logging.format must be \"pretty\" or \"json\", got {other:?}"
                )));
            }
        }
        Ok(())
    }
}
