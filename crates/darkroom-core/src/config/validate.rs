//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tools.resize.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tools.resize must not be empty".into(),
            ));
        }
        if self.tools.metadata.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tools.metadata must not be empty".into(),
            ));
        }
        if self.output.subfolder.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "output.subfolder must not be empty".into(),
            ));
        }
        if self.output.summary_file.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "output.summary_file must not be empty".into(),
            ));
        }
        if self.progress.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "progress.tick_ms must be > 0".into(),
            ));
        }
        if self.progress.window_ms < self.progress.tick_ms {
            return Err(ConfigError::ValidationError(
                "progress.window_ms must be >= progress.tick_ms".into(),
            ));
        }
        if self.pipeline.parallel_copies == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.parallel_copies must be > 0".into(),
            ));
        }
        if self.pipeline.cleanup_suffixes.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::ValidationError(
                "pipeline.cleanup_suffixes must not contain empty entries".into(),
            ));
        }
        Ok(())
    }
}
