//! Configuration management for Darkroom.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Darkroom.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External tool locations
    pub tools: ToolsConfig,

    /// Output folder settings
    pub output: OutputConfig,

    /// File selection by extension
    pub formats: FormatsConfig,

    /// Progress sampling
    pub progress: ProgressConfig,

    /// Stage settings and failure policies
    pub pipeline: PipelineConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.darkroom.darkroom/config.toml
    /// - Linux: ~/.config/darkroom/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\darkroom\config\config.toml
    ///
    /// Falls back to ~/.darkroom/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "darkroom", "darkroom")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".darkroom").join("config.toml")
            })
    }

    /// The run output folder: `<base>/<subfolder>`.
    ///
    /// The base is the configured `output.base_dir` (with ~ expansion) or the
    /// process temp directory, so the same config always yields the same path.
    pub fn output_dir(&self) -> PathBuf {
        let base = match &self.output.base_dir {
            Some(dir) => expand(dir),
            None => std::env::temp_dir(),
        };
        base.join(&self.output.subfolder)
    }

    /// Resolved resize tool path.
    pub fn resize_tool(&self) -> String {
        shellexpand::tilde(&self.tools.resize).into_owned()
    }

    /// Resolved metadata tool path.
    pub fn metadata_tool(&self) -> String {
        shellexpand::tilde(&self.tools.metadata).into_owned()
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.progress.tick_ms, 1000);
        assert_eq!(config.progress.window_ms, 5000);
        assert_eq!(config.output.summary_file, "metadata.json");
        assert_eq!(config.pipeline.cleanup_failures, FailurePolicy::FailFast);
        assert_eq!(config.pipeline.copy_failures, FailurePolicy::Tolerate);
        assert_eq!(config.progress.rate_mode, RateMode::Shared);
        assert!(config.progress.count_artifacts);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[tools]"));
        assert!(toml.contains("[progress]"));
        assert!(toml.contains("rate_mode = \"shared\""));
    }

    #[test]
    fn test_output_dir_defaults_to_temp() {
        let config = Config::default();
        assert_eq!(config.output_dir(), std::env::temp_dir().join("darkroom"));
    }

    #[test]
    fn test_output_dir_uses_base_override() {
        let mut config = Config::default();
        config.output.base_dir = Some(PathBuf::from("/srv/previews"));
        assert_eq!(config.output_dir(), PathBuf::from("/srv/previews/darkroom"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [progress]
            rate_mode = "independent"
            count_artifacts = false

            [pipeline]
            cleanup_failures = "tolerate"
            "#,
        )
        .unwrap();
        assert_eq!(config.progress.rate_mode, RateMode::Independent);
        assert_eq!(config.progress.tick_ms, 1000);
        assert!(!config.progress.count_artifacts);
        assert_eq!(config.pipeline.cleanup_failures, FailurePolicy::Tolerate);
        assert_eq!(config.pipeline.parallel_copies, 8);
    }

    #[test]
    fn test_eligible_extensions_case_insensitive() {
        let formats = FormatsConfig::default();
        assert!(formats.is_eligible(Path::new("a.CR2")));
        assert!(formats.is_eligible(Path::new("b.jpg")));
        assert!(formats.is_eligible(Path::new("c.Nef")));
        assert!(!formats.is_eligible(Path::new("d.jpeg")));
        assert!(!formats.is_eligible(Path::new("notes.txt")));
        assert!(!formats.is_eligible(Path::new("README")));
    }

    #[test]
    fn test_metadata_extensions() {
        let formats = FormatsConfig::default();
        assert!(formats.is_metadata_image(Path::new("x.jpeg")));
        assert!(formats.is_metadata_image(Path::new("x.TIFF")));
        assert!(!formats.is_metadata_image(Path::new("metadata.json")));
    }

    #[test]
    fn test_artifact_suffixes() {
        let pipeline = PipelineConfig::default();
        assert!(pipeline.is_artifact("a.jpg_original"));
        assert!(pipeline.is_artifact("a.jpg_exiftool_tmp"));
        assert!(!pipeline.is_artifact("original.jpg"));
    }
}
