//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Resize tool executable (invoked as `<tool> -i <source> -o <output>`)
    pub resize: String,

    /// Metadata tool executable (exiftool-compatible argument contract)
    pub metadata: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            resize: "sharp".to_string(),
            metadata: "exiftool".to_string(),
        }
    }
}

/// Output folder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Base directory for run output. Defaults to the system temp directory.
    pub base_dir: Option<PathBuf>,

    /// Fixed subfolder created under the base directory
    pub subfolder: String,

    /// Name of the consolidated metadata document
    pub summary_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            subfolder: "darkroom".to_string(),
            summary_file: "metadata.json".to_string(),
        }
    }
}

/// Extension sets used to select files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatsConfig {
    /// Source extensions counted as convertible
    pub eligible: Vec<String>,

    /// Output extensions scanned for metadata
    pub metadata: Vec<String>,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            eligible: ["cr2", "arw", "nef", "jpg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            metadata: ["jpg", "jpeg", "png", "tiff", "cr2", "arw", "nef"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl FormatsConfig {
    /// Whether `path` has one of the eligible source extensions.
    pub fn is_eligible(&self, path: &std::path::Path) -> bool {
        extension_in(path, &self.eligible)
    }

    /// Whether `path` has one of the metadata-bearing extensions.
    pub fn is_metadata_image(&self, path: &std::path::Path) -> bool {
        extension_in(path, &self.metadata)
    }
}

fn extension_in(path: &std::path::Path, set: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            set.iter().any(|fmt| fmt.to_lowercase() == ext_lower)
        })
        .unwrap_or(false)
}

/// How the five-second rate is accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    /// Both windows read the counter the one-second tick resets, so the
    /// five-second figure only reflects arrivals since the last tick.
    #[default]
    Shared,
    /// The five-second window keeps its own accumulator.
    Independent,
}

/// Progress sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Short rate window in milliseconds
    pub tick_ms: u64,

    /// Long rate window in milliseconds
    pub window_ms: u64,

    /// Grace period for trailing watcher events when a run stops
    pub settle_ms: u64,

    /// Counter sharing between the two windows
    pub rate_mode: RateMode,

    /// Count tool artifacts and the summary file as processed files.
    /// When off, only derived images move the counter.
    pub count_artifacts: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            window_ms: 5000,
            settle_ms: 250,
            rate_mode: RateMode::Shared,
            count_artifacts: true,
        }
    }
}

/// What a stage does when a single file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and keep going
    Tolerate,
    /// Fail the whole stage
    FailFast,
}

/// Pipeline stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max concurrent metadata copy invocations
    pub parallel_copies: usize,

    /// Name suffixes of tool artifacts removed after the copy stage
    pub cleanup_suffixes: Vec<String>,

    /// Per-file failure handling for the metadata copy stage
    pub copy_failures: FailurePolicy,

    /// Per-file failure handling for the metadata extraction stage
    pub extraction_failures: FailurePolicy,

    /// Per-file failure handling for the cleanup stage
    pub cleanup_failures: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_copies: 8,
            cleanup_suffixes: vec!["_exiftool_tmp".to_string(), "_original".to_string()],
            copy_failures: FailurePolicy::Tolerate,
            extraction_failures: FailurePolicy::Tolerate,
            cleanup_failures: FailurePolicy::FailFast,
        }
    }
}

impl PipelineConfig {
    /// Whether a file name is a tool artifact slated for cleanup.
    pub fn is_artifact(&self, name: &str) -> bool {
        self.cleanup_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
