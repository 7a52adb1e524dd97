//! Error types for the Darkroom preview pipeline.
//!
//! Errors are organized by stage so a failed run surfaces a single message
//! that names the tool, directory, or file involved.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Darkroom operations.
#[derive(Error, Debug)]
pub enum DarkroomError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// External tool failed to spawn or exited non-zero. Fatal to the run.
    #[error("{tool} failed: {message}\n{stderr}")]
    ToolExecution {
        tool: String,
        message: String,
        stderr: String,
    },

    /// A source or output directory could not be listed.
    #[error("Cannot read directory {path}: {message}")]
    DirectoryEnumeration { path: PathBuf, message: String },

    /// Metadata parse or tag copy failed for one file.
    #[error("Metadata error for {path}: {message}")]
    PerFileMetadata { path: PathBuf, message: String },

    /// A temporary artifact could not be deleted.
    #[error("Failed to delete {path}: {message}")]
    PerFileDeletion { path: PathBuf, message: String },

    /// The metadata summary document could not be written.
    #[error("Failed to write summary {path}: {message}")]
    SummaryWrite { path: PathBuf, message: String },

    /// The output directory watcher could not be started.
    #[error("Cannot watch {path}: {message}")]
    Watch { path: PathBuf, message: String },

    /// The progress task ended abnormally, so the processed count is unknown.
    #[error("Progress tracking failed: {message}")]
    Progress { message: String },

    /// A stage gave up before finishing; `elapsed_seconds` is the time it ran.
    #[error("{stage} failed after {elapsed_seconds:.2} seconds: {source}")]
    StageAborted {
        stage: String,
        elapsed_seconds: f64,
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Build a `DirectoryEnumeration` error from an I/O failure.
    pub fn enumeration(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::DirectoryEnumeration {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Convenience type alias for Darkroom results.
pub type Result<T> = std::result::Result<T, DarkroomError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
