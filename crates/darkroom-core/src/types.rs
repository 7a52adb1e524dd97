//! Core data types for the Darkroom pipeline.
//!
//! These types describe what a run produced: per-stage reports, the
//! metadata summary records, and the events streamed to an observer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// Metadata extracted from one output file.
///
/// Serialized as `{ "file": ..., "metadata": { tag: value, ... } }` into the
/// summary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// File name within the output folder
    pub file: String,

    /// Tag name to value, sorted by tag name
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Captured output of a successful tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// stdout, a newline, then stderr
    pub combined_output: String,
}

/// Result of the metadata copy stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyReport {
    /// True once every source entry has been attempted
    pub success: bool,
    pub elapsed_seconds: f64,
    /// Copy invocations issued (one per matched stem)
    pub attempted: usize,
    /// Invocations that succeeded
    pub copied: usize,
    /// Invocations that failed and were tolerated
    pub failed: usize,
    /// Source entries with no derived counterpart
    pub skipped: usize,
}

/// Result of the temp-file cleanup stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Artifacts deleted
    pub removed: usize,
    /// Deletions that failed and were tolerated
    pub failed: usize,
}

/// Result of the metadata extraction stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub success: bool,
    pub elapsed_seconds: f64,
    /// Summary document location, set when it was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file_path: Option<PathBuf>,
    /// Records written to the summary
    pub records: usize,
    /// Why the stage failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final report of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Combined output of the resize tool
    pub resize_log: String,
    /// Combined output of both preview extraction passes
    pub preview_log: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    /// Entries in the source folder
    pub total_files: usize,
    /// Eligible RAW/JPEG entries in the source folder
    pub filtered_files: usize,
    /// Distinct files observed arriving in the output folder
    pub processed_files: u64,
    /// Wall time of the two preview extraction passes
    pub preview_seconds: f64,
    pub metadata_copy: CopyReport,
    pub cleanup: CleanupReport,
    pub metadata_extraction: ExtractionReport,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
}

/// Pipeline state. Transitions are strictly in declaration order, except that
/// `Failed` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    Enumerating,
    Resizing,
    ExtractingPreviews(PreviewPass),
    CopyingMetadata,
    CleaningUp,
    ExtractingMetadata,
    Reported,
    Failed,
}

impl RunStage {
    /// Whether the run has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reported | Self::Failed)
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStage::Idle => write!(f, "idle"),
            RunStage::Enumerating => write!(f, "enumerating"),
            RunStage::Resizing => write!(f, "resizing"),
            RunStage::ExtractingPreviews(pass) => write!(f, "extracting previews ({pass})"),
            RunStage::CopyingMetadata => write!(f, "copying metadata"),
            RunStage::CleaningUp => write!(f, "cleaning up"),
            RunStage::ExtractingMetadata => write!(f, "extracting metadata"),
            RunStage::Reported => write!(f, "reported"),
            RunStage::Failed => write!(f, "failed"),
        }
    }
}

/// Which RAW family a preview extraction pass handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewPass {
    /// Canon and Sony: embedded `PreviewImage`
    CanonSony,
    /// Nikon: embedded `JpgFromRaw`
    Nikon,
}

impl std::fmt::Display for PreviewPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreviewPass::CanonSony => write!(f, "cr2/arw"),
            PreviewPass::Nikon => write!(f, "nef"),
        }
    }
}

/// Events streamed to a [`RunObserver`](crate::observer::RunObserver).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// The run began; `total_files` is the eligible count.
    Started { total_files: usize },

    /// A new file appeared in the output folder.
    FileProcessed { processed_files: u64, path: PathBuf },

    /// Arrivals during the last short window.
    RatePerSecond { files: u64 },

    /// Approximate per-second rate over the long window.
    RatePerFiveSeconds { rate: f64 },

    /// The pipeline moved to a new stage.
    StageChanged { stage: RunStage },

    /// The run finished.
    Completed { report: Box<RunReport> },

    /// The run failed; no further events follow.
    Failed { message: String },
}

impl RunEvent {
    /// Whether this event ends the event stream for a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
