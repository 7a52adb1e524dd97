//! Preview pipeline components.
//!
//! This module contains every stage of a run plus the machinery that runs
//! alongside them:
//! - **discovery**: Count eligible files in the source folder
//! - **watcher**: Report files appearing in the output folder
//! - **rate**: Progress counters and throughput sampling
//! - **copier**: Copy tags from source files onto derived previews
//! - **cleanup**: Remove tool artifacts
//! - **metadata**: Extract EXIF into the summary document
//! - **orchestrator**: Sequences the stages of a run

pub mod cleanup;
pub mod copier;
pub mod discovery;
pub mod metadata;
pub mod orchestrator;
pub mod rate;
pub mod watcher;

// Re-exports for convenient access
pub use cleanup::TempFileCleaner;
pub use copier::MetadataCopier;
pub use discovery::{SourceDiscovery, SourceInventory};
pub use metadata::MetadataExtractor;
pub use orchestrator::PipelineOrchestrator;
pub use rate::{ProgressState, RateSampler, SamplerHandle};
pub use watcher::{ArrivalFilter, OutputWatcher};

use std::ffi::OsString;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Names of all entries in `dir`, sorted.
///
/// Names stay `OsString` so joining them back onto `dir` always addresses the
/// real entry; callers convert lossily only to compare or log.
pub(crate) async fn list_names(dir: &Path) -> PipelineResult<Vec<OsString>> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::enumeration(dir, e))?;

    let mut names = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| PipelineError::enumeration(dir, e))?
    {
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names)
}
