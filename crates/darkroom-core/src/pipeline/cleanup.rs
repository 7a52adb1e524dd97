//! Removal of temporary and backup files left behind by the metadata tool.

use futures_util::future::join_all;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::{FailurePolicy, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::types::CleanupReport;

use super::list_names;

/// Deletes output entries whose names end in one of the artifact suffixes.
///
/// Failures follow `cleanup_failures`.
pub struct TempFileCleaner {
    config: PipelineConfig,
}

impl TempFileCleaner {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Entries of `names` that are tool artifacts.
    pub fn candidates<'a>(&self, names: &'a [OsString]) -> Vec<&'a OsString> {
        names
            .iter()
            .filter(|name| self.config.is_artifact(&name.to_string_lossy()))
            .collect()
    }

    /// Delete every artifact in `dir`.
    ///
    /// All deletions run concurrently and are awaited before returning. Under
    /// `FailFast` any failure fails the stage with a `PerFileDeletion` error
    /// naming the first file (by name order) that could not be removed.
    pub async fn clean(&self, dir: &Path) -> PipelineResult<CleanupReport> {
        let names = list_names(dir).await.inspect_err(|e| {
            tracing::error!("Error reading directory for cleanup: {}", e);
        })?;

        let targets: Vec<PathBuf> = self
            .candidates(&names)
            .into_iter()
            .map(|name| dir.join(name))
            .collect();

        let results = join_all(targets.into_iter().map(|path| async move {
            let result = tokio::fs::remove_file(&path).await;
            (path, result)
        }))
        .await;

        let mut report = CleanupReport::default();
        let mut first_failure = None;
        for (path, result) in results {
            match result {
                Ok(()) => {
                    report.removed += 1;
                    tracing::debug!("Deleted temporary file: {:?}", path);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Error deleting file {:?}: {}", path, e);
                    first_failure.get_or_insert(PipelineError::PerFileDeletion {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        if let (FailurePolicy::FailFast, Some(err)) =
            (self.config.cleanup_failures, first_failure)
        {
            tracing::error!("Error during cleanup: {}", err);
            return Err(err);
        }

        tracing::info!("Cleanup completed ({} removed)", report.removed);
        Ok(report)
    }
}
