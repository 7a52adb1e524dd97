//! Output folder watching.
//!
//! Reports every file that appears in the output folder after the watch
//! starts. Files already present are never reported.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::config::{Config, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};

/// Decides which new paths count as arrivals.
///
/// Every creation counts unless `progress.count_artifacts` is off, in which
/// case tool artifacts and the summary document are left out.
#[derive(Debug, Clone)]
pub struct ArrivalFilter {
    count_artifacts: bool,
    pipeline: PipelineConfig,
    summary_file: String,
}

impl ArrivalFilter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            count_artifacts: config.progress.count_artifacts,
            pipeline: config.pipeline.clone(),
            summary_file: config.output.summary_file.clone(),
        }
    }

    /// Whether `path` should be reported.
    pub fn accepts(&self, path: &Path) -> bool {
        if self.count_artifacts {
            return true;
        }
        let Some(name) = path.file_name() else {
            return true;
        };
        let name = name.to_string_lossy();
        name != self.summary_file.as_str() && !self.pipeline.is_artifact(&name)
    }
}

/// Watches one directory and forwards arrivals into a channel.
///
/// Dropping the watcher stops observation.
pub struct OutputWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl OutputWatcher {
    /// Create `dir` if needed and start forwarding arrivals to `tx`.
    pub fn start(
        dir: &Path,
        filter: ArrivalFilter,
        tx: mpsc::UnboundedSender<PathBuf>,
    ) -> PipelineResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| watch_error(dir, e))?;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for path in arrivals(&event) {
                        if filter.accepts(path) {
                            tracing::trace!("File added: {:?}", path);
                            // Receiver gone means the run is over.
                            let _ = tx.send(path.clone());
                        }
                    }
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        })
        .map_err(|e| watch_error(dir, e))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(dir, e))?;
        tracing::debug!("Watching {:?}", dir);

        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
        })
    }

}

impl Drop for OutputWatcher {
    fn drop(&mut self) {
        tracing::debug!("Stopped watching {:?}", self.dir);
    }
}

/// Paths that became present in the directory through `event`.
///
/// Tools commonly write a scratch file and rename it into place, so the
/// destination of a rename counts as a creation.
fn arrivals(event: &Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Create(_) => &event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => &event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().map(std::slice::from_ref).unwrap_or(&[])
        }
        _ => &[],
    }
}

fn watch_error(dir: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Watch {
        path: dir.to_path_buf(),
        message: err.to_string(),
    }
}
