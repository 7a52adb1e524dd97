//! Metadata propagation from source files to their derived previews.

use futures_util::stream::{self, StreamExt};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::FailurePolicy;
use crate::error::{PipelineError, PipelineResult};
use crate::tool::{args, ToolRunner};
use crate::types::CopyReport;

use super::list_names;

/// Extension the derived side is expected to carry. Case-sensitive.
const DERIVED_EXTENSION: &[u8] = b".jpg";

/// Copies all tags from each source file onto its derived JPEG.
pub struct MetadataCopier {
    runner: Arc<dyn ToolRunner>,
    tool: String,
    parallel: usize,
    policy: FailurePolicy,
}

/// A source file and the output file it will donate tags to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPair {
    pub source: PathBuf,
    pub derived: PathBuf,
}

impl MetadataCopier {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        tool: impl Into<String>,
        parallel: usize,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            runner,
            tool: tool.into(),
            parallel: parallel.max(1),
            policy,
        }
    }

    /// Pair every entry of `source_dir` with its preview in `output_dir` and
    /// copy tags across.
    ///
    /// Each directory is listed once. A listing failure fails the stage with
    /// `StageAborted`, which carries the time spent; a failed copy is handled
    /// according to the configured policy.
    pub async fn copy_all(
        &self,
        source_dir: &Path,
        output_dir: &Path,
    ) -> PipelineResult<CopyReport> {
        let start = Instant::now();
        tracing::info!("Starting metadata copy...");

        let listed = async {
            let sources = list_names(source_dir).await?;
            let outputs = list_names(output_dir).await?;
            Ok::<_, PipelineError>((sources, outputs))
        }
        .await;
        let (sources, outputs) = match listed {
            Ok(names) => names,
            Err(e) => {
                let elapsed_seconds = start.elapsed().as_secs_f64();
                tracing::error!(
                    "Metadata copy failed after {:.2} seconds: {}",
                    elapsed_seconds,
                    e
                );
                return Err(PipelineError::StageAborted {
                    stage: "metadata copy".to_string(),
                    elapsed_seconds,
                    source: Box::new(e),
                });
            }
        };

        let (pairs, unmatched) = pair_files(source_dir, &sources, output_dir, &outputs);
        for name in &unmatched {
            tracing::warn!("No matching JPG found for {}", name.to_string_lossy());
        }

        let attempted = pairs.len();
        let results: Vec<(CopyPair, PipelineResult<_>)> = stream::iter(pairs)
            .map(|pair| async move {
                let args = args::copy_tags(&pair.source, &pair.derived);
                let result = self.runner.run(&self.tool, &args).await;
                (pair, result)
            })
            .buffer_unordered(self.parallel)
            .collect()
            .await;

        let mut copied = 0;
        let mut first_failure = None;
        for (pair, result) in results {
            match result {
                Ok(output) => {
                    copied += 1;
                    tracing::debug!(
                        "Copied metadata from {:?} to {:?}: {}",
                        pair.source,
                        pair.derived,
                        output.combined_output.trim()
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Error copying metadata from {:?} to {:?}: {}",
                        pair.source,
                        pair.derived,
                        e
                    );
                    first_failure.get_or_insert(PipelineError::PerFileMetadata {
                        path: pair.derived,
                        message: e.to_string(),
                    });
                }
            }
        }

        let failed = attempted - copied;
        if let (FailurePolicy::FailFast, Some(err)) = (self.policy, first_failure) {
            return Err(err);
        }

        let elapsed_seconds = start.elapsed().as_secs_f64();
        tracing::info!(
            "Metadata copy completed in {:.2} seconds ({} copied, {} failed, {} skipped)",
            elapsed_seconds,
            copied,
            failed,
            unmatched.len()
        );

        Ok(CopyReport {
            success: true,
            elapsed_seconds,
            attempted,
            copied,
            failed,
            skipped: unmatched.len(),
        })
    }
}

/// Match source entries to output entries by stem.
///
/// A source's stem is its name minus the last extension; an output's is its
/// name minus a trailing `.jpg`. The first output with an equal stem wins.
/// Returns the pairs plus the names of unmatched sources.
pub fn pair_files(
    source_dir: &Path,
    sources: &[OsString],
    output_dir: &Path,
    outputs: &[OsString],
) -> (Vec<CopyPair>, Vec<OsString>) {
    let mut pairs = Vec::new();
    let mut unmatched = Vec::new();

    for source in sources {
        let stem = Path::new(source)
            .file_stem()
            .unwrap_or_default()
            .as_encoded_bytes();

        let derived = outputs.iter().find(|name| derived_stem(name) == stem);

        match derived {
            Some(name) => pairs.push(CopyPair {
                source: source_dir.join(source),
                derived: output_dir.join(name),
            }),
            None => unmatched.push(source.clone()),
        }
    }

    (pairs, unmatched)
}

/// An output name minus its trailing `.jpg`, compared byte-wise so names that
/// are not valid UTF-8 still pair.
fn derived_stem(name: &OsStr) -> &[u8] {
    let bytes = name.as_encoded_bytes();
    bytes.strip_suffix(DERIVED_EXTENSION).unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolOutput;
    use async_trait::async_trait;
    use std::ffi::OsString;
    use std::sync::Mutex;

    /// Records every invocation; fails for recipients whose name contains "bad".
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<OsString>>>,
    }

    #[async_trait]
    impl ToolRunner for RecordingRunner {
        async fn run(&self, tool: &str, args: &[OsString]) -> PipelineResult<ToolOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            let recipient = Path::new(args.last().unwrap()).file_name().unwrap();
            if recipient.to_string_lossy().contains("bad") {
                return Err(PipelineError::ToolExecution {
                    tool: tool.to_string(),
                    message: "exited with exit status: 1".to_string(),
                    stderr: "Error: corrupt".to_string(),
                });
            }
            Ok(ToolOutput {
                combined_output: "1 image files updated\n".to_string(),
            })
        }
    }

    fn names(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_pair_files_by_stem() {
        let (pairs, unmatched) = pair_files(
            Path::new("/src"),
            &names(&["a.cr2", "b.jpg", "c.nef", "notes.txt"]),
            Path::new("/out"),
            &names(&["a.jpg", "b.jpg", "c.JPG"]),
        );

        assert_eq!(
            pairs,
            vec![
                CopyPair {
                    source: PathBuf::from("/src/a.cr2"),
                    derived: PathBuf::from("/out/a.jpg"),
                },
                CopyPair {
                    source: PathBuf::from("/src/b.jpg"),
                    derived: PathBuf::from("/out/b.jpg"),
                },
            ]
        );
        // c.JPG keeps its uppercase extension, so its stem is "c.JPG"
        assert_eq!(unmatched, names(&["c.nef", "notes.txt"]));
    }

    #[test]
    fn test_pair_files_ignores_artifacts() {
        let (pairs, unmatched) = pair_files(
            Path::new("/src"),
            &names(&["a.cr2"]),
            Path::new("/out"),
            &names(&["a.jpg_original"]),
        );
        assert!(pairs.is_empty());
        assert_eq!(unmatched, names(&["a.cr2"]));
    }

    #[tokio::test]
    async fn test_copy_all_one_attempt_per_match() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["a.cr2", "b.jpg", "z.arw"] {
            std::fs::write(src.path().join(name), b"raw").unwrap();
        }
        for name in ["a.jpg", "b.jpg"] {
            std::fs::write(out.path().join(name), b"jpg").unwrap();
        }

        let runner = Arc::new(RecordingRunner::default());
        let copier = MetadataCopier::new(runner.clone(), "exiftool", 4, FailurePolicy::Tolerate);
        let report = copier.copy_all(src.path(), out.path()).await.unwrap();

        assert!(report.success);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped, 1);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c[0] == OsString::from("-tagsFromFile")));
    }

    #[tokio::test]
    async fn test_copy_failures_are_tolerated() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["bad.cr2", "good.cr2"] {
            std::fs::write(src.path().join(name), b"raw").unwrap();
        }
        for name in ["bad.jpg", "good.jpg"] {
            std::fs::write(out.path().join(name), b"jpg").unwrap();
        }

        let runner = Arc::new(RecordingRunner::default());
        let copier = MetadataCopier::new(runner, "exiftool", 2, FailurePolicy::Tolerate);
        let report = copier.copy_all(src.path(), out.path()).await.unwrap();

        assert!(report.success);
        assert_eq!(report.copied, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_copy_fail_fast_names_file() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("bad.cr2"), b"raw").unwrap();
        std::fs::write(out.path().join("bad.jpg"), b"jpg").unwrap();

        let runner = Arc::new(RecordingRunner::default());
        let copier = MetadataCopier::new(runner, "exiftool", 2, FailurePolicy::FailFast);
        let err = copier.copy_all(src.path(), out.path()).await.unwrap_err();

        match err {
            PipelineError::PerFileMetadata { path, .. } => {
                assert_eq!(path, out.path().join("bad.jpg"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_copy_missing_dir_fails() {
        let out = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let copier = MetadataCopier::new(runner, "exiftool", 2, FailurePolicy::Tolerate);
        let err = copier
            .copy_all(&out.path().join("missing"), out.path())
            .await
            .unwrap_err();
        match err {
            PipelineError::StageAborted {
                elapsed_seconds,
                source,
                ..
            } => {
                assert!(elapsed_seconds >= 0.0);
                assert!(matches!(*source, PipelineError::DirectoryEnumeration { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_pair_files_keeps_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let source = OsStr::from_bytes(b"caf\xe9.cr2").to_os_string();
        let output = OsStr::from_bytes(b"caf\xe9.jpg").to_os_string();
        let (pairs, unmatched) = pair_files(
            Path::new("/src"),
            &[source.clone()],
            Path::new("/out"),
            &[output.clone()],
        );

        assert!(unmatched.is_empty());
        assert_eq!(pairs[0].source, Path::new("/src").join(&source));
        assert_eq!(pairs[0].derived, Path::new("/out").join(&output));
    }
}
