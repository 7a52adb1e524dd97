//! Pipeline orchestration - sequences the stages of a run.
//!
//! ```text
//! Enumerate → watch + resize → previews (CR2/ARW, NEF) → copy tags → cleanup → extract → report
//! ```
//!
//! Stages run one after another; the output watcher and the rate sampler run
//! alongside every stage from the resize pass on, and are stopped whether the
//! run completes or fails.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::PipelineResult;
use crate::observer::RunObserver;
use crate::tool::{args, display_args, ProcessToolRunner, ToolRunner};
use crate::types::{PreviewPass, RunEvent, RunReport, RunStage};

use super::cleanup::TempFileCleaner;
use super::copier::MetadataCopier;
use super::discovery::SourceDiscovery;
use super::metadata::MetadataExtractor;
use super::rate::{ProgressState, RateSampler, SamplerHandle};
use super::watcher::{ArrivalFilter, OutputWatcher};

/// Runs the full preview pipeline against a source folder.
pub struct PipelineOrchestrator {
    config: Config,
    runner: Arc<dyn ToolRunner>,
    observer: Arc<dyn RunObserver>,
}

/// Per-run bookkeeping: where the run is and who is listening.
struct ActiveRun<'a> {
    stage: RunStage,
    observer: &'a dyn RunObserver,
}

impl ActiveRun<'_> {
    fn enter(&mut self, stage: RunStage) {
        debug_assert!(!self.stage.is_terminal(), "run already ended");
        tracing::info!("Stage: {} → {}", self.stage, stage);
        self.stage = stage;
        self.observer.on_event(RunEvent::StageChanged { stage });
    }
}

/// Watcher and sampler for the lifetime of a run.
struct Tracking {
    watcher: OutputWatcher,
    sampler: SamplerHandle,
}

impl Tracking {
    /// Stop sampling, then stop watching.
    ///
    /// The watcher stays alive while the sampler settles so trailing events
    /// still land.
    async fn stop(self) -> PipelineResult<ProgressState> {
        let state = self.sampler.stop().await;
        drop(self.watcher);
        state
    }
}

impl PipelineOrchestrator {
    /// Create an orchestrator with an explicit tool runner.
    pub fn new(
        config: Config,
        runner: Arc<dyn ToolRunner>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            config,
            runner,
            observer,
        }
    }

    /// Create an orchestrator that spawns the real tools.
    pub fn with_process_runner(config: Config, observer: Arc<dyn RunObserver>) -> Self {
        Self::new(config, Arc::new(ProcessToolRunner), observer)
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline for `source`.
    ///
    /// Emits exactly one terminal event: `Completed` with the report, or
    /// `Failed` with the error message. The same outcome is returned.
    pub async fn run(&self, source: &Path) -> PipelineResult<RunReport> {
        let started_at = SystemTime::now();
        let start = Instant::now();
        let mut run = ActiveRun {
            stage: RunStage::Idle,
            observer: self.observer.as_ref(),
        };
        let mut tracking = None;

        let result = self
            .execute(&mut run, &mut tracking, source, started_at)
            .await;

        let progress = match tracking {
            Some(tracking) => tracking.stop().await.map(|state| state.processed_files()),
            None => Ok(0),
        };

        // A stage error wins over a progress error.
        let result = result.and_then(|report| progress.map(|processed| (report, processed)));

        match result {
            Ok((mut report, processed_files)) => {
                report.processed_files = processed_files;
                report.finished_at = SystemTime::now();
                run.enter(RunStage::Reported);
                tracing::info!(
                    "Processed {} file(s) from {:?} in {:.2}s",
                    processed_files,
                    source,
                    start.elapsed().as_secs_f64()
                );
                self.observer.on_event(RunEvent::Completed {
                    report: Box::new(report.clone()),
                });
                Ok(report)
            }
            Err(e) => {
                run.enter(RunStage::Failed);
                tracing::error!("Run failed: {}", e);
                self.observer.on_event(RunEvent::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut ActiveRun<'_>,
        tracking: &mut Option<Tracking>,
        source: &Path,
        started_at: SystemTime,
    ) -> PipelineResult<RunReport> {
        let config = &self.config;

        run.enter(RunStage::Enumerating);
        let inventory = SourceDiscovery::new(config.formats.clone()).scan(source)?;
        tracing::info!(
            "Total files: {}, eligible: {}",
            inventory.total_files(),
            inventory.filtered_files()
        );

        let output = config.output_dir();
        let (arrivals_tx, arrivals_rx) = mpsc::unbounded_channel();
        let watcher =
            OutputWatcher::start(&output, ArrivalFilter::from_config(config), arrivals_tx)?;
        let sampler = RateSampler::spawn(&config.progress, arrivals_rx, self.observer.clone());
        *tracking = Some(Tracking { watcher, sampler });

        self.observer.on_event(RunEvent::Started {
            total_files: inventory.filtered_files(),
        });

        run.enter(RunStage::Resizing);
        let resize_log = self
            .invoke(&config.resize_tool(), args::resize(source, &output))
            .await?;

        let preview_start = Instant::now();
        let mut preview_logs = Vec::new();
        for pass in [PreviewPass::CanonSony, PreviewPass::Nikon] {
            run.enter(RunStage::ExtractingPreviews(pass));
            let log = self
                .invoke(&config.metadata_tool(), args::previews(pass, source, &output))
                .await?;
            preview_logs.push(log);
        }
        let preview_seconds = preview_start.elapsed().as_secs_f64();
        tracing::info!("Preview extraction time: {:.2} seconds", preview_seconds);

        run.enter(RunStage::CopyingMetadata);
        let metadata_copy = MetadataCopier::new(
            self.runner.clone(),
            config.metadata_tool(),
            config.pipeline.parallel_copies,
            config.pipeline.copy_failures,
        )
        .copy_all(source, &output)
        .await?;

        run.enter(RunStage::CleaningUp);
        let cleanup = TempFileCleaner::new(config.pipeline.clone())
            .clean(&output)
            .await?;

        run.enter(RunStage::ExtractingMetadata);
        let metadata_extraction = MetadataExtractor::new(
            config.formats.clone(),
            config.output.summary_file.clone(),
            config.pipeline.extraction_failures,
        )
        .extract_dir(&output)
        .await;

        Ok(RunReport {
            resize_log,
            preview_log: preview_logs.join("\n"),
            source_path: source.to_path_buf(),
            output_path: output,
            total_files: inventory.total_files(),
            filtered_files: inventory.filtered_files(),
            processed_files: 0,
            preview_seconds,
            metadata_copy,
            cleanup,
            metadata_extraction,
            started_at,
            finished_at: started_at,
        })
    }

    async fn invoke(&self, tool: &str, args: Vec<OsString>) -> PipelineResult<String> {
        tracing::info!("Running {} with arguments: {}", tool, display_args(&args));
        let output = self.runner.run(tool, &args).await?;
        tracing::debug!("{} log:\n{}", tool, output.combined_output.trim_end());
        Ok(output.combined_output)
    }
}
