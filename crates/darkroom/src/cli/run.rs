//! The `darkroom run` command.
//!
//! Runs the pipeline against one source folder, renders run events as a
//! progress bar, and prints a summary once the run ends.

use anyhow::Context;
use clap::Args;
use darkroom_core::{Config, PipelineOrchestrator, RunEvent, RunReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Folder with RAW and JPEG files (prompted for when omitted)
    pub source: Option<PathBuf>,

    /// Base directory for the output folder (defaults to the temp dir)
    #[arg(long)]
    pub output_base: Option<PathBuf>,

    /// Resize tool executable
    #[arg(long, env = "DARKROOM_RESIZE_TOOL")]
    pub resize_tool: Option<String>,

    /// Metadata tool executable
    #[arg(long, env = "DARKROOM_METADATA_TOOL")]
    pub metadata_tool: Option<String>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    /// Layer command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(base) = &self.output_base {
            config.output.base_dir = Some(base.clone());
        }
        if let Some(tool) = &self.resize_tool {
            config.tools.resize = tool.clone();
        }
        if let Some(tool) = &self.metadata_tool {
            config.tools.metadata = tool.clone();
        }
        config.validate()?;
        Ok(())
    }
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config)?;

    let source = match &args.source {
        Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned()),
        None => match super::select::pick_folder()? {
            Some(path) => path,
            None => {
                eprintln!("No folder selected.");
                return Ok(());
            }
        },
    };

    let (tx, rx) = mpsc::unbounded_channel::<RunEvent>();
    let render = tokio::spawn(render_progress(rx, create_progress_bar()?));

    let orchestrator = PipelineOrchestrator::with_process_runner(config, Arc::new(tx));
    let result = orchestrator.run(&source).await;

    // Dropping the orchestrator closes the event channel.
    drop(orchestrator);
    if let Err(e) = render.await {
        tracing::warn!("Progress display stopped early: {e}");
    }

    let report = result.with_context(|| format!("Run failed for {}", source.display()))?;
    print_summary(&report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        eprintln!("  Report written to {}", path.display());
    }

    Ok(())
}

/// Progress bar state driven by run events.
struct ProgressView {
    bar: ProgressBar,
    per_second: u64,
    per_five_seconds: f64,
}

impl ProgressView {
    fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            per_second: 0,
            per_five_seconds: 0.0,
        }
    }

    /// Apply one event. Returns `false` once the run has ended.
    fn apply(&mut self, event: &RunEvent) -> bool {
        if event.is_terminal() {
            self.bar.finish_and_clear();
            return false;
        }
        match event {
            RunEvent::Started { total_files } => self.bar.set_length(*total_files as u64),
            RunEvent::FileProcessed {
                processed_files, ..
            } => self.bar.set_position(*processed_files),
            RunEvent::RatePerSecond { files } => {
                self.per_second = *files;
                self.refresh_message();
            }
            RunEvent::RatePerFiveSeconds { rate } => {
                self.per_five_seconds = *rate;
                self.refresh_message();
            }
            RunEvent::StageChanged { stage } => self.bar.set_prefix(stage.to_string()),
            RunEvent::Completed { .. } | RunEvent::Failed { .. } => {}
        }
        true
    }

    fn refresh_message(&self) {
        self.bar.set_message(format!(
            "{} files/sec ({:.1}/sec over 5s)",
            self.per_second, self.per_five_seconds
        ));
    }
}

async fn render_progress(mut rx: mpsc::UnboundedReceiver<RunEvent>, bar: ProgressBar) {
    let mut view = ProgressView::new(bar);
    while let Some(event) = rx.recv().await {
        if !view.apply(&event) {
            break;
        }
    }
    view.bar.finish_and_clear();
}

fn create_progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("##-"),
    );
    pb.set_message("starting...");
    Ok(pb)
}

/// Print a formatted summary table after a completed run.
fn print_summary(report: &RunReport) {
    let duration = report
        .finished_at
        .duration_since(report.started_at)
        .unwrap_or_default();

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Source files:   {:>8}", report.total_files);
    eprintln!("    Eligible:       {:>8}", report.filtered_files);
    eprintln!("    Previews:       {:>8}", report.processed_files);
    eprintln!("    Tags copied:    {:>8}", report.metadata_copy.copied);
    if report.metadata_copy.failed > 0 {
        eprintln!("    Copy failures:  {:>8}", report.metadata_copy.failed);
    }
    if report.metadata_copy.skipped > 0 {
        eprintln!("    No preview:     {:>8}", report.metadata_copy.skipped);
    }
    eprintln!("    Cleaned up:     {:>8}", report.cleanup.removed);
    eprintln!(
        "    Metadata:       {:>8}",
        report.metadata_extraction.records
    );
    if let Some(error) = &report.metadata_extraction.error {
        eprintln!("    Metadata error: {error}");
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Previews took:  {:>7.1}s", report.preview_seconds);
    eprintln!("    Duration:       {:>7.1}s", duration.as_secs_f64());
    eprintln!("  ====================================");
    eprintln!("    Output: {}", report.output_path.display());
}
