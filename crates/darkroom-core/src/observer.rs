//! Observer port for run progress.
//!
//! The orchestrator and the rate sampler push [`RunEvent`]s through a shared
//! `Arc<dyn RunObserver>`. A UI can render them, a test can collect them.

use tokio::sync::mpsc;

use crate::types::RunEvent;

/// Receives run events. Implementations must not block.
pub trait RunObserver: Send + Sync {
    /// Called for every event, in emission order per producer.
    fn on_event(&self, event: RunEvent);
}

/// Forwards events into an unbounded channel.
///
/// A closed receiver is not an error: the run carries on without an audience.
impl RunObserver for mpsc::UnboundedSender<RunEvent> {
    fn on_event(&self, event: RunEvent) {
        let _ = self.send(event);
    }
}

/// Writes events to the log instead of a UI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_event(&self, event: RunEvent) {
        match &event {
            RunEvent::Started { total_files } => {
                tracing::info!("Run started: {} eligible file(s)", total_files)
            }
            RunEvent::FileProcessed {
                processed_files,
                path,
            } => tracing::debug!("[{}] {:?}", processed_files, path),
            RunEvent::RatePerSecond { files } => tracing::trace!("{} file(s)/s", files),
            RunEvent::RatePerFiveSeconds { rate } => tracing::trace!("{:.1} file(s)/s (5s)", rate),
            RunEvent::StageChanged { stage } => tracing::info!("Stage: {}", stage),
            RunEvent::Completed { report } => tracing::info!(
                "Run complete: {} file(s) in {:?}",
                report.processed_files,
                report.output_path
            ),
            RunEvent::Failed { message } => tracing::error!("Run failed: {}", message),
        }
    }
}
