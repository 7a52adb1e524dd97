//! Progress counting and throughput sampling.
//!
//! All progress bookkeeping lives in one task: the watcher feeds it paths over
//! a channel, two interval timers sample it, and the orchestrator stops it
//! when the run ends. Nothing else touches [`ProgressState`], so it needs no
//! lock.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::{ProgressConfig, RateMode};
use crate::error::{PipelineError, PipelineResult};
use crate::observer::RunObserver;
use crate::types::RunEvent;

/// Counters for one run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    seen: HashSet<PathBuf>,
    window_files: u64,
    long_window_files: u64,
    mode: RateMode,
    long_window_secs: f64,
}

impl ProgressState {
    pub fn new(mode: RateMode, long_window: Duration) -> Self {
        Self {
            seen: HashSet::new(),
            window_files: 0,
            long_window_files: 0,
            mode,
            long_window_secs: long_window.as_secs_f64(),
        }
    }

    /// Count `path` if it has not been seen this run.
    ///
    /// Returns the new processed total, or `None` for a repeat.
    pub fn record_arrival(&mut self, path: PathBuf) -> Option<u64> {
        if !self.seen.insert(path) {
            return None;
        }
        self.window_files += 1;
        self.long_window_files += 1;
        Some(self.processed_files())
    }

    /// Distinct arrivals so far. Never decreases.
    pub fn processed_files(&self) -> u64 {
        self.seen.len() as u64
    }

    /// Close the short window: return its count and start a new one.
    pub fn close_window(&mut self) -> u64 {
        std::mem::take(&mut self.window_files)
    }

    /// Close the long window and return its per-second rate.
    ///
    /// In `Shared` mode this reads the short-window counter, which the short
    /// tick keeps resetting, so the result covers only arrivals since the last
    /// short tick. `Independent` mode uses its own accumulator.
    pub fn close_long_window(&mut self) -> f64 {
        let files = match self.mode {
            RateMode::Shared => self.window_files,
            RateMode::Independent => std::mem::take(&mut self.long_window_files),
        };
        files as f64 / self.long_window_secs
    }
}

/// Spawns the progress task for a run.
pub struct RateSampler;

/// Handle to a running progress task.
pub struct SamplerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<ProgressState>,
}

impl RateSampler {
    /// Start sampling arrivals from `arrivals`, reporting to `observer`.
    ///
    /// Both timers first fire one full period after the call.
    pub fn spawn(
        config: &ProgressConfig,
        mut arrivals: mpsc::UnboundedReceiver<PathBuf>,
        observer: Arc<dyn RunObserver>,
    ) -> SamplerHandle {
        let tick_period = Duration::from_millis(config.tick_ms);
        let window_period = Duration::from_millis(config.window_ms);
        let settle = Duration::from_millis(config.settle_ms);
        let mut state = ProgressState::new(config.rate_mode, window_period);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let mut tick = interval_at(start + tick_period, tick_period);
            let mut window = interval_at(start + window_period, window_period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            window.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // The long window is polled before the short one so that when
                // both are due it reads the counter before the reset.
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    Some(path) = arrivals.recv() => {
                        record(&mut state, path, observer.as_ref());
                    }
                    _ = window.tick() => {
                        let rate = state.close_long_window();
                        observer.on_event(RunEvent::RatePerFiveSeconds { rate });
                    }
                    _ = tick.tick() => {
                        let files = state.close_window();
                        observer.on_event(RunEvent::RatePerSecond { files });
                    }
                }
            }

            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            while let Ok(path) = arrivals.try_recv() {
                record(&mut state, path, observer.as_ref());
            }
            state
        });

        SamplerHandle {
            stop: stop_tx,
            task,
        }
    }
}

fn record(state: &mut ProgressState, path: PathBuf, observer: &dyn RunObserver) {
    if let Some(processed_files) = state.record_arrival(path.clone()) {
        tracing::debug!("File added: {:?}", path);
        observer.on_event(RunEvent::FileProcessed {
            processed_files,
            path,
        });
    }
}

impl SamplerHandle {
    /// Stop both timers and return the final counters.
    ///
    /// Fails when the sampling task panicked or was cancelled, since the
    /// counters died with it.
    pub async fn stop(self) -> PipelineResult<ProgressState> {
        let _ = self.stop.send(());
        self.task.await.map_err(|e| {
            tracing::error!("Progress task ended abnormally: {}", e);
            PipelineError::Progress {
                message: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(rx: &mut mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn rates_per_five(events: &[RunEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::RatePerFiveSeconds { rate } => Some(*rate),
                _ => None,
            })
            .collect()
    }

    fn config(mode: RateMode) -> ProgressConfig {
        ProgressConfig {
            rate_mode: mode,
            ..ProgressConfig::default()
        }
    }

    #[test]
    fn test_state_counts_distinct_paths() {
        let mut state = ProgressState::new(RateMode::Shared, Duration::from_secs(5));
        assert_eq!(state.record_arrival(PathBuf::from("a.jpg")), Some(1));
        assert_eq!(state.record_arrival(PathBuf::from("a.jpg")), None);
        assert_eq!(state.record_arrival(PathBuf::from("b.jpg")), Some(2));
        assert_eq!(state.processed_files(), 2);
    }

    #[test]
    fn test_state_short_window_resets() {
        let mut state = ProgressState::new(RateMode::Shared, Duration::from_secs(5));
        state.record_arrival(PathBuf::from("a.jpg"));
        state.record_arrival(PathBuf::from("b.jpg"));
        assert_eq!(state.close_window(), 2);
        assert_eq!(state.close_window(), 0);
        // Processed total is unaffected by window resets
        assert_eq!(state.processed_files(), 2);
    }

    #[test]
    fn test_state_shared_long_window_reads_short_counter() {
        let mut state = ProgressState::new(RateMode::Shared, Duration::from_secs(5));
        for name in ["a", "b", "c", "d", "e"] {
            state.record_arrival(PathBuf::from(name));
        }
        state.close_window();
        state.record_arrival(PathBuf::from("f"));
        assert_eq!(state.close_long_window(), 0.2);
        // Shared mode does not consume the counter
        assert_eq!(state.close_window(), 1);
    }

    #[test]
    fn test_state_independent_long_window() {
        let mut state = ProgressState::new(RateMode::Independent, Duration::from_secs(5));
        for name in ["a", "b", "c", "d", "e"] {
            state.record_arrival(PathBuf::from(name));
        }
        state.close_window();
        assert_eq!(state.close_long_window(), 1.0);
        assert_eq!(state.close_long_window(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_reports_short_window() {
        let (arrive_tx, arrive_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
        let handle = RateSampler::spawn(
            &config(RateMode::Shared),
            arrive_rx,
            Arc::new(event_tx),
        );

        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            arrive_tx.send(PathBuf::from(name)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let events = collect(&mut event_rx);
        let processed: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::FileProcessed {
                    processed_files, ..
                } => Some(*processed_files),
                _ => None,
            })
            .collect();
        assert_eq!(processed, vec![1, 2, 3]);
        assert!(matches!(
            events.last(),
            Some(RunEvent::RatePerSecond { files: 3 })
        ));

        let state = handle.stop().await.unwrap();
        assert_eq!(state.processed_files(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_shared_vs_independent_long_window() {
        for (mode, expected) in [(RateMode::Shared, 0.4), (RateMode::Independent, 1.0)] {
            let (arrive_tx, arrive_rx) = mpsc::unbounded_channel();
            let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
            let handle = RateSampler::spawn(&config(mode), arrive_rx, Arc::new(event_tx));

            for name in ["a", "b", "c"] {
                arrive_tx.send(PathBuf::from(name)).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(4500)).await;
            for name in ["d", "e"] {
                arrive_tx.send(PathBuf::from(name)).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(600)).await;

            let events = collect(&mut event_rx);
            assert_eq!(rates_per_five(&events), vec![expected], "{:?}", mode);
            handle.stop().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_drains_queued_arrivals_and_ends_timers() {
        let (arrive_tx, arrive_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
        let handle = RateSampler::spawn(
            &config(RateMode::Shared),
            arrive_rx,
            Arc::new(event_tx),
        );

        arrive_tx.send(PathBuf::from("a.jpg")).unwrap();
        arrive_tx.send(PathBuf::from("a.jpg")).unwrap();
        arrive_tx.send(PathBuf::from("b.jpg")).unwrap();
        let state = handle.stop().await.unwrap();
        assert_eq!(state.processed_files(), 2);

        collect(&mut event_rx);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(collect(&mut event_rx).is_empty());
    }

    struct PanicOnProcessed;

    impl RunObserver for PanicOnProcessed {
        fn on_event(&self, event: RunEvent) {
            if matches!(event, RunEvent::FileProcessed { .. }) {
                panic!("observer blew up");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_reports_crashed_task() {
        let (arrive_tx, arrive_rx) = mpsc::unbounded_channel();
        let handle = RateSampler::spawn(
            &config(RateMode::Shared),
            arrive_rx,
            Arc::new(PanicOnProcessed),
        );

        arrive_tx.send(PathBuf::from("a.jpg")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        match handle.stop().await {
            Err(PipelineError::Progress { message }) => assert!(message.contains("panic")),
            other => panic!("unexpected result: {:?}", other.map(|s| s.processed_files())),
        }
    }
}
