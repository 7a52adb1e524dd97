//! Darkroom Core - batch RAW/JPEG preview pipeline.
//!
//! Darkroom turns a folder of RAW and JPEG photos into preview JPEGs plus one
//! consolidated metadata document, driving external tools for the heavy
//! lifting and reporting live progress to an observer.
//!
//! # Architecture
//!
//! ```text
//! Source folder → Resize tool → Preview extraction → Tag copy → Cleanup → metadata.json
//!                      └──────── output watcher → rate sampler → observer ────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use darkroom_core::{Config, LogObserver, PipelineOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> darkroom_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = PipelineOrchestrator::with_process_runner(config, Arc::new(LogObserver));
//!
//!     let report = pipeline.run("./shoot".as_ref()).await?;
//!     println!("Previews in {:?}", report.output_path);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod tool;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, DarkroomError, PipelineError, PipelineResult, Result};
pub use observer::{LogObserver, RunObserver};
pub use pipeline::{PipelineOrchestrator, SourceDiscovery};
pub use tool::{ProcessToolRunner, ToolRunner};
pub use types::{
    CleanupReport, CopyReport, ExtractionReport, MetadataRecord, RunEvent, RunReport, RunStage,
    ToolOutput,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
