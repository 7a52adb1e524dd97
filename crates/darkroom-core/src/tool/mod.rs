//! External tool invocation.
//!
//! The pipeline never touches conversion binaries directly: it goes through
//! the [`ToolRunner`] trait, so tests can swap in a fake that records calls
//! and writes output files itself.

pub mod args;

use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{PipelineError, PipelineResult};
use crate::types::ToolOutput;

/// Runs an external executable to completion.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the orchestrator holds an `Arc<dyn ToolRunner>`).
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Spawn `tool` with `args`, wait for it, and return its combined output.
    ///
    /// A spawn failure or non-zero exit is a `ToolExecution` error carrying
    /// whatever the tool wrote to stderr.
    async fn run(&self, tool: &str, args: &[OsString]) -> PipelineResult<ToolOutput>;
}

/// Runs tools as child processes of this one.
///
/// No timeout and no retries: a tool may legitimately take minutes on a large
/// folder, and a failed pass is not expected to succeed on a second try.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessToolRunner;

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, tool: &str, args: &[OsString]) -> PipelineResult<ToolOutput> {
        tracing::debug!("Running: {} {}", tool, display_args(args));

        let output = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PipelineError::ToolExecution {
                tool: tool.to_string(),
                message: e.to_string(),
                stderr: String::new(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(PipelineError::ToolExecution {
                tool: tool.to_string(),
                message: format!("exited with {}", output.status),
                stderr: stderr.into_owned(),
            });
        }

        Ok(ToolOutput {
            combined_output: format!("{}\n{}", stdout, stderr),
        })
    }
}

/// Render an argument list for logging.
pub fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
