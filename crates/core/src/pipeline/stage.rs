//! Stage definitions and the sequential stage runner.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

use crate::runner::{CommandRunner, ToolInvocation};

use super::error::PipelineError;

/// One step of a reconstruction chain.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Short name used in logs and errors.
    pub name: &'static str,
    /// Tool to run.
    pub invocation: ToolInvocation,
    /// Paths that must exist before the tool starts.
    pub required_inputs: Vec<PathBuf>,
    /// Paths the tool must have written when it exits.
    pub produced_outputs: Vec<PathBuf>,
}

impl Stage {
    /// Creates a stage with no declared inputs or outputs.
    pub fn new(name: &'static str, invocation: ToolInvocation) -> Self {
        Self {
            name,
            invocation,
            required_inputs: Vec::new(),
            produced_outputs: Vec::new(),
        }
    }

    /// Declares a required input path.
    pub fn requires(mut self, path: impl Into<PathBuf>) -> Self {
        self.required_inputs.push(path.into());
        self
    }

    /// Declares a produced output path.
    pub fn produces(mut self, path: impl Into<PathBuf>) -> Self {
        self.produced_outputs.push(path.into());
        self
    }
}

/// Timing of a completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub program: String,
    pub duration_ms: u64,
}

/// Returns true if `path` is a directory with at least one entry.
pub async fn dir_has_entries(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

/// Runs `stages` in order, stopping at the first failure.
///
/// For every stage the declared inputs are checked before the tool is
/// spawned and the declared outputs after it exits.
pub async fn run_stages<R>(runner: &R, stages: &[Stage]) -> Result<Vec<StageReport>, PipelineError>
where
    R: CommandRunner + ?Sized,
{
    let total = stages.len();
    let mut reports = Vec::with_capacity(total);

    for (index, stage) in stages.iter().enumerate() {
        for input in &stage.required_inputs {
            if !tokio::fs::try_exists(input).await.unwrap_or(false) {
                error!(stage = stage.name, path = %input.display(), "Required input missing");
                return Err(PipelineError::MissingInput {
                    stage: stage.name.to_string(),
                    path: input.clone(),
                });
            }
        }

        info!(
            stage = stage.name,
            step = index + 1,
            total,
            "Running {}",
            stage.invocation.program_name()
        );
        let start = Instant::now();

        runner
            .run(&stage.invocation)
            .await
            .map_err(|e| {
                error!(stage = stage.name, error = %e, "Stage failed");
                PipelineError::StageFailed {
                    stage: stage.name.to_string(),
                    source: e,
                }
            })?;

        for output in &stage.produced_outputs {
            if !tokio::fs::try_exists(output).await.unwrap_or(false) {
                error!(stage = stage.name, path = %output.display(), "Expected output missing");
                return Err(PipelineError::MissingOutput {
                    stage: stage.name.to_string(),
                    path: output.clone(),
                });
            }
        }

        reports.push(StageReport {
            name: stage.name.to_string(),
            program: stage.invocation.program_name().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    Ok(reports)
}
