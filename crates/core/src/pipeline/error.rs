//! Error type for reconstruction runs.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::runner::RunnerError;
use crate::staging::StagingError;
use crate::storage::StorageError;

/// Errors that abort a run. None of them are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration (detected before any tool runs).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input download or result upload failed.
    #[error("Storage transfer failed: {0}")]
    Storage(#[from] StorageError),

    /// Directory or file staging failed.
    #[error("Staging failed: {0}")]
    Staging(#[from] StagingError),

    /// External tool failed.
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: RunnerError,
    },

    /// A stage's input is missing, so its tool was not started.
    #[error("Stage '{stage}' is missing required input: {path}")]
    MissingInput { stage: String, path: PathBuf },

    /// A tool exited successfully without writing its expected output.
    #[error("Stage '{stage}' did not produce: {path}")]
    MissingOutput { stage: String, path: PathBuf },

    /// Required tools are not installed.
    #[error("Tools not found: {}", missing.join(", "))]
    ToolsUnavailable { missing: Vec<String> },

    /// The downloaded input folder holds no files.
    #[error("Input directory holds no files: {path}")]
    EmptyInput { path: PathBuf },

    /// Sparse reconstruction registered too few cameras.
    #[error("Only {registered} cameras registered, at least {required} required")]
    TooFewCameras { registered: usize, required: usize },

    /// Exported sparse model could not be read.
    #[error("Invalid sparse model {path}: {reason}")]
    InvalidSparseModel { path: PathBuf, reason: String },

    /// Dense reconstruction started without a usable sparse reconstruction.
    #[error("Dense reconstruction precondition failed: {reason}")]
    StageBPrecondition { reason: String },
}

impl PipelineError {
    /// Creates a new Stage-B precondition error.
    pub fn stage_b_precondition(reason: impl Into<String>) -> Self {
        Self::StageBPrecondition {
            reason: reason.into(),
        }
    }

    /// Name of the failed stage, for errors raised while running a stage chain.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageFailed { stage, .. }
            | Self::MissingInput { stage, .. }
            | Self::MissingOutput { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
