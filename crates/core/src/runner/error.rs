//! Error types for the runner module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running an external tool.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Executable could not be located.
    #[error("Executable not found: {program}")]
    NotFound { program: PathBuf },

    /// Process exited with a non-zero status.
    #[error("{program} exited with code {code}")]
    NonZeroExit {
        program: PathBuf,
        code: i32,
        stderr: Option<String>,
    },

    /// Process exceeded the per-invocation timeout and was killed.
    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: PathBuf, timeout_secs: u64 },

    /// I/O error while spawning or supervising the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Creates a non-zero exit error, dropping empty stderr captures.
    pub fn non_zero_exit(program: impl Into<PathBuf>, code: i32, stderr: String) -> Self {
        Self::NonZeroExit {
            program: program.into(),
            code,
            stderr: if stderr.trim().is_empty() {
                None
            } else {
                Some(stderr)
            },
        }
    }

    /// Exit code carried by the error, if the process ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Captured stderr tail, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
