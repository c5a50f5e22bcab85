//! Error types for the staging module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while staging files and directories.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Path exists but is not a directory.
    #[error("Path exists and is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Failed to create a directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copy source does not exist.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Copy destination's parent directory does not exist.
    #[error("Destination directory does not exist: {path}")]
    DestinationParentMissing { path: PathBuf },

    /// Failed to copy file.
    #[error("Failed to copy file from {source} to {destination}")]
    CopyFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Remote file could not be fetched.
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Remote server answered with a non-2xx status.
    #[error("Download of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// HTTP client could not be constructed.
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// Failed to create a temporary directory.
    #[error("Failed to create temporary directory")]
    TempDirFailed(#[source] std::io::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagingError {
    /// Creates a new download failed error.
    pub fn download_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new copy failed error.
    pub fn copy_failed(source: PathBuf, destination: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed {
            source,
            destination,
            error,
        }
    }
}
