//! Error types for the storage module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while transferring folders.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Remote folder does not exist.
    #[error("Remote folder not found: {remote}")]
    NotFound { remote: String },

    /// Remote folder holds no files.
    #[error("Remote folder is empty: {remote}")]
    EmptyFolder { remote: String },

    /// Storage backend could not be reached.
    #[error("Storage unreachable for {remote}: {reason}")]
    Unreachable { remote: String, reason: String },

    /// Backend answered with a non-2xx status.
    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Remote path or object key cannot be mapped to a local path.
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    /// Listing response could not be parsed.
    #[error("Invalid listing response: {0}")]
    InvalidListing(String),

    /// Local folder to upload does not exist.
    #[error("Local folder not found: {path}")]
    LocalNotFound { path: PathBuf },

    /// HTTP client could not be constructed.
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Creates a new unreachable error.
    pub fn unreachable(remote: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            remote: remote.into(),
            reason: reason.into(),
        }
    }
}
