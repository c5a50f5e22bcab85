//! Trait definitions for the storage module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::TempDir;

use super::error::StorageError;

/// Summary of a folder upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Remote folder the files were written under.
    pub remote: String,
    /// Number of files uploaded.
    pub files_uploaded: usize,
    /// Total bytes uploaded.
    pub bytes_uploaded: u64,
}

/// Moves whole folders between remote storage and the local filesystem.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Returns the name of this storage backend.
    fn name(&self) -> &str;

    /// Fetches every object under `remote` into a new temporary directory,
    /// preserving relative structure.
    ///
    /// Fails if the folder is unreachable, missing or empty. The directory is
    /// removed when the returned guard is dropped.
    async fn download_folder(&self, remote: &str) -> Result<TempDir, StorageError>;

    /// Pushes every file below `local` under `remote`, preserving relative structure.
    async fn upload_folder(
        &self,
        local: &Path,
        remote: &str,
    ) -> Result<UploadSummary, StorageError>;
}
