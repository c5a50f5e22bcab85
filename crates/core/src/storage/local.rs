//! Local filesystem storage backend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::error::StorageError;
use super::traits::{StorageService, UploadSummary};

/// Storage backend where remote paths are directories on this machine.
///
/// Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    temp_root: PathBuf,
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStorage {
    /// Creates a local backend staging downloads under the system temp dir.
    pub fn new() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
        }
    }

    /// Stages downloads under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    fn resolve(remote: &str) -> PathBuf {
        PathBuf::from(remote.strip_prefix("file://").unwrap_or(remote))
    }
}

/// Lists every regular file below `root` as (relative, absolute) pairs,
/// sorted by relative path.
pub(crate) fn collect_files(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>, StorageError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            StorageError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop detected")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| StorageError::InvalidPath(entry.path().display().to_string()))?
            .to_path_buf();
        files.push((relative, entry.path().to_path_buf()));
    }
    files.sort();
    Ok(files)
}

/// Copies `files` below `destination`, creating parents as needed. Returns bytes copied.
async fn copy_tree(files: &[(PathBuf, PathBuf)], destination: &Path) -> Result<u64, StorageError> {
    let mut total = 0u64;
    for (relative, absolute) in files {
        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        total += fs::copy(absolute, &target).await?;
    }
    Ok(total)
}

#[async_trait]
impl StorageService for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn download_folder(&self, remote: &str) -> Result<TempDir, StorageError> {
        let source = Self::resolve(remote);
        match fs::metadata(&source).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(StorageError::InvalidPath(format!(
                    "{} is not a directory",
                    source.display()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    remote: remote.to_string(),
                })
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        let files = collect_files(&source)?;
        if files.is_empty() {
            return Err(StorageError::EmptyFolder {
                remote: remote.to_string(),
            });
        }

        let staged = tempfile::Builder::new()
            .prefix("openmvgo-input")
            .tempdir_in(&self.temp_root)?;
        let bytes = copy_tree(&files, staged.path()).await?;

        info!(
            remote = remote,
            files = files.len(),
            bytes,
            local = %staged.path().display(),
            "Downloaded folder"
        );
        Ok(staged)
    }

    async fn upload_folder(
        &self,
        local: &Path,
        remote: &str,
    ) -> Result<UploadSummary, StorageError> {
        if !local.is_dir() {
            return Err(StorageError::LocalNotFound {
                path: local.to_path_buf(),
            });
        }

        let destination = Self::resolve(remote);
        fs::create_dir_all(&destination).await?;

        let files = collect_files(local)?;
        let bytes_uploaded = copy_tree(&files, &destination).await?;
        debug!(remote = remote, files = files.len(), "Uploaded folder");

        Ok(UploadSummary {
            remote: remote.to_string(),
            files_uploaded: files.len(),
            bytes_uploaded,
        })
    }
}
