//! Filesystem staging helper implementation.

use chrono::Utc;
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use super::error::StagingError;

/// Fail-fast assertion for conditions that only occur in a misconfigured
/// environment (e.g. the temp directory cannot be created).
///
/// Logs the error as-is and terminates the process with status 1.
pub fn check<T, E: fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// A file fetched into its own temporary directory.
///
/// The directory (and the file) is removed when this value is dropped.
#[derive(Debug)]
pub struct DownloadedFile {
    path: PathBuf,
    size_bytes: u64,
    _dir: TempDir,
}

impl DownloadedFile {
    /// Local path of the downloaded file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes written.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Directory and file staging for a run.
#[derive(Debug, Clone)]
pub struct FsStaging {
    client: Client,
    temp_root: PathBuf,
}

impl FsStaging {
    /// Creates a staging helper whose HTTP downloads time out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, StagingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(StagingError::ClientBuild)?;

        Ok(Self {
            client,
            temp_root: std::env::temp_dir(),
        })
    }

    /// Places temporary directories under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    /// Creates `path` and any missing parents.
    ///
    /// Succeeds if the directory already exists; fails if `path` exists as
    /// something other than a directory.
    pub async fn ensure_dir(&self, path: &Path) -> Result<(), StagingError> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => {
                return Err(StagingError::NotADirectory {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StagingError::Io(e)),
        }

        fs::create_dir_all(path)
            .await
            .map_err(|e| StagingError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(path = %path.display(), "Created directory");
        Ok(())
    }

    /// Copies `source` to `destination` byte for byte. Returns bytes copied.
    ///
    /// The destination's parent directory must already exist.
    pub async fn copy_file(&self, source: &Path, destination: &Path) -> Result<u64, StagingError> {
        if !fs::try_exists(source).await.unwrap_or(false) {
            return Err(StagingError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(StagingError::DestinationParentMissing {
                    path: parent.to_path_buf(),
                });
            }
        }

        let bytes = fs::copy(source, destination).await.map_err(|e| {
            StagingError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        debug!(
            source = %source.display(),
            destination = %destination.display(),
            bytes,
            "Copied file"
        );
        Ok(bytes)
    }

    /// Fetches `url` into a fresh temporary directory, keeping the URL's file name.
    pub async fn download_file(&self, url: &str) -> Result<DownloadedFile, StagingError> {
        let dir = tempfile::Builder::new()
            .prefix("openmvgo-download")
            .tempdir_in(&self.temp_root)
            .map_err(StagingError::TempDirFailed)?;
        let path = dir.path().join(file_name_from_url(url));

        info!(url = url, "Downloading file");
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StagingError::download_failed(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StagingError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = File::create(&path).await?;
        let mut size_bytes = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StagingError::download_failed(url, e.to_string()))?
        {
            file.write_all(&chunk).await?;
            size_bytes += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url = url, path = %path.display(), size_bytes, "Download complete");
        Ok(DownloadedFile {
            path,
            size_bytes,
            _dir: dir,
        })
    }

    /// Creates the run's build directory, named after the start time.
    ///
    /// A random suffix follows the `<unix-seconds>build` prefix, so runs
    /// started in the same second still get distinct directories.
    pub fn create_build_dir(&self) -> Result<TempDir, StagingError> {
        let prefix = format!("{}build", Utc::now().timestamp());
        tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&self.temp_root)
            .map_err(StagingError::TempDirFailed)
    }
}

/// Last path segment of a URL, without query or fragment.
fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let path = after_scheme.split_once('/').map_or("", |(_, path)| path);

    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(|name| {
            urlencoding::decode(name).map_or_else(|_| name.to_string(), |n| n.into_owned())
        })
        .unwrap_or_else(|| "download".to_string())
}
